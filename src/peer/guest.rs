use super::{decode_frame, publish};
use crate::state::{GuestMirror, SessionView};
use crate::transport::{GuestEndpoint, GuestEvent};
use crate::types::PlayerId;
use tokio::sync::{mpsc, watch};

/// Actions taken by the local guest user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestCommand {
    CastVote(PlayerId),
    Say(String),
    Leave,
}

/// Mirror the host's state until the user leaves or the host goes away
pub async fn run_guest(
    mut endpoint: GuestEndpoint,
    mut mirror: GuestMirror,
    mut commands: mpsc::UnboundedReceiver<GuestCommand>,
    views: watch::Sender<SessionView>,
) -> GuestMirror {
    publish(&views, mirror.view());

    loop {
        let mut error = None;

        tokio::select! {
            event = endpoint.recv() => {
                match event {
                    Some(GuestEvent::Open) => {
                        let join = mirror.on_open();
                        if let Err(e) = endpoint.send(&join) {
                            tracing::error!("Failed to send JOIN: {}", e);
                        }
                    }
                    Some(GuestEvent::Message(frame)) => {
                        if let Some(msg) = decode_frame("host", &frame) {
                            mirror.apply(msg);
                        }
                    }
                    Some(GuestEvent::Close) | None => {
                        tracing::warn!("Host closed the connection");
                        mirror.on_host_closed();
                        publish(&views, mirror.view());
                        break;
                    }
                }
            }

            command = commands.recv() => {
                match command {
                    None | Some(GuestCommand::Leave) => break,
                    Some(GuestCommand::CastVote(candidate)) => match mirror.cast_vote(&candidate) {
                        Ok(vote) => {
                            if let Err(e) = endpoint.send(&vote) {
                                error = Some(e.to_string());
                            }
                        }
                        Err(e) => error = Some(e.to_string()),
                    },
                    Some(GuestCommand::Say(text)) => {
                        if let Some(chat) = mirror.chat(&text) {
                            if let Err(e) = endpoint.send(&chat) {
                                error = Some(e.to_string());
                            }
                        }
                    }
                }
            }
        }

        let mut view = mirror.view();
        if error.is_some() {
            view.error = error;
        }
        publish(&views, view);
    }

    mirror
}
