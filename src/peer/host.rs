use super::{decode_frame, publish};
use crate::state::{Coordinator, SessionView, VoteVerdict};
use crate::transport::{HostEndpoint, HostEvent};
use crate::types::{GameSettings, PlayerId};
use tokio::sync::{mpsc, watch};

/// Actions taken by the local host user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    StartGame(GameSettings),
    InitiateVote,
    CastVote(PlayerId),
    /// Reveal a specific player, or the current vote leader
    FinalizeVote(Option<PlayerId>),
    BackToLobby,
    Say(String),
    /// Tear the session down
    Leave,
}

/// Run the host session until the user leaves or the transport goes away
pub async fn run_host(
    mut endpoint: HostEndpoint,
    mut coordinator: Coordinator,
    mut commands: mpsc::UnboundedReceiver<HostCommand>,
    views: watch::Sender<SessionView>,
) -> Coordinator {
    tracing::info!("Hosting room {}", coordinator.room_code());
    publish(&views, coordinator.view());

    loop {
        let mut error = None;

        tokio::select! {
            event = endpoint.recv() => {
                let Some(event) = event else {
                    tracing::warn!("Transport closed, ending session");
                    break;
                };
                handle_event(&endpoint, &mut coordinator, event).await;
            }

            command = commands.recv() => {
                match command {
                    None | Some(HostCommand::Leave) => break,
                    Some(command) => {
                        if let Err(e) = handle_command(&endpoint, &mut coordinator, command).await {
                            tracing::info!("Host command refused: {}", e);
                            error = Some(e.to_string());
                        }
                    }
                }
            }
        }

        let mut view = coordinator.view();
        view.error = error;
        publish(&views, view);
    }

    endpoint.shutdown().await;
    coordinator
}

async fn handle_event(endpoint: &HostEndpoint, coordinator: &mut Coordinator, event: HostEvent) {
    match event {
        HostEvent::Open(peer) => coordinator.on_peer_joined(&peer),
        HostEvent::Close(peer) => {
            let outbound = coordinator.on_peer_left(&peer);
            endpoint.deliver(outbound).await;
        }
        HostEvent::Message(peer, frame) => {
            let Some(msg) = decode_frame(&peer, &frame) else {
                return;
            };
            match coordinator.on_message(&peer, msg) {
                Ok(outbound) => endpoint.deliver(outbound).await,
                Err(e) => tracing::warn!("Ignoring message from {}: {}", peer, e),
            }
        }
    }
}

async fn handle_command(
    endpoint: &HostEndpoint,
    coordinator: &mut Coordinator,
    command: HostCommand,
) -> Result<(), crate::state::SessionError> {
    let outbound = match command {
        HostCommand::StartGame(settings) => coordinator.start_game(settings)?,
        HostCommand::InitiateVote => coordinator.initiate_vote()?,
        HostCommand::CastVote(candidate) => {
            coordinator.cast_local_vote(&candidate)?;
            Vec::new()
        }
        HostCommand::FinalizeVote(candidate) => {
            let (verdict, outbound) = match candidate {
                Some(id) => coordinator.finalize_vote(&id)?,
                None => coordinator.finalize_leading_vote()?,
            };
            match &verdict {
                VoteVerdict::Restarted { starting_player } => tracing::info!(
                    "Round continues, {} starts speaking",
                    starting_player.nickname
                ),
                other => tracing::info!("Round over, {:?} win", other.winner()),
            }
            outbound
        }
        HostCommand::BackToLobby => coordinator.back_to_lobby(),
        HostCommand::Say(text) => coordinator.say(&text),
        HostCommand::Leave => Vec::new(),
    };
    endpoint.deliver(outbound).await;
    Ok(())
}
