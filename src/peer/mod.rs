//! Event loops that own the session state of one process.
//!
//! Each loop is the only writer of its state: transport events and local
//! commands are handled one at a time inside a single `tokio::select!`, and
//! every change is published as a fresh [`SessionView`].

mod guest;
mod host;

pub use guest::{run_guest, GuestCommand};
pub use host::{run_host, HostCommand};

use crate::protocol::{PeerMessage, ProtocolError};
use crate::state::SessionView;
use tokio::sync::watch;

/// Decode a frame, logging and discarding anything unusable
fn decode_frame(from: &str, frame: &str) -> Option<PeerMessage> {
    match PeerMessage::decode(frame) {
        Ok(msg) => {
            tracing::debug!("{} from {}", msg.kind(), from);
            Some(msg)
        }
        Err(ProtocolError::UnknownType(kind)) => {
            tracing::warn!("Unknown message type {} from {}, dropping", kind, from);
            None
        }
        Err(e) => {
            tracing::warn!("Dropping frame from {}: {}", from, e);
            None
        }
    }
}

fn publish(views: &watch::Sender<SessionView>, view: SessionView) {
    views.send_if_modified(|current| {
        if *current == view {
            false
        } else {
            *current = view;
            true
        }
    });
}
