//! In-process transport: rooms live in a shared hub, channels are tokio mpsc
//! queues carrying the same JSON frames as the network transport.

use super::{GuestEndpoint, GuestEvent, HostEndpoint, HostEvent, PeerTable, TransportError, WeakPeerTable};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

struct Room {
    events: mpsc::UnboundedSender<HostEvent>,
    peers: WeakPeerTable,
}

impl Room {
    fn is_open(&self) -> bool {
        !self.events.is_closed() && self.peers.strong_count() > 0
    }
}

#[derive(Clone, Default)]
pub struct Hub {
    rooms: Arc<Mutex<HashMap<String, Room>>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room table, recovered if a holder panicked
    fn rooms(&self) -> MutexGuard<'_, HashMap<String, Room>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a room under `room_code`
    pub fn listen(&self, room_code: &str) -> Result<HostEndpoint, TransportError> {
        let mut rooms = self.rooms();
        if rooms.get(room_code).is_some_and(Room::is_open) {
            return Err(TransportError::RoomCodeUnavailable(room_code.to_string()));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let peers = PeerTable::default();
        rooms.insert(
            room_code.to_string(),
            Room {
                events: events_tx,
                peers: Arc::downgrade(&peers),
            },
        );
        tracing::info!("Room {} open on in-memory hub", room_code);
        Ok(HostEndpoint::new(room_code.to_string(), events_rx, peers))
    }

    /// Connect to the room registered under `room_code`
    pub async fn connect(&self, room_code: &str) -> Result<GuestEndpoint, TransportError> {
        let (host_events, peers) = {
            let rooms = self.rooms();
            match rooms.get(room_code) {
                Some(room) if room.is_open() => (room.events.clone(), room.peers.clone()),
                _ => return Err(TransportError::ConnectionFailed(room_code.to_string())),
            }
        };
        let table = peers
            .upgrade()
            .ok_or_else(|| TransportError::ConnectionFailed(room_code.to_string()))?;

        let peer_id = ulid::Ulid::new().to_string();
        let (to_guest_tx, mut to_guest_rx) = mpsc::unbounded_channel::<String>();
        let (to_host_tx, mut to_host_rx) = mpsc::unbounded_channel::<String>();
        let (guest_events_tx, guest_events_rx) = mpsc::unbounded_channel();

        table.write().await.insert(peer_id.clone(), to_guest_tx);
        drop(table);
        host_events
            .send(HostEvent::Open(peer_id.clone()))
            .map_err(|_| TransportError::ConnectionFailed(room_code.to_string()))?;
        let _ = guest_events_tx.send(GuestEvent::Open);

        // host -> guest
        tokio::spawn(async move {
            while let Some(frame) = to_guest_rx.recv().await {
                if guest_events_tx.send(GuestEvent::Message(frame)).is_err() {
                    break;
                }
            }
            let _ = guest_events_tx.send(GuestEvent::Close);
        });

        // guest -> host
        let id = peer_id.clone();
        tokio::spawn(async move {
            while let Some(frame) = to_host_rx.recv().await {
                if host_events
                    .send(HostEvent::Message(id.clone(), frame))
                    .is_err()
                {
                    break;
                }
            }
            if let Some(table) = peers.upgrade() {
                table.write().await.remove(&id);
            }
            let _ = host_events.send(HostEvent::Close(id));
        });

        tracing::debug!("Peer {} connected to room {}", peer_id, room_code);
        Ok(GuestEndpoint::new(to_host_tx, guest_events_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PeerMessage;

    #[tokio::test]
    async fn test_room_code_unavailable() {
        let hub = Hub::new();
        let _host = hub.listen("K7P2").unwrap();
        assert!(matches!(
            hub.listen("K7P2"),
            Err(TransportError::RoomCodeUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_room_code_reusable_after_close() {
        let hub = Hub::new();
        let host = hub.listen("K7P2").unwrap();
        drop(host);
        assert!(hub.listen("K7P2").is_ok());
    }

    #[tokio::test]
    async fn test_poisoned_hub_keeps_working() {
        let hub = Hub::new();
        let poisoner = hub.clone();
        let _ = std::thread::spawn(move || {
            let _rooms = poisoner.rooms.lock().unwrap();
            panic!("panic while holding the room table");
        })
        .join();
        assert!(hub.rooms.is_poisoned());

        let _host = hub.listen("K7P2").unwrap();
        assert!(matches!(
            hub.listen("K7P2"),
            Err(TransportError::RoomCodeUnavailable(_))
        ));
        assert!(hub.connect("K7P2").await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_unknown_room() {
        let hub = Hub::new();
        assert!(matches!(
            hub.connect("ZZZZ").await,
            Err(TransportError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let hub = Hub::new();
        let mut host = hub.listen("K7P2").unwrap();
        let mut guest = hub.connect("K7P2").await.unwrap();

        assert_eq!(guest.recv().await, Some(GuestEvent::Open));
        let peer_id = match host.recv().await {
            Some(HostEvent::Open(id)) => id,
            other => panic!("Expected Open, got {:?}", other),
        };

        guest
            .send(&PeerMessage::Join {
                nickname: "Ruby Fox".to_string(),
            })
            .unwrap();
        match host.recv().await {
            Some(HostEvent::Message(id, frame)) => {
                assert_eq!(id, peer_id);
                assert!(matches!(
                    PeerMessage::decode(&frame),
                    Ok(PeerMessage::Join { .. })
                ));
            }
            other => panic!("Expected Message, got {:?}", other),
        }

        host.send(&peer_id, &PeerMessage::VotePhase {}).await;
        host.broadcast(&PeerMessage::ResetLobby {}).await;
        let frames: Vec<_> = vec![guest.recv().await, guest.recv().await];
        assert_eq!(
            frames,
            vec![
                Some(GuestEvent::Message(r#"{"type":"VOTE_PHASE","payload":{}}"#.to_string())),
                Some(GuestEvent::Message(r#"{"type":"RESET_LOBBY","payload":{}}"#.to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_guest_drop_closes_on_host() {
        let hub = Hub::new();
        let mut host = hub.listen("K7P2").unwrap();
        let guest = hub.connect("K7P2").await.unwrap();
        let peer_id = match host.recv().await {
            Some(HostEvent::Open(id)) => id,
            other => panic!("Expected Open, got {:?}", other),
        };

        drop(guest);
        assert_eq!(host.recv().await, Some(HostEvent::Close(peer_id)));
    }

    #[tokio::test]
    async fn test_host_drop_closes_guests() {
        let hub = Hub::new();
        let host = hub.listen("K7P2").unwrap();
        let mut guest = hub.connect("K7P2").await.unwrap();
        assert_eq!(guest.recv().await, Some(GuestEvent::Open));

        host.shutdown().await;
        assert_eq!(guest.recv().await, Some(GuestEvent::Close));
    }
}
