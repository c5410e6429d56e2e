//! WebSocket transport. The host serves `/room/{code}` with axum; guests dial
//! it with tokio-tungstenite.

use super::{GuestEndpoint, GuestEvent, HostEndpoint, HostEvent, PeerTable, TransportError, WeakPeerTable};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite};
use tower_http::trace::TraceLayer;

struct RoomState {
    room_code: String,
    events: mpsc::UnboundedSender<HostEvent>,
    peers: WeakPeerTable,
}

/// Bind `addr` and accept guests for `room_code`
pub async fn listen(addr: SocketAddr, room_code: &str) -> Result<HostEndpoint, TransportError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AddrInUse => {
                TransportError::RoomCodeUnavailable(room_code.to_string())
            }
            _ => TransportError::Io(e),
        })?;
    let local_addr = listener.local_addr()?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let peers = PeerTable::default();
    let state = Arc::new(RoomState {
        room_code: room_code.to_string(),
        events: events_tx,
        peers: Arc::downgrade(&peers),
    });

    let app = Router::new()
        .route("/room/{code}", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Room server stopped: {}", e);
        }
    });

    tracing::info!("Room {} listening on ws://{}/room/{}", room_code, local_addr, room_code);
    Ok(HostEndpoint::new(room_code.to_string(), events_rx, peers).with_server(server, local_addr))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    State(state): State<Arc<RoomState>>,
) -> Response {
    if !code.eq_ignore_ascii_case(&state.room_code) {
        tracing::info!("Rejecting connection to unknown room {}", code);
        return StatusCode::NOT_FOUND.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
        .into_response()
}

/// Register a new peer queue and announce it to the host.
///
/// Returns `None`, leaving the table untouched, when the room is gone.
async fn open_peer(state: &RoomState, tx: mpsc::UnboundedSender<String>) -> Option<String> {
    let table = state.peers.upgrade()?;
    let peer_id = ulid::Ulid::new().to_string();
    table.write().await.insert(peer_id.clone(), tx);
    drop(table);

    if state.events.send(HostEvent::Open(peer_id.clone())).is_err() {
        forget_peer(state, &peer_id).await;
        return None;
    }
    tracing::info!("Peer {} connected", peer_id);
    Some(peer_id)
}

async fn forget_peer(state: &RoomState, peer_id: &str) {
    if let Some(table) = state.peers.upgrade() {
        table.write().await.remove(peer_id);
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<RoomState>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let Some(peer_id) = open_peer(&state, tx).await else {
        return;
    };

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    // Host dropped our queue: room closed
                    None => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received frame from {}: {}", peer_id, text.as_str());
                        let event = HostEvent::Message(peer_id.clone(), text.to_string());
                        if state.events.send(event).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error from {}: {}", peer_id, e);
                        break;
                    }
                }
            }
        }
    }

    forget_peer(&state, &peer_id).await;
    let _ = state.events.send(HostEvent::Close(peer_id.clone()));
    tracing::info!("Peer {} disconnected", peer_id);
}

/// Connect to `room_code` on the host at `addr` (host:port)
pub async fn connect(addr: &str, room_code: &str) -> Result<GuestEndpoint, TransportError> {
    let url = format!("ws://{}/room/{}", addr, room_code);
    let (stream, _) = connect_async(url.as_str()).await.map_err(|e| {
        tracing::warn!("Failed to connect to {}: {}", url, e);
        TransportError::ConnectionFailed(room_code.to_string())
    })?;
    tracing::info!("Connected to {}", url);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let _ = events_tx.send(GuestEvent::Open);

    tokio::spawn(async move {
        let (mut write, mut read) = stream.split();
        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if write.send(tungstenite::Message::text(text)).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = write.close().await;
                            break;
                        }
                    }
                }

                incoming = read.next() => {
                    match incoming {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            let event = GuestEvent::Message(text.as_str().to_owned());
                            if events_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Some(Ok(tungstenite::Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!("WebSocket error: {}", e);
                            break;
                        }
                    }
                }
            }
        }
        let _ = events_tx.send(GuestEvent::Close);
    });

    Ok(GuestEndpoint::new(outbound_tx, events_rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PeerMessage;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    #[tokio::test]
    async fn test_join_over_websocket() {
        let mut host = listen(loopback(), "K7P2").await.unwrap();
        let addr = host.local_addr().unwrap().to_string();
        let mut guest = connect(&addr, "K7P2").await.unwrap();
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
                assert!(frame.contains("Ruby Fox"));
            }
            other => panic!("Expected Message, got {:?}", other),
        }

        host.send(&peer_id, &PeerMessage::VotePhase {}).await;
        assert_eq!(
            guest.recv().await,
            Some(GuestEvent::Message(
                r#"{"type":"VOTE_PHASE","payload":{}}"#.to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_peer_not_kept_when_host_gone() {
        let (events, events_rx) = mpsc::unbounded_channel();
        drop(events_rx);
        let peers = PeerTable::default();
        let state = RoomState {
            room_code: "K7P2".to_string(),
            events,
            peers: Arc::downgrade(&peers),
        };

        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(open_peer(&state, tx).await, None);
        assert!(peers.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_room_code_fails() {
        let host = listen(loopback(), "K7P2").await.unwrap();
        let addr = host.local_addr().unwrap().to_string();
        assert!(matches!(
            connect(&addr, "ZZZZ").await,
            Err(TransportError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_address_in_use() {
        let host = listen(loopback(), "K7P2").await.unwrap();
        let addr = host.local_addr().unwrap();
        assert!(matches!(
            listen(addr, "Q9RS").await,
            Err(TransportError::RoomCodeUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_host_shutdown_closes_guest() {
        let host = listen(loopback(), "K7P2").await.unwrap();
        let addr = host.local_addr().unwrap().to_string();
        let mut guest = connect(&addr, "K7P2").await.unwrap();
        assert_eq!(guest.recv().await, Some(GuestEvent::Open));

        // Wait until the host has registered the peer before closing
        let mut host = host;
        assert!(matches!(host.recv().await, Some(HostEvent::Open(_))));
        host.shutdown().await;
        assert_eq!(guest.recv().await, Some(GuestEvent::Close));
    }
}
