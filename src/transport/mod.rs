//! Transport adapters.
//!
//! The game core only needs addressable, ordered, reliable channels between
//! the host and each guest. Two implementations are provided: an in-process
//! hub and WebSockets. Both hand out the same endpoint types.

pub mod memory;
pub mod ws;

use crate::protocol::PeerMessage;
use crate::state::Outbound;
use crate::types::PlayerId;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("room code {0} is already in use")]
    RoomCodeUnavailable(String),

    #[error("could not connect to room {0}")]
    ConnectionFailed(String),

    #[error("connection closed")]
    Disconnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the host hears from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Open(PlayerId),
    Message(PlayerId, String),
    Close(PlayerId),
}

/// What a guest hears from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestEvent {
    Open,
    Message(String),
    Close,
}

/// Outbound frame queue per connected peer
pub(crate) type PeerTable = Arc<RwLock<HashMap<PlayerId, mpsc::UnboundedSender<String>>>>;
pub(crate) type WeakPeerTable = Weak<RwLock<HashMap<PlayerId, mpsc::UnboundedSender<String>>>>;

/// Host side: one listening room, many peer channels.
///
/// Dropping the endpoint drops every outbound queue, which closes all guest
/// channels.
pub struct HostEndpoint {
    room_code: String,
    events: mpsc::UnboundedReceiver<HostEvent>,
    peers: PeerTable,
    server: Option<tokio::task::JoinHandle<()>>,
    local_addr: Option<std::net::SocketAddr>,
}

impl HostEndpoint {
    pub(crate) fn new(
        room_code: String,
        events: mpsc::UnboundedReceiver<HostEvent>,
        peers: PeerTable,
    ) -> Self {
        Self {
            room_code,
            events,
            peers,
            server: None,
            local_addr: None,
        }
    }

    pub(crate) fn with_server(
        mut self,
        server: tokio::task::JoinHandle<()>,
        local_addr: std::net::SocketAddr,
    ) -> Self {
        self.server = Some(server);
        self.local_addr = Some(local_addr);
        self
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// Bound address, for network transports
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.local_addr
    }

    pub async fn recv(&mut self) -> Option<HostEvent> {
        self.events.recv().await
    }

    pub async fn send(&self, peer: &str, msg: &PeerMessage) {
        let frame = match msg.encode() {
            Ok(f) => f,
            Err(e) => {
                tracing::error!("Failed to encode {}: {}", msg.kind(), e);
                return;
            }
        };
        let peers = self.peers.read().await;
        match peers.get(peer) {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    tracing::debug!("Peer {} already gone, dropping {}", peer, msg.kind());
                }
            }
            None => tracing::warn!("No channel to {}, dropping {}", peer, msg.kind()),
        }
    }

    /// Send to every open channel
    pub async fn broadcast(&self, msg: &PeerMessage) {
        let frame = match msg.encode() {
            Ok(f) => f,
            Err(e) => {
                tracing::error!("Failed to encode {}: {}", msg.kind(), e);
                return;
            }
        };
        let peers = self.peers.read().await;
        tracing::debug!("Broadcasting {} to {} peers", msg.kind(), peers.len());
        for tx in peers.values() {
            let _ = tx.send(frame.clone());
        }
    }

    pub async fn deliver(&self, outbound: Vec<Outbound>) {
        for out in outbound {
            match out {
                Outbound::Unicast(peer, msg) => self.send(&peer, &msg).await,
                Outbound::Broadcast(msg) => self.broadcast(&msg).await,
            }
        }
    }

    /// Close every guest channel and stop listening
    pub async fn shutdown(self) {
        self.peers.write().await.clear();
        tracing::info!("Room {} closed", self.room_code);
    }
}

impl Drop for HostEndpoint {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.abort();
        }
    }
}

/// Guest side: a single channel to the host
pub struct GuestEndpoint {
    outbound: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<GuestEvent>,
}

impl GuestEndpoint {
    pub(crate) fn new(
        outbound: mpsc::UnboundedSender<String>,
        events: mpsc::UnboundedReceiver<GuestEvent>,
    ) -> Self {
        Self { outbound, events }
    }

    /// Queue a message for the host. Frames queued before the channel opens are
    /// delivered once it does.
    pub fn send(&self, msg: &PeerMessage) -> Result<(), TransportError> {
        let frame = msg.encode().map_err(|e| {
            tracing::error!("Failed to encode {}: {}", msg.kind(), e);
            TransportError::Disconnected
        })?;
        self.send_frame(frame)
    }

    /// Queue an already encoded frame
    pub fn send_frame(&self, frame: String) -> Result<(), TransportError> {
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Disconnected)
    }

    pub async fn recv(&mut self) -> Option<GuestEvent> {
        self.events.recv().await
    }
}
