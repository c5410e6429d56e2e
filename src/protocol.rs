use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire type tags this build understands
pub const KNOWN_TYPES: &[&str] = &[
    "JOIN",
    "PLAYER_LIST",
    "GAME_START",
    "VOTE_PHASE",
    "CAST_VOTE",
    "GAME_OVER",
    "RESET_LOBBY",
    "CHAT",
];

/// Coordination message exchanged between host and guests.
///
/// Serialized as `{ "type": "...", "payload": { ... } }`, one object per send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerMessage {
    /// Guest -> host, second half of the join handshake
    Join { nickname: String },
    PlayerList { players: Vec<Player> },
    /// Unicast, one distinct payload per recipient
    GameStart(GameStartPayload),
    VotePhase {},
    CastVote {
        #[serde(rename = "votedId")]
        voted_id: PlayerId,
    },
    GameOver(GameOverPayload),
    ResetLobby {},
    /// Guests send `text` only, the host stamps `from` before relaying
    Chat {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        text: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl PeerMessage {
    /// The wire tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Join { .. } => "JOIN",
            PeerMessage::PlayerList { .. } => "PLAYER_LIST",
            PeerMessage::GameStart(_) => "GAME_START",
            PeerMessage::VotePhase {} => "VOTE_PHASE",
            PeerMessage::CastVote { .. } => "CAST_VOTE",
            PeerMessage::GameOver(_) => "GAME_OVER",
            PeerMessage::ResetLobby {} => "RESET_LOBBY",
            PeerMessage::Chat { .. } => "CHAT",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode one frame.
    ///
    /// Unknown tags are reported separately from malformed payloads so callers
    /// can log them apart; both must be dropped without touching state. A
    /// missing payload is read as `{}`.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope = serde_json::from_str(text)?;
        if !KNOWN_TYPES.contains(&raw.kind.as_str()) {
            return Err(ProtocolError::UnknownType(raw.kind));
        }

        let payload = match raw.payload {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let envelope = serde_json::json!({ "type": raw.kind, "payload": payload });
        Ok(serde_json::from_value(envelope)?)
    }
}
