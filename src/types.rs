use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Opaque ID assigned by the transport, stable for a connection's lifetime
pub type PlayerId = String;

/// Placeholder word handed to imposters instead of the secret
pub const HIDDEN_WORD: &str = "???";

/// Minimum roster size for starting a round
pub const MIN_PLAYERS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub nickname: String,
    pub join_index: u32,
    pub is_host: bool,
}

impl Player {
    /// Emoji shown next to the player, fixed by join order
    pub fn emoji(&self) -> &'static str {
        crate::words::player_emoji(self.join_index)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    Lobby,
    Reveal,
    Voting,
    Result,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecretRole {
    Citizen,
    Imposter,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Winner {
    Citizens,
    Imposters,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameSettings {
    pub theme: String,
    pub imposter_count: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            theme: crate::words::THEMES[0].name.to_string(),
            imposter_count: 1,
        }
    }
}

/// What one player is allowed to know at round start
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStartPayload {
    pub role: SecretRole,
    pub word: String,
    pub starting_player_nickname: String,
    pub theme: String,
    /// Roster snapshot, used as the vote candidate list
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameOverPayload {
    pub winner: Winner,
    pub imposters: Vec<String>,
    pub secret_word: String,
}

/// Host-only round state. Never serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSecret {
    pub word: String,
    pub imposter_ids: HashSet<PlayerId>,
    pub theme: String,
}

impl RoundSecret {
    pub fn is_imposter(&self, id: &str) -> bool {
        self.imposter_ids.contains(id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatLine {
    pub from: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Error,
}
