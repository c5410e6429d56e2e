use super::{push_chat, SessionError, SessionView, MAX_CHAT_CHARS};
use crate::protocol::PeerMessage;
use crate::types::*;

/// Guest-side copy of the host's broadcast state.
///
/// Written only by inbound host messages, apart from the optimistic
/// has-voted flag set when the guest sends its own vote.
#[derive(Debug, Clone)]
pub struct GuestMirror {
    room_code: String,
    nickname: String,
    connection: ConnectionState,
    phase: GamePhase,
    players: Vec<Player>,
    game: Option<GameStartPayload>,
    game_over: Option<GameOverPayload>,
    has_voted: bool,
    chat: Vec<ChatLine>,
    error: Option<String>,
}

impl GuestMirror {
    pub fn new(room_code: String, nickname: String) -> Self {
        Self {
            room_code,
            nickname,
            connection: ConnectionState::Connecting,
            phase: GamePhase::Lobby,
            players: Vec::new(),
            game: None,
            game_over: None,
            has_voted: false,
            chat: Vec::new(),
            error: None,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn game(&self) -> Option<&GameStartPayload> {
        self.game.as_ref()
    }

    pub fn game_over(&self) -> Option<&GameOverPayload> {
        self.game_over.as_ref()
    }

    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Channel to the host is open: returns the JOIN to send
    pub fn on_open(&mut self) -> PeerMessage {
        self.connection = ConnectionState::Connected;
        self.phase = GamePhase::Lobby;
        self.error = None;
        PeerMessage::Join {
            nickname: self.nickname.clone(),
        }
    }

    /// Apply a message from the host. Returns whether anything changed.
    pub fn apply(&mut self, msg: PeerMessage) -> bool {
        match msg {
            PeerMessage::PlayerList { players } => {
                self.players = players;
            }
            PeerMessage::GameStart(payload) => {
                self.game = Some(payload);
                self.phase = GamePhase::Reveal;
                self.has_voted = false;
                self.game_over = None;
            }
            PeerMessage::VotePhase {} => {
                self.phase = GamePhase::Voting;
                self.has_voted = false;
            }
            PeerMessage::GameOver(payload) => {
                self.game_over = Some(payload);
                self.phase = GamePhase::Result;
            }
            PeerMessage::ResetLobby {} => {
                self.clear_round();
                self.phase = GamePhase::Lobby;
            }
            PeerMessage::Chat {
                from: Some(from),
                text,
            } => {
                push_chat(&mut self.chat, ChatLine { from, text });
            }
            other => {
                tracing::warn!("Ignoring {} from host", other.kind());
                return false;
            }
        }
        true
    }

    fn clear_round(&mut self) {
        self.game = None;
        self.game_over = None;
        self.has_voted = false;
    }

    /// Vote for `candidate`; returns the CAST_VOTE to send
    pub fn cast_vote(&mut self, candidate: &str) -> Result<PeerMessage, SessionError> {
        if self.phase != GamePhase::Voting {
            return Err(SessionError::WrongPhase {
                expected: GamePhase::Voting,
                actual: self.phase,
            });
        }
        if self.has_voted {
            return Err(SessionError::AlreadyVoted(self.nickname.clone()));
        }
        let known = self
            .game
            .as_ref()
            .is_some_and(|g| g.players.iter().any(|p| p.id == candidate));
        if !known {
            return Err(SessionError::UnknownPlayer(candidate.to_string()));
        }

        self.has_voted = true;
        Ok(PeerMessage::CastVote {
            voted_id: candidate.to_string(),
        })
    }

    /// Chat line to send to the host, if there is anything to say
    pub fn chat(&self, text: &str) -> Option<PeerMessage> {
        let text: String = text.trim().chars().take(MAX_CHAT_CHARS).collect();
        (!text.is_empty()).then_some(PeerMessage::Chat { from: None, text })
    }

    /// The host went away: the session is over for this guest
    pub fn on_host_closed(&mut self) {
        self.fail("Disconnected from host.");
    }

    pub fn on_connect_failed(&mut self) {
        self.fail("Connection failed.");
    }

    fn fail(&mut self, message: &str) {
        self.connection = ConnectionState::Error;
        self.phase = GamePhase::Lobby;
        self.players.clear();
        self.clear_round();
        self.error = Some(message.to_string());
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            room_code: self.room_code.clone(),
            nickname: self.nickname.clone(),
            is_host: false,
            connection: self.connection,
            phase: self.phase,
            players: self.players.clone(),
            game: self.game.clone(),
            game_over: self.game_over.clone(),
            has_voted: self.has_voted,
            votes: None,
            votes_received: None,
            chat: self.chat.clone(),
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, nickname: &str, join_index: u32) -> Player {
        Player {
            id: id.to_string(),
            nickname: nickname.to_string(),
            join_index,
            is_host: join_index == 0,
        }
    }

    fn start_payload(players: Vec<Player>) -> GameStartPayload {
        GameStartPayload {
            role: SecretRole::Citizen,
            word: "Taco".to_string(),
            starting_player_nickname: "Amber Owl".to_string(),
            theme: "Food".to_string(),
            players,
        }
    }

    fn connected() -> GuestMirror {
        let mut mirror = GuestMirror::new("K7P2".to_string(), "Ruby Fox".to_string());
        let join = mirror.on_open();
        assert_eq!(
            join,
            PeerMessage::Join {
                nickname: "Ruby Fox".to_string()
            }
        );
        mirror
    }

    #[test]
    fn test_player_list_replaces_wholesale() {
        let mut mirror = connected();
        mirror.apply(PeerMessage::PlayerList {
            players: vec![player("K7P2", "Host", 0), player("g1", "Ruby Fox", 1)],
        });
        mirror.apply(PeerMessage::PlayerList {
            players: vec![player("K7P2", "Host", 0)],
        });
        assert_eq!(mirror.players().len(), 1);
    }

    #[test]
    fn test_game_start_enters_reveal() {
        let mut mirror = connected();
        mirror.apply(PeerMessage::GameStart(start_payload(vec![])));
        assert_eq!(mirror.phase(), GamePhase::Reveal);
        assert_eq!(mirror.game().unwrap().word, "Taco");
    }

    #[test]
    fn test_vote_flow() {
        let mut mirror = connected();
        let players = vec![player("K7P2", "Host", 0), player("g1", "Ruby Fox", 1)];
        mirror.apply(PeerMessage::GameStart(start_payload(players)));

        assert!(matches!(
            mirror.cast_vote("K7P2"),
            Err(SessionError::WrongPhase { .. })
        ));

        mirror.apply(PeerMessage::VotePhase {});
        assert_eq!(mirror.phase(), GamePhase::Voting);
        assert!(matches!(
            mirror.cast_vote("ghost"),
            Err(SessionError::UnknownPlayer(_))
        ));
        assert_eq!(
            mirror.cast_vote("K7P2").unwrap(),
            PeerMessage::CastVote {
                voted_id: "K7P2".to_string()
            }
        );
        assert!(mirror.has_voted());
        assert!(matches!(
            mirror.cast_vote("K7P2"),
            Err(SessionError::AlreadyVoted(_))
        ));

        // A new voting phase clears the flag
        mirror.apply(PeerMessage::VotePhase {});
        assert!(!mirror.has_voted());
    }

    #[test]
    fn test_restart_clears_vote_flag() {
        let mut mirror = connected();
        let players = vec![player("K7P2", "Host", 0)];
        mirror.apply(PeerMessage::GameStart(start_payload(players.clone())));
        mirror.apply(PeerMessage::VotePhase {});
        mirror.cast_vote("K7P2").unwrap();
        mirror.apply(PeerMessage::GameStart(start_payload(players)));
        assert!(!mirror.has_voted());
        assert_eq!(mirror.phase(), GamePhase::Reveal);
    }

    #[test]
    fn test_game_over_then_reset() {
        let mut mirror = connected();
        mirror.apply(PeerMessage::GameStart(start_payload(vec![])));
        mirror.apply(PeerMessage::GameOver(GameOverPayload {
            winner: Winner::Citizens,
            imposters: vec!["Teal Wolf".to_string()],
            secret_word: "Taco".to_string(),
        }));
        assert_eq!(mirror.phase(), GamePhase::Result);
        assert!(mirror.game_over().is_some());

        mirror.apply(PeerMessage::ResetLobby {});
        assert_eq!(mirror.phase(), GamePhase::Lobby);
        assert!(mirror.game().is_none());
        assert!(mirror.game_over().is_none());
    }

    #[test]
    fn test_ignores_guest_bound_messages() {
        let mut mirror = connected();
        let changed = mirror.apply(PeerMessage::CastVote {
            voted_id: "x".to_string(),
        });
        assert!(!changed);
        assert!(!mirror.apply(PeerMessage::Chat {
            from: None,
            text: "unstamped".to_string()
        }));
    }

    #[test]
    fn test_host_closed() {
        let mut mirror = connected();
        mirror.apply(PeerMessage::GameStart(start_payload(vec![])));
        mirror.on_host_closed();
        assert_eq!(mirror.connection(), ConnectionState::Error);
        assert_eq!(mirror.error(), Some("Disconnected from host."));
        assert!(mirror.game().is_none());
        assert_eq!(mirror.phase(), GamePhase::Lobby);
    }

    #[test]
    fn test_chat() {
        let mut mirror = connected();
        assert!(mirror.chat("  ").is_none());
        assert_eq!(
            mirror.chat(" hi "),
            Some(PeerMessage::Chat {
                from: None,
                text: "hi".to_string()
            })
        );
        mirror.apply(PeerMessage::Chat {
            from: Some("Amber Owl".to_string()),
            text: "hello".to_string(),
        });
        assert_eq!(mirror.view().chat.len(), 1);
    }
}
