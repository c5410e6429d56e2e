mod mirror;
mod roster;
pub mod round;
mod vote;

pub use mirror::GuestMirror;
pub use roster::Roster;
pub use vote::VoteTally;

use crate::protocol::PeerMessage;
use crate::types::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};

/// Longest chat line relayed, in characters
pub const MAX_CHAT_CHARS: usize = 200;
/// Chat lines kept per process
pub const CHAT_HISTORY: usize = 50;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("expected phase {expected:?}, but session is in {actual:?}")]
    WrongPhase {
        expected: GamePhase,
        actual: GamePhase,
    },

    #[error("need at least {need} players, have {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    #[error("unknown theme: {0}")]
    UnknownTheme(String),

    #[error("a round needs at least one imposter")]
    NoImposters,

    #[error("unknown player: {0}")]
    UnknownPlayer(PlayerId),

    #[error("player {0} already voted this phase")]
    AlreadyVoted(PlayerId),

    #[error("no votes have been cast")]
    NoVotes,

    #[error("no round in progress")]
    NoActiveRound,

    #[error("no player is eligible to start speaking")]
    NoEligibleSpeaker,

    #[error("peer {0} has not joined")]
    NotJoined(PlayerId),

    #[error("{0} is not accepted from this sender")]
    UnexpectedMessage(&'static str),
}

/// A cross-process effect produced by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Unicast(PlayerId, PeerMessage),
    Broadcast(PeerMessage),
}

/// Result of revealing the voted player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteVerdict {
    /// The voted player was an imposter
    Caught(GameOverPayload),
    /// Wrong guess: same secret, new speaker, back to REVEAL
    Restarted { starting_player: Player },
    /// Wrong guess with no citizen left to speak
    ImpostersWin(GameOverPayload),
}

impl VoteVerdict {
    pub fn winner(&self) -> Winner {
        match self {
            VoteVerdict::Caught(_) => Winner::Citizens,
            VoteVerdict::Restarted { .. } | VoteVerdict::ImpostersWin(_) => Winner::Imposters,
        }
    }
}

/// Everything the presentation layer renders, for host and guests alike
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub room_code: String,
    pub nickname: String,
    pub is_host: bool,
    pub connection: ConnectionState,
    pub phase: GamePhase,
    pub players: Vec<Player>,
    pub game: Option<GameStartPayload>,
    pub game_over: Option<GameOverPayload>,
    pub has_voted: bool,
    /// Host only
    pub votes: Option<HashMap<PlayerId, u32>>,
    /// Host only
    pub votes_received: Option<usize>,
    pub chat: Vec<ChatLine>,
    pub error: Option<String>,
}

/// Host-authoritative session state machine.
///
/// Owns the roster, the round secret and the vote tally. Every mutation goes
/// through one of the methods below and returns the messages the transport
/// must deliver; nothing is sent as a side effect.
pub struct Coordinator {
    room_code: String,
    nickname: String,
    roster: Roster,
    /// Connected peers that have not sent JOIN yet
    pending: HashSet<PlayerId>,
    phase: GamePhase,
    settings: GameSettings,
    secret: Option<RoundSecret>,
    /// Roster snapshot of the current round, for revealing imposter names
    round_players: Vec<Player>,
    tally: VoteTally,
    local_game: Option<GameStartPayload>,
    game_over: Option<GameOverPayload>,
    chat: Vec<ChatLine>,
    rng: StdRng,
}

impl Coordinator {
    pub fn new(room_code: String, nickname: String) -> Self {
        Self::with_rng(room_code, nickname, StdRng::from_os_rng())
    }

    /// Use a specific random source (seeded in tests)
    pub fn with_rng(room_code: String, nickname: String, rng: StdRng) -> Self {
        let roster = Roster::with_host(room_code.clone(), nickname.clone());
        Self {
            room_code,
            nickname,
            roster,
            pending: HashSet::new(),
            phase: GamePhase::Lobby,
            settings: GameSettings::default(),
            secret: None,
            round_players: Vec::new(),
            tally: VoteTally::new(),
            local_game: None,
            game_over: None,
            chat: Vec::new(),
            rng,
        }
    }

    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    /// The host's own player id (the room code)
    pub fn host_id(&self) -> &str {
        &self.room_code
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn secret(&self) -> Option<&RoundSecret> {
        self.secret.as_ref()
    }

    pub fn tally(&self) -> &VoteTally {
        &self.tally
    }

    pub fn local_game(&self) -> Option<&GameStartPayload> {
        self.local_game.as_ref()
    }

    pub fn game_over(&self) -> Option<&GameOverPayload> {
        self.game_over.as_ref()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    fn player_list(&self) -> Outbound {
        Outbound::Broadcast(PeerMessage::PlayerList {
            players: self.roster.current().to_vec(),
        })
    }

    fn require_phase(&self, expected: GamePhase) -> Result<(), SessionError> {
        if self.phase != expected {
            return Err(SessionError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    /// Transport opened a channel. The player is added on JOIN.
    pub fn on_peer_joined(&mut self, id: &str) {
        tracing::debug!("Peer {} connected, waiting for JOIN", id);
        self.pending.insert(id.to_string());
    }

    /// Transport closed a channel. The round keeps going without the player.
    pub fn on_peer_left(&mut self, id: &str) -> Vec<Outbound> {
        self.pending.remove(id);
        if id == self.host_id() {
            return Vec::new();
        }
        match self.roster.remove_player(id) {
            Some(player) => {
                tracing::info!(
                    "Player {} ({}) left during {:?}",
                    player.nickname,
                    id,
                    self.phase
                );
                vec![self.player_list()]
            }
            None => Vec::new(),
        }
    }

    /// Handle one inbound guest message
    pub fn on_message(
        &mut self,
        from: &str,
        msg: PeerMessage,
    ) -> Result<Vec<Outbound>, SessionError> {
        if from == self.host_id() {
            return Err(SessionError::UnexpectedMessage(msg.kind()));
        }

        match msg {
            PeerMessage::Join { nickname } => Ok(self.handle_join(from, nickname)),
            PeerMessage::CastVote { voted_id } => {
                self.record_vote(from, &voted_id)?;
                Ok(Vec::new())
            }
            PeerMessage::Chat { text, .. } => {
                let nickname = self
                    .roster
                    .get(from)
                    .map(|p| p.nickname.clone())
                    .ok_or_else(|| SessionError::NotJoined(from.to_string()))?;
                Ok(self.relay_chat(nickname, &text))
            }
            other => Err(SessionError::UnexpectedMessage(other.kind())),
        }
    }

    fn handle_join(&mut self, id: &str, nickname: String) -> Vec<Outbound> {
        let nickname = nickname.trim().to_string();
        let nickname = if nickname.is_empty() {
            format!("Player {}", self.roster.next_join_index() + 1)
        } else {
            nickname
        };

        self.pending.remove(id);
        match self.roster.add_player(id.to_string(), nickname) {
            Some(player) => {
                tracing::info!(
                    "Player {} joined as #{} ({})",
                    player.nickname,
                    player.join_index,
                    id
                );
                vec![self.player_list()]
            }
            None => {
                tracing::debug!("Ignoring repeated JOIN from {}", id);
                Vec::new()
            }
        }
    }

    fn record_vote(&mut self, voter: &str, candidate: &str) -> Result<(), SessionError> {
        self.require_phase(GamePhase::Voting)?;
        if !self.roster.contains(voter) {
            return Err(SessionError::NotJoined(voter.to_string()));
        }
        let known_candidate = self
            .local_game
            .as_ref()
            .is_some_and(|g| g.players.iter().any(|p| p.id == candidate));
        if !known_candidate {
            return Err(SessionError::UnknownPlayer(candidate.to_string()));
        }

        let count = self.tally.cast_vote(voter, candidate)?;
        tracing::debug!(
            "Vote from {} for {} (now {}, {} of {} voted)",
            voter,
            candidate,
            count,
            self.tally.votes_received(),
            self.roster.len()
        );
        Ok(())
    }

    /// The host's own vote
    pub fn cast_local_vote(&mut self, candidate: &str) -> Result<(), SessionError> {
        let host_id = self.host_id().to_string();
        self.record_vote(&host_id, candidate)
    }

    /// Host chat line, relayed like a guest's
    pub fn say(&mut self, text: &str) -> Vec<Outbound> {
        let nickname = self.nickname.clone();
        self.relay_chat(nickname, text)
    }

    fn relay_chat(&mut self, from: String, text: &str) -> Vec<Outbound> {
        let text: String = text.trim().chars().take(MAX_CHAT_CHARS).collect();
        if text.is_empty() {
            return Vec::new();
        }
        push_chat(
            &mut self.chat,
            ChatLine {
                from: from.clone(),
                text: text.clone(),
            },
        );
        vec![Outbound::Broadcast(PeerMessage::Chat {
            from: Some(from),
            text,
        })]
    }

    /// LOBBY -> REVEAL. Each player gets only their own payload.
    pub fn start_game(&mut self, settings: GameSettings) -> Result<Vec<Outbound>, SessionError> {
        self.require_phase(GamePhase::Lobby)?;
        if settings.imposter_count == 0 {
            return Err(SessionError::NoImposters);
        }

        let players = self.roster.current().to_vec();
        let round = round::start_round(&players, &settings, &mut self.rng)?;
        tracing::info!(
            "Starting round: theme={}, imposters={}, players={}",
            round.secret.theme,
            round.secret.imposter_ids.len(),
            players.len()
        );

        self.settings = settings;
        self.secret = Some(round.secret);
        self.round_players = players;
        self.tally.reset();
        self.game_over = None;

        let outbound = self.fan_out(round.payloads);
        self.phase = GamePhase::Reveal;
        Ok(outbound)
    }

    /// Keep the host's payload, unicast the rest in roster order
    fn fan_out(&mut self, mut payloads: round::PayloadFanout) -> Vec<Outbound> {
        self.local_game = payloads.remove(self.host_id());
        self.roster
            .current()
            .iter()
            .filter_map(|p| {
                payloads
                    .remove(&p.id)
                    .map(|payload| Outbound::Unicast(p.id.clone(), PeerMessage::GameStart(payload)))
            })
            .collect()
    }

    /// Open (or reopen) voting for the current round
    pub fn initiate_vote(&mut self) -> Result<Vec<Outbound>, SessionError> {
        if self.secret.is_none() || self.phase == GamePhase::Result {
            return Err(SessionError::NoActiveRound);
        }
        self.tally.reset();
        self.phase = GamePhase::Voting;
        tracing::info!("Voting opened");
        Ok(vec![Outbound::Broadcast(PeerMessage::VotePhase {})])
    }

    /// Reveal `candidate` and resolve the vote
    pub fn finalize_vote(
        &mut self,
        candidate: &str,
    ) -> Result<(VoteVerdict, Vec<Outbound>), SessionError> {
        self.require_phase(GamePhase::Voting)?;
        let secret = self.secret.clone().ok_or(SessionError::NoActiveRound)?;

        if secret.is_imposter(candidate) {
            tracing::info!("Imposter {} caught", candidate);
            let payload = self.end_round(Winner::Citizens, &secret);
            let outbound = vec![Outbound::Broadcast(PeerMessage::GameOver(payload.clone()))];
            return Ok((VoteVerdict::Caught(payload), outbound));
        }

        let players = self.roster.current().to_vec();
        match round::restart_round(&players, &secret, &mut self.rng) {
            Ok(restart) => {
                tracing::info!(
                    "Wrong guess ({}), {} speaks next",
                    candidate,
                    restart.starting_player.nickname
                );
                self.tally.reset();
                let outbound = self.fan_out(restart.payloads);
                self.phase = GamePhase::Reveal;
                Ok((
                    VoteVerdict::Restarted {
                        starting_player: restart.starting_player,
                    },
                    outbound,
                ))
            }
            Err(SessionError::NoEligibleSpeaker) => {
                tracing::info!("Wrong guess and no citizens left, imposters win");
                let payload = self.end_round(Winner::Imposters, &secret);
                let outbound = vec![Outbound::Broadcast(PeerMessage::GameOver(payload.clone()))];
                Ok((VoteVerdict::ImpostersWin(payload), outbound))
            }
            Err(e) => Err(e),
        }
    }

    /// Finalize on whoever currently leads the tally
    pub fn finalize_leading_vote(&mut self) -> Result<(VoteVerdict, Vec<Outbound>), SessionError> {
        self.require_phase(GamePhase::Voting)?;
        let leader = self.tally.leader().cloned().ok_or(SessionError::NoVotes)?;
        self.finalize_vote(&leader)
    }

    fn end_round(&mut self, winner: Winner, secret: &RoundSecret) -> GameOverPayload {
        let imposters = self
            .round_players
            .iter()
            .filter(|p| secret.is_imposter(&p.id))
            .map(|p| p.nickname.clone())
            .collect();
        let payload = GameOverPayload {
            winner,
            imposters,
            secret_word: secret.word.clone(),
        };
        self.game_over = Some(payload.clone());
        self.phase = GamePhase::Result;
        payload
    }

    /// Any phase -> LOBBY, dropping all round state
    pub fn back_to_lobby(&mut self) -> Vec<Outbound> {
        self.phase = GamePhase::Lobby;
        self.secret = None;
        self.round_players.clear();
        self.tally.reset();
        self.local_game = None;
        self.game_over = None;
        tracing::info!("Back to lobby");
        vec![Outbound::Broadcast(PeerMessage::ResetLobby {})]
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            room_code: self.room_code.clone(),
            nickname: self.nickname.clone(),
            is_host: true,
            connection: ConnectionState::Connected,
            phase: self.phase,
            players: self.roster.current().to_vec(),
            game: self.local_game.clone(),
            game_over: self.game_over.clone(),
            has_voted: self.tally.has_voted(self.host_id()),
            votes: Some(self.tally.counts()),
            votes_received: Some(self.tally.votes_received()),
            chat: self.chat.clone(),
            error: None,
        }
    }
}

pub(crate) fn push_chat(log: &mut Vec<ChatLine>, line: ChatLine) {
    log.push(line);
    if log.len() > CHAT_HISTORY {
        let excess = log.len() - CHAT_HISTORY;
        log.drain(..excess);
    }
}
