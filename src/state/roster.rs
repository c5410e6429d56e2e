use crate::types::{Player, PlayerId};

/// Ordered set of connected players, insertion order = join order
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: Vec<Player>,
    /// Players ever added this session; never decremented
    joined: u32,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the roster with the host, who always holds join index 0
    pub fn with_host(id: PlayerId, nickname: String) -> Self {
        let mut roster = Self::new();
        roster.insert(id, nickname, true);
        roster
    }

    /// Add a player. Returns `None` if the id is already present.
    pub fn add_player(&mut self, id: PlayerId, nickname: String) -> Option<Player> {
        if self.contains(&id) {
            return None;
        }
        Some(self.insert(id, nickname, false))
    }

    fn insert(&mut self, id: PlayerId, nickname: String, is_host: bool) -> Player {
        let player = Player {
            id,
            nickname,
            join_index: self.joined,
            is_host,
        };
        self.joined += 1;
        self.players.push(player.clone());
        player
    }

    /// Remove a player by id. Other players keep their join index.
    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        let pos = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(pos))
    }

    /// Join index the next added player will get
    pub fn next_join_index(&self) -> u32 {
        self.joined
    }

    pub fn current(&self) -> &[Player] {
        &self.players
    }

    pub fn get(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
