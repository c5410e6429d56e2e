//! Local identity: cached nickname and room-code generation

use crate::words::{ANIMALS, COLORS};
use rand::Rng;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Key the nickname is cached under
pub const STORAGE_KEY: &str = "p2p_nickname";

/// Room code alphabet (no 0/O, 1/I so codes can be read aloud)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("identity file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Normalize user input into a room code, rejecting characters outside the alphabet
pub fn parse_room_code(input: &str) -> Option<String> {
    let code = input.trim().to_ascii_uppercase();
    let valid = code.len() == CODE_LENGTH && code.bytes().all(|b| CODE_CHARS.contains(&b));
    valid.then_some(code)
}

/// "<Color> <Animal>"
pub fn random_nickname<R: Rng + ?Sized>(rng: &mut R) -> String {
    let color = COLORS[rng.random_range(0..COLORS.len())];
    let animal = ANIMALS[rng.random_range(0..ANIMALS.len())];
    format!("{} {}", color, animal)
}

/// Nickname cache backed by a small JSON file
#[derive(Debug, Clone)]
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached nickname, if any
    pub fn load(&self) -> Result<Option<String>, IdentityError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let map: Map<String, Value> = serde_json::from_str(&contents)?;
        Ok(map
            .get(STORAGE_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }

    pub fn save(&self, nickname: &str) -> Result<(), IdentityError> {
        let mut map = Map::new();
        map.insert(STORAGE_KEY.to_string(), Value::String(nickname.to_string()));
        std::fs::write(&self.path, serde_json::to_string_pretty(&map)?)?;
        Ok(())
    }

    /// Return the cached nickname, generating and caching one if absent.
    ///
    /// Storage problems never prevent play: a fresh nickname is still returned.
    pub fn get_or_create(&self) -> String {
        match self.load() {
            Ok(Some(nickname)) => return nickname,
            Ok(None) => {}
            Err(e) => tracing::warn!("Ignoring unreadable identity file {:?}: {}", self.path, e),
        }

        let nickname = random_nickname(&mut rand::rng());
        if let Err(e) = self.save(&nickname) {
            tracing::warn!("Failed to cache nickname in {:?}: {}", self.path, e);
        }
        nickname
    }
}
