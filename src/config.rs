use crate::types::GameSettings;
use crate::words;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "0.0.0.0:6574";
pub const DEFAULT_IDENTITY_FILE: &str = ".imposter_identity.json";
/// The lobby offers one or two imposters
pub const MAX_IMPOSTERS: usize = 2;

/// Process configuration, read from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the host listens on
    pub bind: SocketAddr,
    /// Where the nickname is cached
    pub identity_file: PathBuf,
    /// Overrides the cached nickname when set
    pub nickname: Option<String>,
    /// Settings preselected in the lobby
    pub default_settings: GameSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 6574)),
            identity_file: PathBuf::from(DEFAULT_IDENTITY_FILE),
            nickname: None,
            default_settings: GameSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load config from environment variables.
    ///
    /// IMPOSTER_BIND, IMPOSTER_IDENTITY_FILE, IMPOSTER_NICKNAME, IMPOSTER_THEME and
    /// IMPOSTER_IMPOSTERS. Invalid values fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind = match env_var("IMPOSTER_BIND") {
            Some(v) => v.parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid IMPOSTER_BIND {:?}, using {}", v, DEFAULT_BIND);
                defaults.bind
            }),
            None => defaults.bind,
        };

        let identity_file = env_var("IMPOSTER_IDENTITY_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.identity_file);

        let nickname = env_var("IMPOSTER_NICKNAME");

        let theme = match env_var("IMPOSTER_THEME") {
            Some(v) => match words::find_theme(&v) {
                Some(t) => t.name.to_string(),
                None => {
                    tracing::warn!("Unknown IMPOSTER_THEME {:?}, using default", v);
                    defaults.default_settings.theme.clone()
                }
            },
            None => defaults.default_settings.theme.clone(),
        };

        let imposter_count = match env_var("IMPOSTER_IMPOSTERS") {
            Some(v) => match v.parse::<usize>() {
                Ok(n) if (1..=MAX_IMPOSTERS).contains(&n) => n,
                _ => {
                    tracing::warn!("Invalid IMPOSTER_IMPOSTERS {:?}, using 1", v);
                    defaults.default_settings.imposter_count
                }
            },
            None => defaults.default_settings.imposter_count,
        };

        tracing::info!(%bind, ?identity_file, %theme, imposter_count, "Config loaded");

        Self {
            bind,
            identity_file,
            nickname,
            default_settings: GameSettings {
                theme,
                imposter_count,
            },
        }
    }
}

/// Trimmed, non-empty env var
fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
