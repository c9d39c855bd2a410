//! Session configuration, loaded once at startup.

use std::time::Duration;

/// Tunables consumed at construction time. Everything has a sensible default
/// so tests can just use `SessionConfig::default()`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Capacity bound for ordinary players (host and admin not counted).
    pub max_players: usize,
    /// Round count a fresh game starts with.
    pub default_total_rounds: u32,
    /// Nicknames that claim the host role on join (matched case-insensitively).
    pub reserved_host_names: Vec<String>,
    /// Nickname length cap.
    pub max_name_len: usize,
    /// Coalescing window for non-forced snapshot broadcasts.
    pub update_throttle: Duration,
    /// Delay before the post-start "check your connections" notice.
    pub post_start_notice: Duration,
    /// Path to the static card catalog.
    pub cards_file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            default_total_rounds: 5,
            reserved_host_names: vec![
                "host".to_string(),
                "admin".to_string(),
                "moderator".to_string(),
            ],
            max_name_len: 24,
            update_throttle: Duration::from_millis(100),
            post_start_notice: Duration::from_secs(3),
            cards_file: "data/cards.json".to_string(),
        }
    }
}

impl SessionConfig {
    /// Load config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_players = std::env::var("BUNKER_MAX_PLAYERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_players);

        let default_total_rounds = std::env::var("BUNKER_TOTAL_ROUNDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.default_total_rounds);

        let reserved_host_names = std::env::var("BUNKER_HOST_NAMES")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.reserved_host_names);

        let cards_file =
            std::env::var("BUNKER_CARDS_FILE").unwrap_or(defaults.cards_file);

        Self {
            max_players,
            default_total_rounds,
            reserved_host_names,
            cards_file,
            ..defaults
        }
    }

    pub fn is_reserved_host_name(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.reserved_host_names.iter().any(|n| *n == lower)
    }
}
