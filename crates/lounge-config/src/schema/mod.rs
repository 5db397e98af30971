//! Configuration schema types for Lounge.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod network;
mod room;
mod server;
mod system;

pub use network::*;
pub use room::*;
pub use server::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for Lounge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoungeConfig {
    pub backend: BackendConfig,
    pub room: RoomConfig,
    pub retry: RetryConfig,
    pub token: TokenConfig,
    pub realtime: RealtimeSettings,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_room_windows() {
        let config = LoungeConfig::default();
        assert_eq!(config.room.remote_reaction_ms, 3000);
        assert_eq!(config.room.local_reaction_ms, 2000);
        assert_eq!(config.room.speaking_tick_ms, 300);
    }

    #[test]
    fn default_token_source_is_static() {
        let config = LoungeConfig::default();
        assert_eq!(config.token.source, TokenSource::Static);
        assert_eq!(config.token.ttl_secs, 3600);
    }

    #[test]
    fn default_backend_url() {
        let config = LoungeConfig::default();
        assert_eq!(config.backend.url, "https://api.shemeansbusiness.app");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: LoungeConfig = toml::from_str(
            r#"
[room]
default_title = "Prayer & Worship Circle"

[retry]
max_attempts = 5
"#,
        )
        .unwrap();
        assert_eq!(config.room.default_title, "Prayer & Worship Circle");
        assert_eq!(config.room.remote_reaction_ms, 3000);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_backoff_ms, 500);
    }

    #[test]
    fn token_source_parses_lowercase() {
        let config: LoungeConfig = toml::from_str(
            r#"
[token]
source = "backend"
"#,
        )
        .unwrap();
        assert_eq!(config.token.source, TokenSource::Backend);
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let mut config = LoungeConfig::default();
        config.server.provider_api_key = "ak_live_123".into();
        config.server.token_secret = "super-secret".into();
        config.realtime.api_key = "anon-key".into();
        let debug = format!("{config:?}");
        assert!(!debug.contains("ak_live_123"));
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("anon-key"));
        assert!(debug.contains("[REDACTED]"));
    }
}
