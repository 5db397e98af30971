//! Lounge configuration system.
//!
//! TOML-based configuration for the live room client and the backend
//! server. Every section uses serde defaults so a partial file (or no file
//! at all) produces a working setup.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lounge_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    BackendConfig, LogLevel, LoggingConfig, LoungeConfig, RealtimeSettings, RetryConfig,
    RoomConfig, ServerConfig, TokenConfig, TokenSource, CONFIG_SCHEMA_VERSION,
};

use lounge_common::ConfigError;

/// Load config from the platform default path and validate it.
///
/// Creates a documented default file when none exists.
pub fn load_config() -> Result<LoungeConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string. Secrets are
/// serialized as-is, so only print this to a trusted terminal.
pub fn config_to_json(config: &LoungeConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let json = config_to_json(&LoungeConfig::default());
        for section in [
            "\"backend\"",
            "\"room\"",
            "\"retry\"",
            "\"token\"",
            "\"realtime\"",
            "\"server\"",
            "\"logging\"",
        ] {
            assert!(json.contains(section), "missing section {section}");
        }
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn default_config_round_trips_through_json() {
        let json = config_to_json(&LoungeConfig::default());
        let parsed: LoungeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.room.default_title, "Queen's Lounge");
        assert_eq!(parsed.room.remote_reaction_ms, 3000);
        assert_eq!(parsed.server.port, 4242);
    }
}
