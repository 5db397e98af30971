//! Full configuration validation.
//!
//! Each domain has its own submodule; this orchestrator calls them all and
//! collects errors into a single `ConfigError`.

mod helpers;
mod network;
mod room;


use crate::schema::LoungeConfig;
use lounge_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &LoungeConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    room::validate_room(&mut errors, config);
    room::validate_retry(&mut errors, config);
    room::validate_token(&mut errors, config);
    network::validate_backend(&mut errors, config);
    network::validate_realtime(&mut errors, config);
    network::validate_server(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
