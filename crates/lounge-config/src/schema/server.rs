//! Backend server settings.

use serde::{Deserialize, Serialize};

/// Settings for the `lounge-server` binary.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Conferencing provider API base, e.g. `https://api.huddle01.com/api/v1`.
    pub provider_url: String,
    /// Sent as `x-api-key` to the provider.
    pub provider_api_key: String,
    /// HMAC secret for join tokens.
    pub token_secret: String,
    /// Room type requested from the provider.
    pub room_type: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("provider_url", &self.provider_url)
            .field("provider_api_key", &"[REDACTED]")
            .field("token_secret", &"[REDACTED]")
            .field("room_type", &self.room_type)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4242,
            provider_url: "https://api.huddle01.com/api/v1".into(),
            provider_api_key: String::new(),
            token_secret: String::new(),
            room_type: "audio".into(),
        }
    }
}
