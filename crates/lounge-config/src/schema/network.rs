//! Backend API and realtime transport endpoints.

use serde::{Deserialize, Serialize};

/// Backend HTTP API used to create rooms and issue tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// Per-request timeout (seconds).
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "https://api.shemeansbusiness.app".into(),
            timeout_secs: 10,
        }
    }
}

/// Realtime (Phoenix channels) transport settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// WebSocket endpoint, without query string.
    pub url: String,
    /// Publishable API key appended to the socket URL.
    pub api_key: String,
    pub heartbeat_interval: u64,
    pub reconnect_delay: u64,
    pub max_reconnect_delay: u64,
}

impl std::fmt::Debug for RealtimeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeSettings")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("max_reconnect_delay", &self.max_reconnect_delay)
            .finish()
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            heartbeat_interval: 25,
            reconnect_delay: 1,
            max_reconnect_delay: 30,
        }
    }
}
