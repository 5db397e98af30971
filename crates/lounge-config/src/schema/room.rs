//! Live room behaviour: display windows, animation ticks, retries, tokens.

use serde::{Deserialize, Serialize};

/// Room presentation and session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Title used when the room is created without an explicit one.
    pub default_title: String,
    /// How long an emoji stays on a remote participant's card (ms).
    pub remote_reaction_ms: u64,
    /// How long an emoji stays on the local card (ms).
    pub local_reaction_ms: u64,
    /// Speaking-level animation tick (ms).
    pub speaking_tick_ms: u64,
    /// How long to wait for the transport to confirm a join (seconds).
    pub join_timeout_secs: u64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            default_title: "Queen's Lounge".into(),
            remote_reaction_ms: 3000,
            local_reaction_ms: 2000,
            speaking_tick_ms: 300,
            join_timeout_secs: 15,
        }
    }
}

/// Bounded retry for room creation, token issuance, and join.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 8000,
        }
    }
}

/// Where the room join token comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    /// A fixed placeholder token. Joins with it are logged as a warning.
    #[default]
    Static,
    /// Ask the backend's token endpoint for a signed token.
    Backend,
}

/// Join token settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub source: TokenSource,
    /// Placeholder token used by [`TokenSource::Static`].
    pub static_token: String,
    /// Lifetime of tokens signed by the server (seconds).
    pub ttl_secs: u64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("source", &self.source)
            .field("static_token", &"[REDACTED]")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            source: TokenSource::Static,
            static_token: "your-real-token".into(),
            ttl_secs: 3600,
        }
    }
}
