//! Configuration, protocol types, and event/command enums for the realtime client.

use std::collections::HashMap;

use lounge_config::RealtimeSettings;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a Phoenix realtime endpoint.
#[derive(Clone)]
pub struct RealtimeConfig {
    /// WebSocket endpoint without query string.
    pub url: String,
    /// Publishable API key.
    pub api_key: String,
    /// Room join token, sent with every channel join.
    pub access_token: Option<String>,
    pub heartbeat_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    pub max_reconnect_delay_secs: u64,
}

impl std::fmt::Debug for RealtimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("max_reconnect_delay_secs", &self.max_reconnect_delay_secs)
            .finish()
    }
}

impl From<&RealtimeSettings> for RealtimeConfig {
    fn from(settings: &RealtimeSettings) -> Self {
        Self {
            url: settings.url.clone(),
            api_key: settings.api_key.clone(),
            access_token: None,
            heartbeat_interval_secs: settings.heartbeat_interval,
            reconnect_delay_secs: settings.reconnect_delay,
            max_reconnect_delay_secs: settings.max_reconnect_delay,
        }
    }
}

impl RealtimeConfig {
    pub(crate) fn ws_url(&self) -> String {
        format!("{}?apikey={}&vsn=1.0.0", self.url, self.api_key)
    }
}

// ---------------------------------------------------------------------------
// Phoenix Protocol Types
// ---------------------------------------------------------------------------

/// A Phoenix protocol message envelope (v1 JSON format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    pub payload: serde_json::Value,
    #[serde(rename = "ref")]
    pub msg_ref: Option<String>,
}

// ---------------------------------------------------------------------------
// Channel Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub broadcast: BroadcastConfig,
    pub presence: PresenceKeyConfig,
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Receive our own broadcasts.
    pub self_send: bool,
    /// Ask the server to acknowledge broadcasts.
    pub ack: bool,
}

#[derive(Debug, Clone)]
pub struct PresenceKeyConfig {
    /// Key identifying this client in presence state (the peer id).
    pub key: String,
}

impl ChannelConfig {
    /// The `phx_join` payload.
    pub(crate) fn to_join_payload(&self, access_token: Option<&str>) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "config": {
                "broadcast": {
                    "self": self.broadcast.self_send,
                    "ack": self.broadcast.ack
                },
                "presence": {
                    "key": self.presence.key
                }
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = serde_json::json!(token);
        }
        payload
    }
}

// ---------------------------------------------------------------------------
// Events & Commands
// ---------------------------------------------------------------------------

/// Events emitted by the realtime client.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    Connected,
    Disconnected,
    ChannelJoined {
        topic: String,
    },
    ChannelError {
        topic: String,
        message: String,
    },
    Broadcast {
        topic: String,
        event: String,
        payload: serde_json::Value,
    },
    /// Full presence snapshot, sent right after a join.
    PresenceState {
        topic: String,
        state: HashMap<String, Vec<serde_json::Value>>,
    },
    PresenceDiff {
        topic: String,
        joins: HashMap<String, Vec<serde_json::Value>>,
        leaves: HashMap<String, Vec<serde_json::Value>>,
    },
    Error(String),
}

/// Commands sent to the connection task.
#[derive(Debug)]
pub(crate) enum RealtimeCommand {
    JoinChannel {
        topic: String,
        config: ChannelConfig,
    },
    LeaveChannel {
        topic: String,
    },
    Broadcast {
        topic: String,
        event: String,
        payload: serde_json::Value,
    },
    PresenceTrack {
        topic: String,
        payload: serde_json::Value,
    },
    Disconnect,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_payload_includes_token_when_present() {
        let config = ChannelConfig {
            broadcast: BroadcastConfig {
                self_send: false,
                ack: true,
            },
            presence: PresenceKeyConfig { key: "p1".into() },
        };
        let payload = config.to_join_payload(Some("jwt"));
        assert_eq!(payload["config"]["presence"]["key"], "p1");
        assert_eq!(payload["config"]["broadcast"]["self"], false);
        assert_eq!(payload["access_token"], "jwt");
        assert!(config.to_join_payload(None).get("access_token").is_none());
    }

    #[test]
    fn ws_url_appends_key_and_version() {
        let config = RealtimeConfig {
            url: "wss://example.test/realtime/v1/websocket".into(),
            api_key: "anon".into(),
            access_token: None,
            heartbeat_interval_secs: 25,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        };
        assert_eq!(
            config.ws_url(),
            "wss://example.test/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn debug_redacts_keys() {
        let config = RealtimeConfig {
            url: "wss://x".into(),
            api_key: "anon-secret".into(),
            access_token: Some("jwt-secret".into()),
            heartbeat_interval_secs: 25,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("anon-secret"));
        assert!(!debug.contains("jwt-secret"));
    }
}
