//! Incoming Phoenix message handler and presence parsing.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::connection::ChannelTable;
use super::types::{PhoenixMessage, RealtimeEvent};

/// Strip the `realtime:` prefix from a Phoenix topic.
fn strip_topic_prefix(topic: &str) -> &str {
    topic.strip_prefix("realtime:").unwrap_or(topic)
}

/// Parse a Phoenix presence map into `HashMap<key, Vec<meta>>`.
///
/// Presence arrives as `{ "key": { "metas": [{ ... }] } }`.
pub(crate) fn parse_presence_map(
    value: &serde_json::Value,
) -> HashMap<String, Vec<serde_json::Value>> {
    let mut result = HashMap::new();
    if let Some(obj) = value.as_object() {
        for (key, val) in obj {
            if let Some(metas) = val.get("metas").and_then(|m| m.as_array()) {
                result.insert(key.clone(), metas.clone());
            }
        }
    }
    result
}

/// Handle a single incoming Phoenix message.
pub(crate) async fn handle_phoenix_message(
    msg: &PhoenixMessage,
    channels: &ChannelTable,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) {
    let topic = strip_topic_prefix(&msg.topic);

    let event = match msg.event.as_str() {
        "phx_reply" => {
            // Only replies to our own joins matter; broadcast acks and
            // heartbeat replies are dropped.
            let is_join_reply = {
                let table = channels.read().await;
                match (table.get(topic), msg.msg_ref.as_deref()) {
                    (Some(channel), Some(msg_ref)) => channel.join_ref == msg_ref,
                    _ => false,
                }
            };
            if !is_join_reply {
                return;
            }
            match msg.payload.get("status").and_then(|s| s.as_str()) {
                Some("ok") => {
                    debug!(topic = %topic, "Channel joined");
                    RealtimeEvent::ChannelJoined {
                        topic: topic.to_string(),
                    }
                }
                status => {
                    let message = msg
                        .payload
                        .get("response")
                        .and_then(|r| r.get("reason"))
                        .and_then(|r| r.as_str())
                        .unwrap_or("unknown error")
                        .to_string();
                    warn!(topic = %topic, status = ?status, reason = %message, "Channel join refused");
                    RealtimeEvent::ChannelError {
                        topic: topic.to_string(),
                        message,
                    }
                }
            }
        }
        "phx_error" => {
            warn!(topic = %topic, "Channel error");
            RealtimeEvent::ChannelError {
                topic: topic.to_string(),
                message: "Channel error".to_string(),
            }
        }
        "phx_close" => {
            info!(topic = %topic, "Channel closed");
            RealtimeEvent::ChannelError {
                topic: topic.to_string(),
                message: "Channel closed".to_string(),
            }
        }
        "broadcast" => {
            let inner_event = msg
                .payload
                .get("event")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown")
                .to_string();
            let inner_payload = msg
                .payload
                .get("payload")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            debug!(topic = %topic, event = %inner_event, "Broadcast received");
            RealtimeEvent::Broadcast {
                topic: topic.to_string(),
                event: inner_event,
                payload: inner_payload,
            }
        }
        "presence_state" => {
            let state = parse_presence_map(&msg.payload);
            debug!(topic = %topic, peers = state.len(), "Presence state received");
            RealtimeEvent::PresenceState {
                topic: topic.to_string(),
                state,
            }
        }
        "presence_diff" => {
            let joins = msg
                .payload
                .get("joins")
                .map(parse_presence_map)
                .unwrap_or_default();
            let leaves = msg
                .payload
                .get("leaves")
                .map(parse_presence_map)
                .unwrap_or_default();
            debug!(
                topic = %topic,
                joins = joins.len(),
                leaves = leaves.len(),
                "Presence diff received"
            );
            RealtimeEvent::PresenceDiff {
                topic: topic.to_string(),
                joins,
                leaves,
            }
        }
        _ => {
            debug!(topic = %topic, event = %msg.event, "Unhandled Phoenix event");
            return;
        }
    };

    let _ = event_tx.send(event).await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use super::super::connection::JoinedChannel;
    use super::super::types::{BroadcastConfig, ChannelConfig, PresenceKeyConfig};
    use super::*;

    fn table_with_join(topic: &str, join_ref: &str) -> ChannelTable {
        let mut map = HashMap::new();
        map.insert(
            topic.to_string(),
            JoinedChannel {
                config: ChannelConfig {
                    broadcast: BroadcastConfig {
                        self_send: false,
                        ack: false,
                    },
                    presence: PresenceKeyConfig { key: "me".into() },
                },
                join_ref: join_ref.to_string(),
                presence_payload: None,
            },
        );
        Arc::new(RwLock::new(map))
    }

    fn frame(event: &str, payload: serde_json::Value, msg_ref: Option<&str>) -> PhoenixMessage {
        PhoenixMessage {
            topic: "realtime:room:r1".into(),
            event: event.into(),
            payload,
            msg_ref: msg_ref.map(String::from),
        }
    }

    #[test]
    fn presence_map_reads_metas() {
        let map = parse_presence_map(&serde_json::json!({
            "p1": { "metas": [{ "peerId": "p1" }] },
            "bad": { "nothing": true }
        }));
        assert_eq!(map.len(), 1);
        assert_eq!(map["p1"][0]["peerId"], "p1");
    }

    #[tokio::test]
    async fn join_reply_emits_channel_joined() {
        let channels = table_with_join("room:r1", "7");
        let (tx, mut rx) = mpsc::channel(4);
        let reply = frame("phx_reply", serde_json::json!({"status": "ok"}), Some("7"));
        handle_phoenix_message(&reply, &channels, &tx).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(RealtimeEvent::ChannelJoined { topic }) if topic == "room:r1"
        ));
    }

    #[tokio::test]
    async fn unrelated_replies_are_ignored() {
        let channels = table_with_join("room:r1", "7");
        let (tx, mut rx) = mpsc::channel(4);
        let ack = frame("phx_reply", serde_json::json!({"status": "ok"}), Some("8"));
        handle_phoenix_message(&ack, &channels, &tx).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn refused_join_carries_reason() {
        let channels = table_with_join("room:r1", "7");
        let (tx, mut rx) = mpsc::channel(4);
        let reply = frame(
            "phx_reply",
            serde_json::json!({"status": "error", "response": {"reason": "unauthorized"}}),
            Some("7"),
        );
        handle_phoenix_message(&reply, &channels, &tx).await;
        assert!(matches!(
            rx.try_recv(),
            Ok(RealtimeEvent::ChannelError { message, .. }) if message == "unauthorized"
        ));
    }

    #[tokio::test]
    async fn broadcast_unwraps_inner_event() {
        let channels = table_with_join("room:r1", "7");
        let (tx, mut rx) = mpsc::channel(4);
        let msg = frame(
            "broadcast",
            serde_json::json!({"type": "broadcast", "event": "data", "payload": {"x": 1}}),
            None,
        );
        handle_phoenix_message(&msg, &channels, &tx).await;
        match rx.try_recv() {
            Ok(RealtimeEvent::Broadcast {
                topic,
                event,
                payload,
            }) => {
                assert_eq!(topic, "room:r1");
                assert_eq!(event, "data");
                assert_eq!(payload["x"], 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
