//! Background WebSocket connection loop with auto-reconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use super::handler::handle_phoenix_message;
use super::types::{
    ChannelConfig, PhoenixMessage, RealtimeCommand, RealtimeConfig, RealtimeEvent,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Monotonically increasing ref counter for Phoenix messages.
static REF_COUNTER: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_ref() -> String {
    REF_COUNTER.fetch_add(1, Ordering::Relaxed).to_string()
}

/// A channel to restore after reconnecting.
#[derive(Clone)]
pub(crate) struct JoinedChannel {
    pub(crate) config: ChannelConfig,
    /// Ref of the last `phx_join`; its reply confirms the join.
    pub(crate) join_ref: String,
    pub(crate) presence_payload: Option<serde_json::Value>,
}

pub(crate) type ChannelTable = Arc<RwLock<HashMap<String, JoinedChannel>>>;

type Shared<S> = Arc<Mutex<S>>;

/// Serialize and write one frame. Returns `false` once the socket is gone.
async fn send_frame<S>(
    writer: &Shared<S>,
    topic: &str,
    event: &str,
    payload: serde_json::Value,
    msg_ref: String,
) -> bool
where
    S: Sink<WsMessage> + Unpin,
{
    let msg = PhoenixMessage {
        topic: format!("realtime:{topic}"),
        event: event.to_string(),
        payload,
        msg_ref: Some(msg_ref),
    };
    match serde_json::to_string(&msg) {
        Ok(json) => writer.lock().await.send(WsMessage::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, event, "Failed to encode Phoenix frame");
            true
        }
    }
}

fn presence_frame(payload: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "type": "presence",
        "event": "track",
        "payload": payload
    })
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

pub(crate) async fn connection_loop(
    config: RealtimeConfig,
    connected: Arc<RwLock<bool>>,
    event_tx: mpsc::Sender<RealtimeEvent>,
    command_rx: mpsc::Receiver<RealtimeCommand>,
) {
    let command_rx = Arc::new(Mutex::new(command_rx));
    let channels: ChannelTable = Arc::new(RwLock::new(HashMap::new()));
    let mut reconnect_delay = config.reconnect_delay_secs;

    loop {
        let url = config.ws_url();
        info!(url = %url.split('?').next().unwrap_or(""), "Connecting to realtime endpoint");

        match tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(&url)).await {
            Ok(Ok((ws_stream, _))) => {
                reconnect_delay = config.reconnect_delay_secs;
                *connected.write().await = true;
                let _ = event_tx.send(RealtimeEvent::Connected).await;

                let (ws_write, mut ws_read) = ws_stream.split();
                let ws_write = Arc::new(Mutex::new(ws_write));

                restore_channels(&ws_write, &channels, config.access_token.as_deref()).await;

                let heartbeat_handle = tokio::spawn(heartbeat_task(
                    Arc::clone(&ws_write),
                    config.heartbeat_interval_secs,
                ));
                let cmd_handle = tokio::spawn(command_forwarder(
                    Arc::clone(&command_rx),
                    Arc::clone(&ws_write),
                    Arc::clone(&channels),
                    event_tx.clone(),
                    config.access_token.clone(),
                ));

                while let Some(msg_result) = ws_read.next().await {
                    match msg_result {
                        Ok(WsMessage::Text(text)) => {
                            match serde_json::from_str::<PhoenixMessage>(&text) {
                                Ok(phoenix_msg) => {
                                    handle_phoenix_message(&phoenix_msg, &channels, &event_tx)
                                        .await
                                }
                                Err(_) => debug!(text = %text, "Unrecognized realtime frame"),
                            }
                        }
                        Ok(WsMessage::Close(_)) => {
                            info!("Realtime endpoint closed the connection");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                        _ => {}
                    }
                }

                heartbeat_handle.abort();
                let finished = cmd_handle.is_finished();
                cmd_handle.abort();
                *connected.write().await = false;
                let _ = event_tx.send(RealtimeEvent::Disconnected).await;

                // The forwarder only exits on its own after a Disconnect command.
                if finished {
                    info!("Realtime client disconnected");
                    return;
                }
            }
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to realtime endpoint");
                let _ = event_tx
                    .send(RealtimeEvent::Error(format!("Connection failed: {e}")))
                    .await;
            }
            Err(_elapsed) => {
                error!("WebSocket connection timed out after 15s");
                let _ = event_tx
                    .send(RealtimeEvent::Error(
                        "Connection timed out after 15s".to_string(),
                    ))
                    .await;
            }
        }

        if event_tx.is_closed() {
            debug!("Event receiver dropped, stopping realtime loop");
            return;
        }

        info!(delay = reconnect_delay, "Reconnecting in {} seconds", reconnect_delay);
        tokio::time::sleep(Duration::from_secs(reconnect_delay)).await;
        reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay_secs);
    }
}

/// Rejoin every known channel and re-track its presence.
async fn restore_channels<S>(
    writer: &Shared<S>,
    channels: &ChannelTable,
    access_token: Option<&str>,
) where
    S: Sink<WsMessage> + Unpin,
{
    let mut table = channels.write().await;
    for (topic, channel) in table.iter_mut() {
        channel.join_ref = next_ref();
        let payload = channel.config.to_join_payload(access_token);
        if !send_frame(writer, topic, "phx_join", payload, channel.join_ref.clone()).await {
            return;
        }
        if let Some(presence) = channel.presence_payload.clone() {
            debug!(topic = %topic, "Re-tracking presence after reconnect");
            send_frame(writer, topic, "presence", presence_frame(presence), next_ref()).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

async fn heartbeat_task<S>(ws_write: Shared<S>, interval_secs: u64)
where
    S: Sink<WsMessage> + Unpin,
{
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        let msg = PhoenixMessage {
            topic: "phoenix".to_string(),
            event: "heartbeat".to_string(),
            payload: serde_json::json!({}),
            msg_ref: Some(next_ref()),
        };
        if let Ok(json) = serde_json::to_string(&msg) {
            let mut writer = ws_write.lock().await;
            if writer.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Command Forwarder
// ---------------------------------------------------------------------------

async fn command_forwarder<S>(
    cmd_rx: Arc<Mutex<mpsc::Receiver<RealtimeCommand>>>,
    writer: Shared<S>,
    channels: ChannelTable,
    event_tx: mpsc::Sender<RealtimeEvent>,
    access_token: Option<String>,
) where
    S: Sink<WsMessage> + Unpin,
{
    let mut rx = cmd_rx.lock().await;
    while let Some(cmd) = rx.recv().await {
        match cmd {
            RealtimeCommand::JoinChannel { topic, config } => {
                let join_ref = next_ref();
                let payload = config.to_join_payload(access_token.as_deref());
                channels.write().await.insert(
                    topic.clone(),
                    JoinedChannel {
                        config,
                        join_ref: join_ref.clone(),
                        presence_payload: None,
                    },
                );
                send_frame(&writer, &topic, "phx_join", payload, join_ref).await;
            }
            RealtimeCommand::LeaveChannel { topic } => {
                channels.write().await.remove(&topic);
                send_frame(&writer, &topic, "phx_leave", serde_json::json!({}), next_ref()).await;
            }
            RealtimeCommand::Broadcast {
                topic,
                event,
                payload,
            } => {
                let frame = serde_json::json!({
                    "type": "broadcast",
                    "event": event,
                    "payload": payload
                });
                send_frame(&writer, &topic, "broadcast", frame, next_ref()).await;
            }
            RealtimeCommand::PresenceTrack { topic, payload } => {
                if let Some(ch) = channels.write().await.get_mut(&topic) {
                    ch.presence_payload = Some(payload.clone());
                }
                send_frame(&writer, &topic, "presence", presence_frame(payload), next_ref()).await;
            }
            RealtimeCommand::Disconnect => {
                let topics: Vec<String> = channels.write().await.drain().map(|(t, _)| t).collect();
                for topic in topics {
                    send_frame(&writer, &topic, "phx_leave", serde_json::json!({}), next_ref()).await;
                }
                let _ = writer.lock().await.send(WsMessage::Close(None)).await;
                let _ = event_tx.send(RealtimeEvent::Disconnected).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::sink::drain;

    #[test]
    fn refs_are_unique_and_increasing() {
        let a: u64 = next_ref().parse().unwrap();
        let b: u64 = next_ref().parse().unwrap();
        assert!(b > a);
    }

    #[test]
    fn presence_frame_wraps_track_event() {
        let frame = presence_frame(serde_json::json!({"peerId": "p1"}));
        assert_eq!(frame["type"], "presence");
        assert_eq!(frame["event"], "track");
        assert_eq!(frame["payload"]["peerId"], "p1");
    }

    #[tokio::test]
    async fn restore_assigns_fresh_join_refs() {
        let writer = Arc::new(Mutex::new(drain::<WsMessage>()));
        let channels: ChannelTable = Arc::new(RwLock::new(HashMap::new()));
        channels.write().await.insert(
            "room:r1".into(),
            JoinedChannel {
                config: ChannelConfig {
                    broadcast: super::super::types::BroadcastConfig {
                        self_send: false,
                        ack: false,
                    },
                    presence: super::super::types::PresenceKeyConfig { key: "p1".into() },
                },
                join_ref: "0".into(),
                presence_payload: Some(serde_json::json!({"peerId": "p1"})),
            },
        );

        restore_channels(&writer, &channels, Some("jwt")).await;

        let table = channels.read().await;
        let channel = &table["room:r1"];
        assert_ne!(channel.join_ref, "0");
        assert!(channel.presence_payload.is_some());
    }
}
