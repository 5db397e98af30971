//! [`RoomTransport`] over Phoenix channels.
//!
//! Each room is the channel `room:<id>`. Membership comes from presence
//! (keyed by peer id, meta is a [`PresenceMeta`]) and every other signal is
//! a broadcast event on the same channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lounge_config::RealtimeSettings;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{JoinRequest, RoleManager, RoomTransport, TransportEvent};
use crate::error::{Result, RoomError};
use crate::protocol::{DataEnvelope, ParticipantMetadata, PresenceMeta, Role, Targets};
use crate::realtime::{
    BroadcastConfig, ChannelConfig, PresenceKeyConfig, RealtimeClient, RealtimeConfig,
    RealtimeEvent,
};

/// Broadcast event names used on a room channel.
pub mod events {
    pub const DATA: &str = "data";
    pub const MUTE_ALL: &str = "mute_all";
    pub const REMOVE: &str = "remove";
    pub const ROLE_CHANGE: &str = "role_change";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MuteAllPayload {
    by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemovePayload {
    by: String,
    peer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleChangePayload {
    by: String,
    peer_id: String,
    role: Role,
}

pub fn room_topic(room_id: &str) -> String {
    format!("room:{room_id}")
}

struct ActiveRoom {
    client: Arc<RealtimeClient>,
    topic: String,
    presence: Arc<Mutex<PresenceMeta>>,
    events_tx: mpsc::Sender<TransportEvent>,
    translator: JoinHandle<()>,
}

pub struct RealtimeRoomTransport {
    settings: RealtimeSettings,
    peer_id: String,
    join_timeout: Duration,
    active: Mutex<Option<ActiveRoom>>,
}

impl RealtimeRoomTransport {
    pub fn new(
        settings: RealtimeSettings,
        peer_id: impl Into<String>,
        join_timeout: Duration,
    ) -> Self {
        Self {
            settings,
            peer_id: peer_id.into(),
            join_timeout,
            active: Mutex::new(None),
        }
    }

    async fn broadcast<T: Serialize>(&self, event: &str, payload: &T) -> Result<()> {
        let active = self.active.lock().await;
        let room = active.as_ref().ok_or(RoomError::NotJoined)?;
        let payload =
            serde_json::to_value(payload).map_err(|e| RoomError::Parse(e.to_string()))?;
        room.client.broadcast(&room.topic, event, payload).await
    }

    /// Refuse host actions unless the tracked presence says host.
    async fn require_host(&self, action: &'static str) -> Result<()> {
        let active = self.active.lock().await;
        let room = active.as_ref().ok_or(RoomError::NotJoined)?;
        if room.presence.lock().await.role.is_host() {
            Ok(())
        } else {
            Err(RoomError::Unauthorized { action })
        }
    }

    async fn teardown(room: ActiveRoom) {
        room.translator.abort();
        let _ = room.client.leave_channel(&room.topic).await;
        room.client.disconnect().await;
    }
}

impl Drop for RealtimeRoomTransport {
    fn drop(&mut self) {
        if let Some(room) = self.active.get_mut().take() {
            room.translator.abort();
        }
    }
}

/// Wait for the join reply on `topic`, consuming events that precede it.
async fn await_join(
    rt_rx: &mut mpsc::Receiver<RealtimeEvent>,
    topic: &str,
    timeout: Duration,
) -> Result<()> {
    let wait = async {
        while let Some(event) = rt_rx.recv().await {
            match event {
                RealtimeEvent::ChannelJoined { topic: t } if t == topic => return Ok(()),
                RealtimeEvent::ChannelError { topic: t, message } if t == topic => {
                    return Err(RoomError::Transport(message))
                }
                other => debug!(event = ?other, "Event before join confirmation"),
            }
        }
        Err(RoomError::Transport("realtime connection closed".into()))
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| RoomError::JoinTimeout(timeout.as_secs()))?
}

#[async_trait]
impl RoomTransport for RealtimeRoomTransport {
    async fn join_room(&self, request: JoinRequest) -> Result<mpsc::Receiver<TransportEvent>> {
        if let Some(previous) = self.active.lock().await.take() {
            Self::teardown(previous).await;
        }

        let mut config = RealtimeConfig::from(&self.settings);
        config.access_token = Some(request.token.clone());
        let (client, mut rt_rx) = RealtimeClient::connect(config);
        let client = Arc::new(client);

        let topic = room_topic(&request.room_id);
        let channel = ChannelConfig {
            broadcast: BroadcastConfig {
                self_send: false,
                ack: false,
            },
            presence: PresenceKeyConfig {
                key: self.peer_id.clone(),
            },
        };
        client.join_channel(&topic, channel).await?;

        if let Err(e) = await_join(&mut rt_rx, &topic, self.join_timeout).await {
            warn!(room_id = %request.room_id, error = %e, "Room join failed");
            client.disconnect().await;
            return Err(e);
        }

        let presence = PresenceMeta {
            peer_id: self.peer_id.clone(),
            role: request.role,
            metadata: request.metadata.clone(),
        };
        track(&client, &topic, &presence).await?;

        let (events_tx, events_rx) = mpsc::channel(256);
        let presence = Arc::new(Mutex::new(presence));
        let translator = tokio::spawn(translate_events(
            rt_rx,
            events_tx.clone(),
            self.peer_id.clone(),
            Arc::clone(&client),
            topic.clone(),
            Arc::clone(&presence),
        ));

        info!(room_id = %request.room_id, role = %request.role, "Joined room channel");
        *self.active.lock().await = Some(ActiveRoom {
            client,
            topic,
            presence,
            events_tx,
            translator,
        });
        Ok(events_rx)
    }

    async fn leave_room(&self) {
        if let Some(room) = self.active.lock().await.take() {
            info!(topic = %room.topic, "Leaving room channel");
            Self::teardown(room).await;
        }
    }

    async fn update_metadata(&self, metadata: &ParticipantMetadata) -> Result<()> {
        let active = self.active.lock().await;
        let room = active.as_ref().ok_or(RoomError::NotJoined)?;
        let mut presence = room.presence.lock().await;
        presence.metadata = metadata.clone();
        track(&room.client, &room.topic, &presence).await
    }

    async fn send_data(&self, to: &Targets, label: &str, payload: &str) -> Result<()> {
        let envelope = DataEnvelope {
            from: self.peer_id.clone(),
            to: to.clone(),
            label: label.to_string(),
            payload: payload.to_string(),
        };
        self.broadcast(events::DATA, &envelope).await
    }

    async fn mute_everyone(&self) -> Result<()> {
        self.require_host("mute_everyone").await?;
        self.broadcast(
            events::MUTE_ALL,
            &MuteAllPayload {
                by: self.peer_id.clone(),
            },
        )
        .await
    }

    async fn remove_peer(&self, peer_id: &str) -> Result<()> {
        self.require_host("remove_participant").await?;
        self.broadcast(
            events::REMOVE,
            &RemovePayload {
                by: self.peer_id.clone(),
                peer_id: peer_id.to_string(),
            },
        )
        .await
    }

    fn local_peer_id(&self) -> String {
        self.peer_id.clone()
    }
}

#[async_trait]
impl RoleManager for RealtimeRoomTransport {
    async fn set_role(&self, peer_id: &str, role: Role) -> Result<()> {
        self.require_host("set_role").await?;
        self.broadcast(
            events::ROLE_CHANGE,
            &RoleChangePayload {
                by: self.peer_id.clone(),
                peer_id: peer_id.to_string(),
                role,
            },
        )
        .await?;

        // Broadcasts are not echoed back, so apply the change locally too.
        let events_tx = self
            .active
            .lock()
            .await
            .as_ref()
            .map(|room| room.events_tx.clone());
        if let Some(events_tx) = events_tx {
            let _ = events_tx
                .send(TransportEvent::RoleChanged {
                    peer_id: peer_id.to_string(),
                    role,
                })
                .await;
        }
        Ok(())
    }
}

async fn track(client: &RealtimeClient, topic: &str, presence: &PresenceMeta) -> Result<()> {
    let payload = serde_json::to_value(presence).map_err(|e| RoomError::Parse(e.to_string()))?;
    client.presence_track(topic, payload).await
}

// ---------------------------------------------------------------------------
// Event translation
// ---------------------------------------------------------------------------

async fn translate_events(
    mut rt_rx: mpsc::Receiver<RealtimeEvent>,
    events_tx: mpsc::Sender<TransportEvent>,
    local_peer: String,
    client: Arc<RealtimeClient>,
    topic: String,
    presence: Arc<Mutex<PresenceMeta>>,
) {
    let mut translator = PresenceTranslator::new(local_peer.clone());

    while let Some(rt_event) = rt_rx.recv().await {
        for event in translator.translate(rt_event) {
            if let TransportEvent::RoleChanged { peer_id, role } = &event {
                if *peer_id == local_peer {
                    let mut meta = presence.lock().await;
                    meta.role = *role;
                    if let Err(e) = track(&client, &topic, &meta).await {
                        warn!(error = %e, "Failed to re-track presence after role change");
                    }
                }
            }
            if events_tx.send(event).await.is_err() {
                return;
            }
        }
    }
}

/// Turns presence snapshots, presence diffs, and broadcasts into
/// [`TransportEvent`]s for the local peer.
pub(crate) struct PresenceTranslator {
    local_peer: String,
    known: HashMap<String, PresenceMeta>,
}

impl PresenceTranslator {
    pub(crate) fn new(local_peer: String) -> Self {
        Self {
            local_peer,
            known: HashMap::new(),
        }
    }

    pub(crate) fn translate(&mut self, event: RealtimeEvent) -> Vec<TransportEvent> {
        match event {
            RealtimeEvent::PresenceState { state, .. } => self.apply_snapshot(state),
            RealtimeEvent::PresenceDiff { joins, leaves, .. } => self.apply_diff(joins, leaves),
            RealtimeEvent::Broadcast { event, payload, .. } => {
                self.translate_broadcast(&event, payload).into_iter().collect()
            }
            RealtimeEvent::Disconnected => {
                self.known.clear();
                vec![TransportEvent::Disconnected]
            }
            RealtimeEvent::Error(message) | RealtimeEvent::ChannelError { message, .. } => {
                vec![TransportEvent::Error(message)]
            }
            RealtimeEvent::Connected | RealtimeEvent::ChannelJoined { .. } => Vec::new(),
        }
    }

    fn apply_snapshot(
        &mut self,
        state: HashMap<String, Vec<serde_json::Value>>,
    ) -> Vec<TransportEvent> {
        let mut out = Vec::new();
        let mut incoming: HashMap<String, PresenceMeta> = HashMap::new();
        for (key, metas) in state {
            if let Some(meta) = parse_meta(&key, &metas) {
                incoming.insert(key, meta);
            }
        }

        let gone: Vec<String> = self
            .known
            .keys()
            .filter(|k| !incoming.contains_key(*k))
            .cloned()
            .collect();
        for peer_id in gone {
            self.known.remove(&peer_id);
            out.push(TransportEvent::PeerLeft { peer_id });
        }

        let mut keys: Vec<String> = incoming.keys().cloned().collect();
        keys.sort();
        for key in keys {
            if let Some(meta) = incoming.remove(&key) {
                out.extend(self.upsert(meta));
            }
        }
        out
    }

    fn apply_diff(
        &mut self,
        joins: HashMap<String, Vec<serde_json::Value>>,
        leaves: HashMap<String, Vec<serde_json::Value>>,
    ) -> Vec<TransportEvent> {
        let mut out = Vec::new();

        // A key that leaves and joins in one diff re-tracked its presence.
        for key in leaves.keys() {
            if key == &self.local_peer || joins.contains_key(key) {
                continue;
            }
            if self.known.remove(key).is_some() {
                out.push(TransportEvent::PeerLeft {
                    peer_id: key.clone(),
                });
            }
        }

        let mut keys: Vec<&String> = joins.keys().collect();
        keys.sort();
        for key in keys {
            if let Some(meta) = parse_meta(key, &joins[key]) {
                out.extend(self.upsert(meta));
            }
        }
        out
    }

    fn upsert(&mut self, meta: PresenceMeta) -> Vec<TransportEvent> {
        if meta.peer_id == self.local_peer {
            return Vec::new();
        }
        let peer_id = meta.peer_id.clone();
        match self.known.insert(peer_id.clone(), meta.clone()) {
            None => vec![TransportEvent::PeerJoined {
                peer_id,
                role: meta.role,
                metadata: Some(meta.metadata),
            }],
            Some(previous) => {
                let mut out = Vec::new();
                if previous.role != meta.role {
                    out.push(TransportEvent::RoleChanged {
                        peer_id: peer_id.clone(),
                        role: meta.role,
                    });
                }
                if previous.metadata != meta.metadata {
                    out.push(TransportEvent::MetadataChanged {
                        peer_id,
                        metadata: meta.metadata,
                    });
                }
                out
            }
        }
    }

    /// Control broadcasts only count when sent by a peer present as host.
    fn sent_by_host(&self, event: &str, by: &str) -> bool {
        let is_host = self.known.get(by).is_some_and(|meta| meta.role.is_host());
        if !is_host {
            warn!(event = %event, by = %by, "Dropping host action from a non-host");
        }
        is_host
    }

    fn translate_broadcast(
        &mut self,
        event: &str,
        payload: serde_json::Value,
    ) -> Option<TransportEvent> {
        let decoded = match event {
            events::DATA => serde_json::from_value::<DataEnvelope>(payload)
                .map(|env| {
                    (env.from != self.local_peer && env.to.includes(&self.local_peer))
                        .then_some(TransportEvent::Data(env))
                }),
            events::MUTE_ALL => serde_json::from_value::<MuteAllPayload>(payload).map(|p| {
                self.sent_by_host(event, &p.by)
                    .then_some(TransportEvent::MuteRequested { by: p.by })
            }),
            events::REMOVE => serde_json::from_value::<RemovePayload>(payload).map(|p| {
                (p.peer_id == self.local_peer && self.sent_by_host(event, &p.by))
                    .then_some(TransportEvent::Removed { by: p.by })
            }),
            events::ROLE_CHANGE => {
                serde_json::from_value::<RoleChangePayload>(payload).map(|p| {
                    if !self.sent_by_host(event, &p.by) {
                        return None;
                    }
                    if let Some(known) = self.known.get_mut(&p.peer_id) {
                        known.role = p.role;
                    }
                    Some(TransportEvent::RoleChanged {
                        peer_id: p.peer_id,
                        role: p.role,
                    })
                })
            }
            other => {
                debug!(event = %other, "Unhandled room broadcast");
                return None;
            }
        };

        decoded.unwrap_or_else(|e| {
            warn!(event = %event, error = %e, "Dropping malformed room broadcast");
            None
        })
    }
}

fn parse_meta(key: &str, metas: &[serde_json::Value]) -> Option<PresenceMeta> {
    let raw = metas.first()?;
    match serde_json::from_value::<PresenceMeta>(raw.clone()) {
        Ok(meta) if meta.peer_id == key => Some(meta),
        Ok(meta) => {
            warn!(key = %key, peer_id = %meta.peer_id, "Presence key does not match peer id");
            None
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Unparseable presence meta");
            None
        }
    }
}
