//! Room session lifecycle: create the room, get a token, join, and pump
//! transport events into the registry and relay until the session ends.
//!
//! `Idle -> Creating -> Joining -> Joined -> Left | Error`

mod retry;


use std::sync::Arc;
use std::time::Duration;

use lounge_config::{RetryConfig, RoomConfig};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub use retry::RetryPolicy;

use crate::backend::{RoomBackend, TokenProvider, TokenRequest};
use crate::error::{Result, RoomError};
use crate::grid::{GridPresentation, LevelMeter};
use crate::identity::Identity;
use crate::local::LocalParticipantController;
use crate::moderation::HostControls;
use crate::protocol::{RoomDescriptor, Role};
use crate::registry::PeerRegistry;
use crate::relay::MessageRelay;
use crate::tags::generate_tags;
use crate::transport::{JoinRequest, RoleManager, RoomTransport, TransportEvent};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Creating,
    Joining,
    Joined { room_id: String },
    Left,
    Error { message: String },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Creating => "creating",
            SessionState::Joining => "joining",
            SessionState::Joined { .. } => "joined",
            SessionState::Left => "left",
            SessionState::Error { .. } => "error",
        }
    }

    fn can_start(&self) -> bool {
        matches!(
            self,
            SessionState::Idle | SessionState::Left | SessionState::Error { .. }
        )
    }
}

/// Notifications for whoever drives the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    RoomCreated(RoomDescriptor),
    RetryScheduled {
        step: &'static str,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    /// The local role changed (e.g. promoted to speaker).
    RoleChanged(Role),
    MuteRequested { by: String },
    Removed { by: String },
    TransportError(String),
}

/// Queue a session event. A full or closed queue drops it.
pub(crate) fn emit(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if let Err(e) = events.try_send(event) {
        debug!(error = %e, "Session event dropped");
    }
}

async fn transition(
    state: &RwLock<SessionState>,
    events: &mpsc::Sender<SessionEvent>,
    next: SessionState,
) {
    let mut current = state.write().await;
    info!(from = current.name(), to = next.name(), "Session state");
    *current = next.clone();
    drop(current);
    emit(events, SessionEvent::StateChanged(next));
}

pub struct RoomSessionController {
    identity: Identity,
    room_config: RoomConfig,
    retry: RetryPolicy,
    backend: Arc<dyn RoomBackend>,
    tokens: Arc<dyn TokenProvider>,
    transport: Arc<dyn RoomTransport>,
    registry: PeerRegistry,
    relay: MessageRelay,
    local: Arc<LocalParticipantController>,
    state: Arc<RwLock<SessionState>>,
    room: RwLock<Option<RoomDescriptor>>,
    events: mpsc::Sender<SessionEvent>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl RoomSessionController {
    pub fn new(
        identity: Identity,
        room_config: &RoomConfig,
        retry: &RetryConfig,
        backend: Arc<dyn RoomBackend>,
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn RoomTransport>,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let relay = MessageRelay::new(Arc::clone(&transport));
        let local = Arc::new(LocalParticipantController::new(
            &identity,
            Arc::clone(&transport),
            relay.clone(),
        ));
        let controller = Self {
            identity,
            room_config: room_config.clone(),
            retry: RetryPolicy::from(retry),
            backend,
            tokens,
            transport,
            registry: PeerRegistry::new(),
            relay,
            local,
            state: Arc::new(RwLock::new(SessionState::Idle)),
            room: RwLock::new(None),
            events,
            pump: Mutex::new(None),
        };
        (controller, events_rx)
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn room(&self) -> Option<RoomDescriptor> {
        self.room.read().await.clone()
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn relay(&self) -> &MessageRelay {
        &self.relay
    }

    pub fn local(&self) -> &Arc<LocalParticipantController> {
        &self.local
    }

    /// Host controls acting through this session's transport.
    pub fn host_controls(&self, roles: Arc<dyn RoleManager>) -> HostControls {
        HostControls::new(
            Arc::clone(&self.local),
            Arc::clone(&self.transport),
            roles,
            self.relay.clone(),
        )
    }

    /// A grid over this session's registry and relay.
    pub fn grid(&self, meter: Arc<dyn LevelMeter>) -> GridPresentation {
        GridPresentation::new(
            self.registry.clone(),
            self.relay.clone(),
            Arc::clone(&self.local),
            meter,
            &self.room_config,
        )
    }

    async fn fail(&self, error: RoomError) -> RoomError {
        transition(
            &self.state,
            &self.events,
            SessionState::Error {
                message: error.to_string(),
            },
        )
        .await;
        error
    }

    /// Create a room and join it. A blank title falls back to the
    /// configured default.
    pub async fn start(&self, title: Option<&str>) -> Result<RoomDescriptor> {
        // Check and claim under one guard.
        {
            let mut state = self.state.write().await;
            if !state.can_start() {
                return Err(RoomError::InvalidState(state.name().to_string()));
            }
            info!(from = state.name(), to = "creating", "Session state");
            *state = SessionState::Creating;
        }
        emit(&self.events, SessionEvent::StateChanged(SessionState::Creating));

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.room_config.default_title)
            .to_string();
        let role = self.identity.role;

        let room_id = match self
            .retry
            .run("create_room", &self.events, || self.backend.create_room(&title))
            .await
        {
            Ok(id) => id,
            Err(e) => return Err(self.fail(e).await),
        };
        let descriptor = RoomDescriptor {
            id: room_id.clone(),
            title: title.clone(),
            is_live: true,
            host_id: self.identity.peer_id.clone(),
            tags: generate_tags(&title, role),
        };
        info!(room_id = %room_id, title = %title, "Room created");
        emit(&self.events, SessionEvent::RoomCreated(descriptor.clone()));

        let token_request = TokenRequest {
            user_id: self.identity.peer_id.clone(),
            role,
            room_id: room_id.clone(),
        };
        let token = match self
            .retry
            .run("token", &self.events, || self.tokens.issue(&token_request))
            .await
        {
            Ok(token) => token,
            Err(e) => return Err(self.fail(e).await),
        };

        transition(&self.state, &self.events, SessionState::Joining).await;
        let join = JoinRequest {
            room_id: room_id.clone(),
            token,
            role,
            metadata: self.local.metadata().await,
        };
        let room_events = match self
            .retry
            .run("join", &self.events, || self.transport.join_room(join.clone()))
            .await
        {
            Ok(rx) => rx,
            Err(e) => return Err(self.fail(e).await),
        };

        *self.room.write().await = Some(descriptor.clone());
        transition(
            &self.state,
            &self.events,
            SessionState::Joined {
                room_id: room_id.clone(),
            },
        )
        .await;

        let pump = EventPump {
            local_peer: self.identity.peer_id.clone(),
            registry: self.registry.clone(),
            relay: self.relay.clone(),
            local: Arc::clone(&self.local),
            transport: Arc::clone(&self.transport),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        };
        let handle = tokio::spawn(pump.run(room_events));
        if let Some(previous) = self.pump.lock().await.replace(handle) {
            previous.abort();
        }

        Ok(descriptor)
    }

    /// Leave the room. Does nothing unless the session is joined.
    pub async fn leave(&self) {
        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
        if !matches!(*self.state.read().await, SessionState::Joined { .. }) {
            return;
        }
        self.transport.leave_room().await;
        self.registry.clear().await;
        transition(&self.state, &self.events, SessionState::Left).await;
    }
}

impl Drop for RoomSessionController {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.get_mut().take() {
            pump.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Event pump
// ---------------------------------------------------------------------------

struct EventPump {
    local_peer: String,
    registry: PeerRegistry,
    relay: MessageRelay,
    local: Arc<LocalParticipantController>,
    transport: Arc<dyn RoomTransport>,
    state: Arc<RwLock<SessionState>>,
    events: mpsc::Sender<SessionEvent>,
}

impl EventPump {
    async fn run(self, mut rx: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = rx.recv().await {
            self.registry.apply(&event).await;
            match event {
                TransportEvent::Data(envelope) => {
                    if envelope.from != self.local_peer && envelope.to.includes(&self.local_peer) {
                        self.relay.deliver_envelope(&envelope);
                    }
                }
                TransportEvent::RoleChanged { peer_id, role } if peer_id == self.local_peer => {
                    info!(role = %role, "Local role changed");
                    self.local.set_role(role).await;
                    emit(&self.events, SessionEvent::RoleChanged(role));
                }
                TransportEvent::MuteRequested { by } => {
                    self.local.mute().await;
                    emit(&self.events, SessionEvent::MuteRequested { by });
                }
                TransportEvent::Removed { by } => {
                    info!(by = %by, "Removed from the room");
                    self.transport.leave_room().await;
                    self.registry.clear().await;
                    transition(&self.state, &self.events, SessionState::Left).await;
                    emit(&self.events, SessionEvent::Removed { by });
                    return;
                }
                TransportEvent::Error(message) => {
                    warn!(error = %message, "Transport error");
                    emit(&self.events, SessionEvent::TransportError(message));
                }
                TransportEvent::Disconnected => {
                    warn!("Transport disconnected, waiting for it to recover");
                }
                _ => {}
            }
        }
        debug!("Room event stream ended");
    }
}
