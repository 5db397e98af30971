//! The conferencing capability the room coordinator runs on.
//!
//! The transport owns membership, media, and delivery. This layer only
//! consumes its pushed [`TransportEvent`]s and calls the narrow
//! [`RoomTransport`] surface.

pub mod memory;
#[cfg(feature = "realtime")]
pub mod realtime;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::protocol::{DataEnvelope, ParticipantMetadata, Role, Targets};

pub use memory::{MemoryHub, MemoryTransport};
#[cfg(feature = "realtime")]
pub use realtime::RealtimeRoomTransport;

/// Everything needed to join a room.
#[derive(Clone)]
pub struct JoinRequest {
    pub room_id: String,
    pub token: String,
    pub role: Role,
    pub metadata: ParticipantMetadata,
}

impl std::fmt::Debug for JoinRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinRequest")
            .field("room_id", &self.room_id)
            .field("token", &"[REDACTED]")
            .field("role", &self.role)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Events pushed by the transport after a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    PeerJoined {
        peer_id: String,
        role: Role,
        metadata: Option<ParticipantMetadata>,
    },
    PeerLeft {
        peer_id: String,
    },
    MetadataChanged {
        peer_id: String,
        metadata: ParticipantMetadata,
    },
    RoleChanged {
        peer_id: String,
        role: Role,
    },
    /// A peer's video stream became available or went away.
    VideoStream {
        peer_id: String,
        available: bool,
    },
    /// Data message addressed to the local peer.
    Data(DataEnvelope),
    /// The host asked everyone to mute.
    MuteRequested {
        by: String,
    },
    /// The host removed the local peer from the room.
    Removed {
        by: String,
    },
    Disconnected,
    Error(String),
}

#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// Join a room. Resolves once membership is confirmed and returns the
    /// stream of room events; the stream ends when the room is left.
    async fn join_room(&self, request: JoinRequest) -> Result<mpsc::Receiver<TransportEvent>>;

    async fn leave_room(&self);

    /// Replace the local participant's metadata and replicate it.
    async fn update_metadata(&self, metadata: &ParticipantMetadata) -> Result<()>;

    /// Fire-and-forget data message. No acknowledgement.
    async fn send_data(&self, to: &Targets, label: &str, payload: &str) -> Result<()>;

    async fn mute_everyone(&self) -> Result<()>;

    async fn remove_peer(&self, peer_id: &str) -> Result<()>;

    fn local_peer_id(&self) -> String;
}

/// Role changes are delegated to whoever manages room authorization.
#[async_trait]
pub trait RoleManager: Send + Sync {
    async fn set_role(&self, peer_id: &str, role: Role) -> Result<()>;
}
