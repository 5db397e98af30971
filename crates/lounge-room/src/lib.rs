//! Presence and signaling coordinator for live audio rooms.
//!
//! A session creates a room through the backend, joins it through a
//! [`RoomTransport`], and keeps the local view in sync:
//!
//! - [`PeerRegistry`]: who is in the room and what they published
//! - [`LocalParticipantController`]: hand raise, media toggles, reactions
//! - [`MessageRelay`]: typed data messages between peers
//! - [`GridPresentation`]: cards, reaction overlays, speaking indicators
//! - [`HostControls`]: host-only moderation
//! - [`RoomSessionController`]: the lifecycle tying it all together

pub mod backend;
pub mod error;
pub mod grid;
pub mod identity;
pub mod local;
pub mod moderation;
pub mod protocol;
#[cfg(feature = "realtime")]
pub mod realtime;
pub mod registry;
pub mod relay;
pub mod session;
pub mod tags;
pub mod transport;

pub use backend::{
    token_provider, HttpRoomBackend, RoomBackend, StaticTokenProvider, TokenProvider,
    TokenRequest,
};
pub use error::{ProtocolError, Result, RoomError};
pub use grid::{
    Affordances, CardView, GridPresentation, GridView, LevelMeter, MeteredLevels, RandomLevels,
};
pub use identity::Identity;
pub use local::LocalParticipantController;
pub use moderation::HostControls;
pub use protocol::{
    DataEnvelope, InboundMessage, ParticipantMetadata, PresenceMeta, Role, RoomDescriptor,
    RoomMessage, Targets,
};
pub use registry::{MediaState, Participant, PeerDisplay, PeerRegistry};
pub use relay::{MessageRelay, Subscription};
pub use session::{RetryPolicy, RoomSessionController, SessionEvent, SessionState};
pub use tags::generate_tags;
pub use transport::{
    JoinRequest, MemoryHub, MemoryTransport, RoleManager, RoomTransport, TransportEvent,
};
#[cfg(feature = "realtime")]
pub use transport::RealtimeRoomTransport;
