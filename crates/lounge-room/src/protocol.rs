//! Protocol types for the live room.
//!
//! Participant metadata and the data messages relayed between peers. The
//! transport only moves `{label, payload}` string pairs; this module turns
//! them into the closed [`RoomMessage`] union and back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

// ---------------------------------------------------------------------------
// Message labels
// ---------------------------------------------------------------------------

/// Labels carried next to each data message payload.
pub mod labels {
    pub const EMOJI: &str = "emoji";
    pub const SPEAKER_REQUEST: &str = "speakerRequest";
    pub const WHISPER: &str = "whisper";
}

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// Authorization tier assigned at join time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Speaker,
    #[default]
    #[serde(alias = "guest")]
    Listener,
}

impl Role {
    pub fn is_host(&self) -> bool {
        matches!(self, Role::Host)
    }

    /// Hosts and speakers hold the floor and get a speaking indicator.
    pub fn is_speaker(&self) -> bool {
        matches!(self, Role::Host | Role::Speaker)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Speaker => "speaker",
            Role::Listener => "listener",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata a participant publishes about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParticipantMetadata {
    pub display_name: String,
    pub avatar_url: String,
    pub is_hand_raised: bool,
    pub is_sharing: bool,
}

/// Presence entry tracked by the realtime transport for each peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMeta {
    pub peer_id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub metadata: ParticipantMetadata,
}

// ---------------------------------------------------------------------------
// Data messages
// ---------------------------------------------------------------------------

/// Ephemeral signals relayed between participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomMessage {
    /// Reaction shown as an overlay on the sender's card.
    Emoji(String),
    /// "Ask to speak": the sender wants the floor.
    SpeakerRequest { peer_id: String },
    /// Private note from the host to one participant.
    Whisper { text: String },
}

impl RoomMessage {
    pub fn label(&self) -> &'static str {
        match self {
            RoomMessage::Emoji(_) => labels::EMOJI,
            RoomMessage::SpeakerRequest { .. } => labels::SPEAKER_REQUEST,
            RoomMessage::Whisper { .. } => labels::WHISPER,
        }
    }

    pub fn payload(&self) -> String {
        match self {
            RoomMessage::Emoji(emoji) => emoji.clone(),
            RoomMessage::SpeakerRequest { peer_id } => peer_id.clone(),
            RoomMessage::Whisper { text } => text.clone(),
        }
    }

    /// Rebuild a message from its wire label and payload.
    pub fn decode(label: &str, payload: &str) -> Result<Self, ProtocolError> {
        let require_non_empty = |what: &str| {
            if payload.trim().is_empty() {
                Err(ProtocolError::InvalidPayload {
                    label: label.to_string(),
                    reason: format!("{what} must not be empty"),
                })
            } else {
                Ok(())
            }
        };

        match label {
            labels::EMOJI => {
                require_non_empty("emoji")?;
                Ok(RoomMessage::Emoji(payload.to_string()))
            }
            labels::SPEAKER_REQUEST => {
                require_non_empty("peer id")?;
                Ok(RoomMessage::SpeakerRequest {
                    peer_id: payload.to_string(),
                })
            }
            labels::WHISPER => Ok(RoomMessage::Whisper {
                text: payload.to_string(),
            }),
            other => Err(ProtocolError::UnknownLabel(other.to_string())),
        }
    }

    pub fn as_emoji(&self) -> Option<&str> {
        match self {
            RoomMessage::Emoji(emoji) => Some(emoji),
            _ => None,
        }
    }
}

/// Recipients of a data message: everybody (`"*"` on the wire) or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TargetsRepr", into = "TargetsRepr")]
pub enum Targets {
    All,
    Peers(Vec<String>),
}

impl Targets {
    pub fn peer(peer_id: impl Into<String>) -> Self {
        Targets::Peers(vec![peer_id.into()])
    }

    pub fn includes(&self, peer_id: &str) -> bool {
        match self {
            Targets::All => true,
            Targets::Peers(ids) => ids.iter().any(|id| id == peer_id),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TargetsRepr {
    Wildcard(String),
    Peers(Vec<String>),
}

impl TryFrom<TargetsRepr> for Targets {
    type Error = ProtocolError;

    fn try_from(repr: TargetsRepr) -> Result<Self, Self::Error> {
        match repr {
            TargetsRepr::Wildcard(s) if s == "*" => Ok(Targets::All),
            TargetsRepr::Wildcard(s) => Err(ProtocolError::InvalidTargets(s)),
            TargetsRepr::Peers(ids) => Ok(Targets::Peers(ids)),
        }
    }
}

impl From<Targets> for TargetsRepr {
    fn from(targets: Targets) -> Self {
        match targets {
            Targets::All => TargetsRepr::Wildcard("*".into()),
            Targets::Peers(ids) => TargetsRepr::Peers(ids),
        }
    }
}

/// Wire envelope for a data message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEnvelope {
    pub from: String,
    pub to: Targets,
    pub label: String,
    pub payload: String,
}

impl DataEnvelope {
    pub fn new(from: impl Into<String>, to: Targets, message: &RoomMessage) -> Self {
        Self {
            from: from.into(),
            to,
            label: message.label().to_string(),
            payload: message.payload(),
        }
    }

    pub fn decode(&self) -> Result<RoomMessage, ProtocolError> {
        RoomMessage::decode(&self.label, &self.payload)
    }
}

/// A data message as seen by the receiving side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub from: String,
    pub message: RoomMessage,
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(from: impl Into<String>, message: RoomMessage) -> Self {
        Self {
            from: from.into(),
            message,
            received_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// A room as created through the backend. Not mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDescriptor {
    pub id: String,
    pub title: String,
    pub is_live: bool,
    pub host_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}
