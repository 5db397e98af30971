use lounge_common::new_id;
use serde::{Deserialize, Serialize};

use crate::protocol::{ParticipantMetadata, Role};

/// Who the local participant is, as known before joining a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub peer_id: String,
    pub display_name: String,
    pub avatar_url: String,
    pub role: Role,
}

impl Identity {
    pub fn new(peer_id: impl Into<String>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            peer_id: peer_id.into(),
            display_name: display_name.into(),
            avatar_url: String::new(),
            role,
        }
    }

    /// Fresh identity with a random peer id.
    pub fn generate(display_name: impl Into<String>, role: Role) -> Self {
        Self::new(new_id(), display_name, role)
    }

    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = avatar_url.into();
        self
    }

    /// Metadata published on join. Unnamed participants show as "Anonymous".
    pub fn initial_metadata(&self) -> ParticipantMetadata {
        let display_name = if self.display_name.trim().is_empty() {
            "Anonymous".to_string()
        } else {
            self.display_name.clone()
        };
        ParticipantMetadata {
            display_name,
            avatar_url: self.avatar_url.clone(),
            is_hand_raised: false,
            is_sharing: false,
        }
    }
}
