//! Host-only room controls.
//!
//! Every action checks the caller's current role before touching the
//! transport, whatever the grid happens to show.

use std::sync::Arc;

use tracing::info;

use crate::error::{Result, RoomError};
use crate::local::LocalParticipantController;
use crate::protocol::{Role, RoomMessage, Targets};
use crate::relay::MessageRelay;
use crate::transport::{RoleManager, RoomTransport};

pub struct HostControls {
    local: Arc<LocalParticipantController>,
    transport: Arc<dyn RoomTransport>,
    roles: Arc<dyn RoleManager>,
    relay: MessageRelay,
}

impl HostControls {
    pub fn new(
        local: Arc<LocalParticipantController>,
        transport: Arc<dyn RoomTransport>,
        roles: Arc<dyn RoleManager>,
        relay: MessageRelay,
    ) -> Self {
        Self {
            local,
            transport,
            roles,
            relay,
        }
    }

    async fn require_host(&self, action: &'static str) -> Result<()> {
        if self.local.role().await.is_host() {
            Ok(())
        } else {
            Err(RoomError::Unauthorized { action })
        }
    }

    /// Promote a listener to speaker.
    pub async fn approve_speaker(&self, peer_id: &str) -> Result<()> {
        self.require_host("approve_speaker").await?;
        self.roles.set_role(peer_id, Role::Speaker).await?;
        info!(peer_id = %peer_id, "Speaker approved");
        Ok(())
    }

    pub async fn remove_participant(&self, peer_id: &str) -> Result<()> {
        self.require_host("remove_participant").await?;
        self.transport.remove_peer(peer_id).await?;
        info!(peer_id = %peer_id, "Participant removed");
        Ok(())
    }

    pub async fn mute_everyone(&self) -> Result<()> {
        self.require_host("mute_everyone").await?;
        self.transport.mute_everyone().await
    }

    /// Private note to one participant.
    pub async fn whisper(&self, peer_id: &str, text: &str) -> Result<()> {
        self.require_host("whisper").await?;
        self.relay
            .send(
                &Targets::peer(peer_id),
                &RoomMessage::Whisper {
                    text: text.to_string(),
                },
            )
            .await
    }
}
