//! Peer registry: the local view of who is in the room.
//!
//! A read projection of transport events. Lookups never fail; missing data
//! comes back as `None` or as a display fallback.

use std::sync::Arc;

use lounge_common::short_label;
use tokio::sync::RwLock;
use tracing::debug;

use crate::protocol::{ParticipantMetadata, Role};
use crate::transport::TransportEvent;

const AVATAR_FALLBACK: &str = "https://api.dicebear.com/6.x/adventurer/svg?seed=";

/// Local, ephemeral media flags. Never replicated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaState {
    pub muted: bool,
    pub video_off: bool,
    /// Speaking level in `0..=3`.
    pub speaking_level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub role: Role,
    pub metadata: Option<ParticipantMetadata>,
    pub media: MediaState,
    pub has_video: bool,
}

impl Participant {
    fn new(id: String, role: Role, metadata: Option<ParticipantMetadata>) -> Self {
        Self {
            id,
            role,
            metadata,
            media: MediaState::default(),
            has_video: false,
        }
    }
}

/// What a card shows for a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerDisplay {
    pub label: String,
    pub avatar_url: String,
}

impl PeerDisplay {
    pub fn resolve(peer_id: &str, metadata: Option<&ParticipantMetadata>) -> Self {
        let label = metadata
            .map(|m| m.display_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| short_label(peer_id));
        let avatar_url = metadata
            .map(|m| m.avatar_url.trim())
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{AVATAR_FALLBACK}{peer_id}"));
        Self { label, avatar_url }
    }
}

/// Shared handle to the room's remote participants, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: Arc<RwLock<Vec<Participant>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(&self) -> Vec<String> {
        self.peers.read().await.iter().map(|p| p.id.clone()).collect()
    }

    pub async fn participant(&self, peer_id: &str) -> Option<Participant> {
        self.peers
            .read()
            .await
            .iter()
            .find(|p| p.id == peer_id)
            .cloned()
    }

    pub async fn metadata_of(&self, peer_id: &str) -> Option<ParticipantMetadata> {
        self.participant(peer_id).await.and_then(|p| p.metadata)
    }

    pub async fn role_of(&self, peer_id: &str) -> Option<Role> {
        self.participant(peer_id).await.map(|p| p.role)
    }

    /// Ids holding exactly `role`, in first-seen order.
    pub async fn list_by_role(&self, role: Role) -> Vec<String> {
        self.peers
            .read()
            .await
            .iter()
            .filter(|p| p.role == role)
            .map(|p| p.id.clone())
            .collect()
    }

    pub async fn display_of(&self, peer_id: &str) -> PeerDisplay {
        let metadata = self.metadata_of(peer_id).await;
        PeerDisplay::resolve(peer_id, metadata.as_ref())
    }

    pub async fn contains(&self, peer_id: &str) -> bool {
        self.peers.read().await.iter().any(|p| p.id == peer_id)
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.peers.write().await.clear();
    }

    /// Fold one transport event into the registry.
    pub async fn apply(&self, event: &TransportEvent) {
        let mut peers = self.peers.write().await;
        match event {
            TransportEvent::PeerJoined {
                peer_id,
                role,
                metadata,
            } => match peers.iter_mut().find(|p| &p.id == peer_id) {
                Some(existing) => {
                    existing.role = *role;
                    if metadata.is_some() {
                        existing.metadata = metadata.clone();
                    }
                }
                None => {
                    debug!(peer_id = %peer_id, role = %role, "Peer joined");
                    peers.push(Participant::new(peer_id.clone(), *role, metadata.clone()));
                }
            },
            TransportEvent::PeerLeft { peer_id } => {
                let before = peers.len();
                peers.retain(|p| &p.id != peer_id);
                if peers.len() != before {
                    debug!(peer_id = %peer_id, "Peer left");
                }
            }
            TransportEvent::MetadataChanged { peer_id, metadata } => {
                if let Some(p) = peers.iter_mut().find(|p| &p.id == peer_id) {
                    p.metadata = Some(metadata.clone());
                }
            }
            TransportEvent::RoleChanged { peer_id, role } => {
                if let Some(p) = peers.iter_mut().find(|p| &p.id == peer_id) {
                    p.role = *role;
                }
            }
            TransportEvent::VideoStream { peer_id, available } => {
                if let Some(p) = peers.iter_mut().find(|p| &p.id == peer_id) {
                    p.has_video = *available;
                }
            }
            TransportEvent::Disconnected => peers.clear(),
            TransportEvent::Data(_)
            | TransportEvent::MuteRequested { .. }
            | TransportEvent::Removed { .. }
            | TransportEvent::Error(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(id: &str, role: Role, name: Option<&str>) -> TransportEvent {
        TransportEvent::PeerJoined {
            peer_id: id.into(),
            role,
            metadata: name.map(|n| ParticipantMetadata {
                display_name: n.into(),
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn membership_follows_joins_and_leaves() {
        let registry = PeerRegistry::new();
        registry.apply(&joined("p1", Role::Host, Some("Esther"))).await;
        registry.apply(&joined("p2", Role::Listener, None)).await;
        registry.apply(&joined("p3", Role::Speaker, None)).await;
        registry
            .apply(&TransportEvent::PeerLeft {
                peer_id: "p2".into(),
            })
            .await;

        assert_eq!(registry.list().await, vec!["p1", "p3"]);
        assert!(!registry.contains("p2").await);
        assert_eq!(registry.metadata_of("p2").await, None);
    }

    #[tokio::test]
    async fn duplicate_join_refreshes_in_place() {
        let registry = PeerRegistry::new();
        registry.apply(&joined("p1", Role::Listener, Some("Ruth"))).await;
        registry.apply(&joined("p2", Role::Listener, None)).await;
        registry.apply(&joined("p1", Role::Speaker, None)).await;

        assert_eq!(registry.list().await, vec!["p1", "p2"]);
        assert_eq!(registry.role_of("p1").await, Some(Role::Speaker));
        // A join without metadata keeps what was already known.
        assert_eq!(registry.display_of("p1").await.label, "Ruth");
    }

    #[tokio::test]
    async fn speakers_view_lists_only_speakers() {
        let registry = PeerRegistry::new();
        registry.apply(&joined("h", Role::Host, None)).await;
        registry.apply(&joined("s", Role::Speaker, None)).await;
        registry.apply(&joined("l", Role::Listener, None)).await;
        registry
            .apply(&TransportEvent::RoleChanged {
                peer_id: "l".into(),
                role: Role::Speaker,
            })
            .await;

        assert_eq!(registry.list_by_role(Role::Speaker).await, vec!["s", "l"]);
    }

    #[tokio::test]
    async fn display_falls_back_without_metadata() {
        let registry = PeerRegistry::new();
        registry.apply(&joined("abcdef123", Role::Listener, None)).await;

        let display = registry.display_of("abcdef123").await;
        assert_eq!(display.label, "abcdef");
        assert_eq!(
            display.avatar_url,
            "https://api.dicebear.com/6.x/adventurer/svg?seed=abcdef123"
        );
        // Unknown peers resolve too.
        assert_eq!(registry.display_of("zz").await.label, "zz");
    }

    #[tokio::test]
    async fn metadata_and_video_update_in_place() {
        let registry = PeerRegistry::new();
        registry.apply(&joined("p1", Role::Listener, None)).await;
        registry
            .apply(&TransportEvent::MetadataChanged {
                peer_id: "p1".into(),
                metadata: ParticipantMetadata {
                    is_hand_raised: true,
                    ..Default::default()
                },
            })
            .await;
        registry
            .apply(&TransportEvent::VideoStream {
                peer_id: "p1".into(),
                available: true,
            })
            .await;

        let p = registry.participant("p1").await.unwrap();
        assert!(p.metadata.unwrap().is_hand_raised);
        assert!(p.has_video);
    }

    #[tokio::test]
    async fn disconnect_clears() {
        let registry = PeerRegistry::new();
        registry.apply(&joined("p1", Role::Listener, None)).await;
        registry.apply(&TransportEvent::Disconnected).await;
        assert!(registry.is_empty().await);
    }
}
