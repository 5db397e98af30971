//! Grid presentation: one card per participant plus the local card.
//!
//! [`GridPresentation::sync`] reconciles cards with the registry and
//! [`GridPresentation::render`] reconciles then produces a plain
//! [`GridView`] snapshot. Rendering never fails; missing metadata falls
//! back to defaults.

mod card;
mod overlay;
mod speaking;


use std::sync::Arc;
use std::time::Duration;

use lounge_config::RoomConfig;
use tokio::sync::Mutex;
use tracing::debug;

pub use card::{LocalCard, RemoteCard};
pub use overlay::ReactionOverlay;
pub use speaking::{
    AudioLevels, LevelMeter, MeteredLevels, RandomLevels, SpeakingIndicator, MAX_LEVEL,
};

use card::CardTimings;

use crate::local::LocalParticipantController;
use crate::protocol::Role;
use crate::registry::{PeerDisplay, PeerRegistry};
use crate::relay::MessageRelay;

/// Host-only actions offered on a remote card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Affordances {
    /// Promote to speaker. Only offered while the peer's hand is raised.
    pub approve: bool,
    pub remove: bool,
    pub whisper: bool,
    pub pin: bool,
}

impl Affordances {
    fn for_peer(viewer: Role, hand_raised: bool) -> Self {
        if !viewer.is_host() {
            return Self::default();
        }
        Self {
            approve: hand_raised,
            remove: true,
            whisper: true,
            pin: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardView {
    pub peer_id: String,
    pub is_local: bool,
    pub label: String,
    pub avatar_url: String,
    pub role: Role,
    pub host_badge: bool,
    pub hand_raised: bool,
    pub sharing: bool,
    pub show_video: bool,
    pub muted: bool,
    pub video_off: bool,
    pub speaking_level: u8,
    pub reaction: Option<String>,
    pub pinned: bool,
    pub affordances: Affordances,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridView {
    pub local: CardView,
    /// Remote cards in first-seen order.
    pub remotes: Vec<CardView>,
    pub pinned: Option<String>,
}

pub struct GridPresentation {
    registry: PeerRegistry,
    relay: MessageRelay,
    local: Arc<LocalParticipantController>,
    meter: Arc<dyn LevelMeter>,
    timings: CardTimings,
    local_card: Mutex<LocalCard>,
    cards: Mutex<Vec<RemoteCard>>,
    pinned: Mutex<Option<String>>,
}

impl GridPresentation {
    /// Must be called from within a tokio runtime.
    pub fn new(
        registry: PeerRegistry,
        relay: MessageRelay,
        local: Arc<LocalParticipantController>,
        meter: Arc<dyn LevelMeter>,
        config: &RoomConfig,
    ) -> Self {
        let timings = CardTimings {
            remote_reaction: Duration::from_millis(config.remote_reaction_ms),
            local_reaction: Duration::from_millis(config.local_reaction_ms),
            speaking_tick: Duration::from_millis(config.speaking_tick_ms),
        };
        let local_card = LocalCard::new(local.peer_id(), &relay, Arc::clone(&meter), &timings);
        Self {
            registry,
            relay,
            local,
            meter,
            timings,
            local_card: Mutex::new(local_card),
            cards: Mutex::new(Vec::new()),
            pinned: Mutex::new(None),
        }
    }

    /// Reconcile cards with the registry. Departed peers' cards are dropped,
    /// which stops their timers and subscriptions.
    pub async fn sync(&self) {
        let ids = self.registry.list().await;
        let mut cards = self.cards.lock().await;

        cards.retain(|card| {
            let keep = ids.iter().any(|id| id == card.peer_id());
            if !keep {
                debug!(peer_id = %card.peer_id(), "Dropping card");
            }
            keep
        });
        for id in &ids {
            if !cards.iter().any(|c| c.peer_id() == id) {
                cards.push(RemoteCard::new(
                    id,
                    &self.relay,
                    Arc::clone(&self.meter),
                    &self.timings,
                ));
            }
        }
        cards.sort_by_key(|c| ids.iter().position(|id| id == c.peer_id()));

        for card in cards.iter_mut() {
            let role = self.registry.role_of(card.peer_id()).await.unwrap_or_default();
            card.update_role(role);
        }
        self.local_card
            .lock()
            .await
            .update_role(self.local.role().await);

        let mut pinned = self.pinned.lock().await;
        if pinned.as_ref().is_some_and(|p| !ids.contains(p)) {
            debug!(peer_id = ?pinned, "Pinned peer left, clearing pin");
            *pinned = None;
        }
    }

    /// Pin a card. Last write wins.
    pub async fn pin(&self, peer_id: impl Into<String>) {
        *self.pinned.lock().await = Some(peer_id.into());
    }

    pub async fn unpin(&self) {
        *self.pinned.lock().await = None;
    }

    pub async fn pinned(&self) -> Option<String> {
        self.pinned.lock().await.clone()
    }

    pub async fn card_count(&self) -> usize {
        self.cards.lock().await.len()
    }

    pub async fn render(&self) -> GridView {
        self.sync().await;
        let viewer = self.local.role().await;
        let pinned = self.pinned().await;

        let local = {
            let metadata = self.local.metadata().await;
            let media = self.local.media().await;
            let card = self.local_card.lock().await;
            let display = PeerDisplay::resolve(self.local.peer_id(), Some(&metadata));
            CardView {
                peer_id: self.local.peer_id().to_string(),
                is_local: true,
                label: display.label,
                avatar_url: display.avatar_url,
                role: viewer,
                host_badge: viewer.is_host(),
                hand_raised: metadata.is_hand_raised,
                sharing: metadata.is_sharing,
                show_video: !media.video_off,
                muted: media.muted,
                video_off: media.video_off,
                speaking_level: card.speaking_level(),
                reaction: card.reaction(),
                pinned: pinned.as_deref() == Some(self.local.peer_id()),
                affordances: Affordances::default(),
            }
        };

        let cards = self.cards.lock().await;
        let mut remotes = Vec::with_capacity(cards.len());
        for card in cards.iter() {
            let participant = self.registry.participant(card.peer_id()).await;
            let metadata = participant.as_ref().and_then(|p| p.metadata.clone());
            let display = PeerDisplay::resolve(card.peer_id(), metadata.as_ref());
            let role = participant.as_ref().map(|p| p.role).unwrap_or_default();
            let media = participant.as_ref().map(|p| p.media).unwrap_or_default();
            let has_video = participant.as_ref().is_some_and(|p| p.has_video);
            let hand_raised = metadata.as_ref().is_some_and(|m| m.is_hand_raised);

            remotes.push(CardView {
                peer_id: card.peer_id().to_string(),
                is_local: false,
                label: display.label,
                avatar_url: display.avatar_url,
                role,
                host_badge: role.is_host(),
                hand_raised,
                sharing: metadata.as_ref().is_some_and(|m| m.is_sharing),
                show_video: has_video && !media.video_off,
                muted: media.muted,
                video_off: media.video_off,
                speaking_level: card.speaking_level(),
                reaction: card.reaction(),
                pinned: pinned.as_deref() == Some(card.peer_id()),
                affordances: Affordances::for_peer(viewer, hand_raised),
            });
        }

        GridView {
            local,
            remotes,
            pinned,
        }
    }
}
