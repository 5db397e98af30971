//! Per-participant cards. Each card owns its reaction overlay, speaking
//! ticker, and relay subscription; dropping the card releases all three.

use std::sync::Arc;
use std::time::Duration;

use super::overlay::ReactionOverlay;
use super::speaking::{LevelMeter, SpeakingIndicator};
use crate::protocol::Role;
use crate::relay::{MessageRelay, Subscription};

pub(crate) struct CardTimings {
    pub remote_reaction: Duration,
    pub local_reaction: Duration,
    pub speaking_tick: Duration,
}

/// Card for a remote participant. Shows reactions sent by that peer.
pub struct RemoteCard {
    peer_id: String,
    overlay: ReactionOverlay,
    speaking: SpeakingIndicator,
    _subscription: Subscription,
}

impl RemoteCard {
    pub(crate) fn new(
        peer_id: &str,
        relay: &MessageRelay,
        meter: Arc<dyn LevelMeter>,
        timings: &CardTimings,
    ) -> Self {
        let overlay = ReactionOverlay::new(timings.remote_reaction);
        let owner = peer_id.to_string();
        let shown = overlay.clone();
        let subscription = relay.subscribe(
            move |m| m.from == owner && m.message.as_emoji().is_some(),
            move |m| {
                if let Some(emoji) = m.message.as_emoji() {
                    shown.show(emoji);
                }
            },
        );
        Self {
            peer_id: peer_id.to_string(),
            overlay,
            speaking: SpeakingIndicator::new(peer_id, meter, timings.speaking_tick),
            _subscription: subscription,
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn reaction(&self) -> Option<String> {
        self.overlay.current()
    }

    pub fn speaking_level(&self) -> u8 {
        self.speaking.level()
    }

    pub(crate) fn update_role(&mut self, role: Role) {
        self.speaking.set_active(role.is_speaker());
    }
}

/// Card for the local participant. Shows every reaction addressed to us.
pub struct LocalCard {
    overlay: ReactionOverlay,
    speaking: SpeakingIndicator,
    _subscription: Subscription,
}

impl LocalCard {
    pub(crate) fn new(
        peer_id: &str,
        relay: &MessageRelay,
        meter: Arc<dyn LevelMeter>,
        timings: &CardTimings,
    ) -> Self {
        let overlay = ReactionOverlay::new(timings.local_reaction);
        let shown = overlay.clone();
        let subscription = relay.subscribe(
            |m| m.message.as_emoji().is_some(),
            move |m| {
                if let Some(emoji) = m.message.as_emoji() {
                    shown.show(emoji);
                }
            },
        );
        Self {
            overlay,
            speaking: SpeakingIndicator::new(peer_id, meter, timings.speaking_tick),
            _subscription: subscription,
        }
    }

    pub fn reaction(&self) -> Option<String> {
        self.overlay.current()
    }

    pub fn speaking_level(&self) -> u8 {
        self.speaking.level()
    }

    pub(crate) fn update_role(&mut self, role: Role) {
        self.speaking.set_active(role.is_speaker());
    }
}
