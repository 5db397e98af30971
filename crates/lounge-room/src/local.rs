//! The local participant: hand raise, media toggles, reactions.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::identity::Identity;
use crate::protocol::{ParticipantMetadata, Role, RoomMessage, Targets};
use crate::registry::MediaState;
use crate::relay::MessageRelay;
use crate::transport::RoomTransport;

struct LocalState {
    role: Role,
    metadata: ParticipantMetadata,
    media: MediaState,
}

pub struct LocalParticipantController {
    peer_id: String,
    transport: Arc<dyn RoomTransport>,
    relay: MessageRelay,
    state: Mutex<LocalState>,
}

impl LocalParticipantController {
    pub fn new(
        identity: &Identity,
        transport: Arc<dyn RoomTransport>,
        relay: MessageRelay,
    ) -> Self {
        Self {
            peer_id: identity.peer_id.clone(),
            transport,
            relay,
            state: Mutex::new(LocalState {
                role: identity.role,
                metadata: identity.initial_metadata(),
                media: MediaState::default(),
            }),
        }
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub async fn role(&self) -> Role {
        self.state.lock().await.role
    }

    pub async fn set_role(&self, role: Role) {
        self.state.lock().await.role = role;
    }

    pub async fn metadata(&self) -> ParticipantMetadata {
        self.state.lock().await.metadata.clone()
    }

    pub async fn media(&self) -> MediaState {
        self.state.lock().await.media
    }

    /// Raise the local hand and replicate it.
    ///
    /// Returns `Ok(false)` without broadcasting when the hand is already up.
    /// The flag is only committed once the broadcast succeeds.
    pub async fn raise_hand(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.metadata.is_hand_raised {
            debug!("Hand already raised");
            return Ok(false);
        }
        let next = ParticipantMetadata {
            is_hand_raised: true,
            ..state.metadata.clone()
        };
        self.transport.update_metadata(&next).await?;
        state.metadata = next;
        info!(peer_id = %self.peer_id, "Hand raised");
        Ok(true)
    }

    /// Publish whether the local participant is sharing. Returns whether
    /// anything changed.
    pub async fn set_sharing(&self, sharing: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.metadata.is_sharing == sharing {
            return Ok(false);
        }
        let next = ParticipantMetadata {
            is_sharing: sharing,
            ..state.metadata.clone()
        };
        self.transport.update_metadata(&next).await?;
        state.metadata = next;
        Ok(true)
    }

    /// Local only. Returns the new muted flag.
    pub async fn toggle_mute(&self) -> bool {
        let mut state = self.state.lock().await;
        state.media.muted = !state.media.muted;
        state.media.muted
    }

    /// Local only. Returns the new video-off flag.
    pub async fn toggle_video(&self) -> bool {
        let mut state = self.state.lock().await;
        state.media.video_off = !state.media.video_off;
        state.media.video_off
    }

    /// Honour a host's "mute everyone".
    pub async fn mute(&self) {
        self.state.lock().await.media.muted = true;
    }

    pub async fn send_reaction(&self, emoji: &str) -> Result<()> {
        self.relay
            .send(&Targets::All, &RoomMessage::Emoji(emoji.to_string()))
            .await
    }

    /// Ask the given peers (usually the hosts) for the floor.
    pub async fn request_to_speak(&self, peer_ids: Vec<String>) -> Result<()> {
        if peer_ids.is_empty() {
            debug!("No one to ask for the floor");
            return Ok(());
        }
        let request = RoomMessage::SpeakerRequest {
            peer_id: self.peer_id.clone(),
        };
        self.relay.send(&Targets::Peers(peer_ids), &request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::RoomError;
    use crate::transport::{JoinRequest, TransportEvent};

    /// Counts metadata broadcasts; fails the first `fail_first` of them.
    #[derive(Default)]
    struct CountingTransport {
        updates: AtomicUsize,
        fail_first: AtomicUsize,
        sent: std::sync::Mutex<Vec<(Targets, String, String)>>,
    }

    #[async_trait]
    impl RoomTransport for CountingTransport {
        async fn join_room(&self, _: JoinRequest) -> Result<mpsc::Receiver<TransportEvent>> {
            Ok(mpsc::channel(1).1)
        }

        async fn leave_room(&self) {}

        async fn update_metadata(&self, _: &ParticipantMetadata) -> Result<()> {
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(RoomError::Transport("offline".into()));
            }
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send_data(&self, to: &Targets, label: &str, payload: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.clone(), label.to_string(), payload.to_string()));
            Ok(())
        }

        async fn mute_everyone(&self) -> Result<()> {
            Ok(())
        }

        async fn remove_peer(&self, _: &str) -> Result<()> {
            Ok(())
        }

        fn local_peer_id(&self) -> String {
            "me".into()
        }
    }

    fn controller(transport: Arc<CountingTransport>) -> LocalParticipantController {
        let identity = Identity::new("me", "Deborah", Role::Listener);
        let relay = MessageRelay::new(transport.clone());
        LocalParticipantController::new(&identity, transport, relay)
    }

    #[tokio::test]
    async fn raise_hand_is_idempotent() {
        let transport = Arc::new(CountingTransport::default());
        let local = controller(transport.clone());

        assert!(local.raise_hand().await.unwrap());
        assert!(!local.raise_hand().await.unwrap());
        assert_eq!(transport.updates.load(Ordering::SeqCst), 1);
        assert!(local.metadata().await.is_hand_raised);
    }

    #[tokio::test]
    async fn failed_raise_can_be_retried() {
        let transport = Arc::new(CountingTransport::default());
        transport.fail_first.store(1, Ordering::SeqCst);
        let local = controller(transport.clone());

        assert!(local.raise_hand().await.is_err());
        assert!(!local.metadata().await.is_hand_raised);
        assert!(local.raise_hand().await.unwrap());
        assert_eq!(transport.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn toggles_are_local() {
        let transport = Arc::new(CountingTransport::default());
        let local = controller(transport.clone());

        assert!(local.toggle_mute().await);
        assert!(!local.toggle_mute().await);
        assert!(local.toggle_video().await);
        assert_eq!(transport.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sharing_broadcasts_only_on_change() {
        let transport = Arc::new(CountingTransport::default());
        let local = controller(transport.clone());

        assert!(local.set_sharing(true).await.unwrap());
        assert!(!local.set_sharing(true).await.unwrap());
        assert_eq!(transport.updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reactions_and_requests_use_the_relay() {
        let transport = Arc::new(CountingTransport::default());
        let local = controller(transport.clone());

        local.send_reaction("💖").await.unwrap();
        local.request_to_speak(vec!["host".into()]).await.unwrap();
        local.request_to_speak(Vec::new()).await.unwrap();

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                (Targets::All, "emoji".to_string(), "💖".to_string()),
                (Targets::peer("host"), "speakerRequest".to_string(), "me".to_string()),
            ]
        );
    }
}
