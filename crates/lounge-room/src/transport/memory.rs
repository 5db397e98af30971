//! In-process transport: every peer of a [`MemoryHub`] shares one address
//! space. Used for local demos and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{Result, RoomError};
use crate::protocol::{DataEnvelope, ParticipantMetadata, Role, Targets};

use super::{JoinRequest, RoleManager, RoomTransport, TransportEvent};

struct Member {
    role: Role,
    metadata: ParticipantMetadata,
    tx: mpsc::Sender<TransportEvent>,
}

#[derive(Default)]
struct HubState {
    /// room_id → peer_id → member
    rooms: HashMap<String, HashMap<String, Member>>,
    /// Number of upcoming joins to reject.
    join_failures: u32,
}

impl HubState {
    fn room_of(&self, peer_id: &str) -> Option<String> {
        self.rooms
            .iter()
            .find(|(_, members)| members.contains_key(peer_id))
            .map(|(room_id, _)| room_id.clone())
    }

    /// Deliver an event to every member of `room_id` accepted by `filter`.
    fn fan_out(&self, room_id: &str, event: &TransportEvent, filter: impl Fn(&str) -> bool) {
        let Some(members) = self.rooms.get(room_id) else {
            return;
        };
        for (peer_id, member) in members {
            if filter(peer_id) {
                deliver(peer_id, &member.tx, event.clone());
            }
        }
    }
}

fn deliver(peer_id: &str, tx: &mpsc::Sender<TransportEvent>, event: TransportEvent) {
    if let Err(e) = tx.try_send(event) {
        warn!(peer_id, error = %e, "Dropping room event");
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

/// Shared switchboard for [`MemoryTransport`]s.
#[derive(Clone, Default)]
pub struct MemoryHub {
    state: Arc<Mutex<HubState>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport for one peer on this hub.
    pub fn transport(&self, peer_id: impl Into<String>) -> MemoryTransport {
        MemoryTransport {
            hub: self.clone(),
            peer_id: peer_id.into(),
        }
    }

    /// Reject the next `count` joins with a transport error.
    pub async fn fail_next_joins(&self, count: u32) {
        self.state.lock().await.join_failures = count;
    }

    /// Peer ids currently in a room, sorted.
    pub async fn members(&self, room_id: &str) -> Vec<String> {
        let state = self.state.lock().await;
        let mut ids: Vec<String> = state
            .rooms
            .get(room_id)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Announce that a peer's video stream started or stopped.
    pub async fn publish_video(&self, peer_id: &str, available: bool) {
        let state = self.state.lock().await;
        if let Some(room_id) = state.room_of(peer_id) {
            let event = TransportEvent::VideoStream {
                peer_id: peer_id.to_string(),
                available,
            };
            state.fan_out(&room_id, &event, |id| id != peer_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// One peer's handle on a [`MemoryHub`].
pub struct MemoryTransport {
    hub: MemoryHub,
    peer_id: String,
}

impl MemoryTransport {
    fn current_room(&self, state: &HubState) -> Result<String> {
        state.room_of(&self.peer_id).ok_or(RoomError::NotJoined)
    }

    /// The caller's room, provided the hub has them down as its host.
    fn hosted_room(&self, state: &HubState, action: &'static str) -> Result<String> {
        let room_id = self.current_room(state)?;
        let is_host = state
            .rooms
            .get(&room_id)
            .and_then(|m| m.get(&self.peer_id))
            .is_some_and(|member| member.role.is_host());
        if !is_host {
            warn!(peer_id = %self.peer_id, action, "Host action refused");
            return Err(RoomError::Unauthorized { action });
        }
        Ok(room_id)
    }
}

#[async_trait]
impl RoomTransport for MemoryTransport {
    async fn join_room(&self, request: JoinRequest) -> Result<mpsc::Receiver<TransportEvent>> {
        let mut state = self.hub.state.lock().await;
        if state.join_failures > 0 {
            state.join_failures -= 1;
            return Err(RoomError::Transport(format!(
                "join to {} rejected",
                request.room_id
            )));
        }

        // A peer is in at most one room.
        if let Some(old_room) = state.room_of(&self.peer_id) {
            if let Some(members) = state.rooms.get_mut(&old_room) {
                members.remove(&self.peer_id);
            }
            let left = TransportEvent::PeerLeft {
                peer_id: self.peer_id.clone(),
            };
            state.fan_out(&old_room, &left, |_| true);
        }

        let (tx, rx) = mpsc::channel(256);
        let members = state.rooms.entry(request.room_id.clone()).or_default();

        for (peer_id, member) in members.iter() {
            deliver(
                &self.peer_id,
                &tx,
                TransportEvent::PeerJoined {
                    peer_id: peer_id.clone(),
                    role: member.role,
                    metadata: Some(member.metadata.clone()),
                },
            );
        }

        members.insert(
            self.peer_id.clone(),
            Member {
                role: request.role,
                metadata: request.metadata.clone(),
                tx,
            },
        );

        let joined = TransportEvent::PeerJoined {
            peer_id: self.peer_id.clone(),
            role: request.role,
            metadata: Some(request.metadata),
        };
        let me = self.peer_id.clone();
        state.fan_out(&request.room_id, &joined, |id| id != me);

        info!(room_id = %request.room_id, peer_id = %self.peer_id, "Joined memory room");
        Ok(rx)
    }

    async fn leave_room(&self) {
        let mut state = self.hub.state.lock().await;
        let Some(room_id) = state.room_of(&self.peer_id) else {
            return;
        };
        if let Some(members) = state.rooms.get_mut(&room_id) {
            members.remove(&self.peer_id);
            if members.is_empty() {
                state.rooms.remove(&room_id);
                debug!(room_id = %room_id, "Memory room closed (empty)");
                return;
            }
        }
        let left = TransportEvent::PeerLeft {
            peer_id: self.peer_id.clone(),
        };
        state.fan_out(&room_id, &left, |_| true);
    }

    async fn update_metadata(&self, metadata: &ParticipantMetadata) -> Result<()> {
        let mut state = self.hub.state.lock().await;
        let room_id = self.current_room(&state)?;
        if let Some(member) = state
            .rooms
            .get_mut(&room_id)
            .and_then(|m| m.get_mut(&self.peer_id))
        {
            member.metadata = metadata.clone();
        }
        let event = TransportEvent::MetadataChanged {
            peer_id: self.peer_id.clone(),
            metadata: metadata.clone(),
        };
        let me = self.peer_id.clone();
        state.fan_out(&room_id, &event, |id| id != me);
        Ok(())
    }

    async fn send_data(&self, to: &Targets, label: &str, payload: &str) -> Result<()> {
        let state = self.hub.state.lock().await;
        let room_id = self.current_room(&state)?;
        let event = TransportEvent::Data(DataEnvelope {
            from: self.peer_id.clone(),
            to: to.clone(),
            label: label.to_string(),
            payload: payload.to_string(),
        });
        let me = self.peer_id.clone();
        state.fan_out(&room_id, &event, |id| id != me && to.includes(id));
        Ok(())
    }

    async fn mute_everyone(&self) -> Result<()> {
        let state = self.hub.state.lock().await;
        let room_id = self.hosted_room(&state, "mute_everyone")?;
        let event = TransportEvent::MuteRequested {
            by: self.peer_id.clone(),
        };
        let me = self.peer_id.clone();
        state.fan_out(&room_id, &event, |id| id != me);
        Ok(())
    }

    async fn remove_peer(&self, peer_id: &str) -> Result<()> {
        let mut state = self.hub.state.lock().await;
        let room_id = self.hosted_room(&state, "remove_participant")?;
        let removed = state
            .rooms
            .get_mut(&room_id)
            .and_then(|m| m.remove(peer_id));
        let Some(removed) = removed else {
            return Err(RoomError::Transport(format!("{peer_id} is not in the room")));
        };
        deliver(
            peer_id,
            &removed.tx,
            TransportEvent::Removed {
                by: self.peer_id.clone(),
            },
        );
        let left = TransportEvent::PeerLeft {
            peer_id: peer_id.to_string(),
        };
        state.fan_out(&room_id, &left, |_| true);
        Ok(())
    }

    fn local_peer_id(&self) -> String {
        self.peer_id.clone()
    }
}

#[async_trait]
impl RoleManager for MemoryTransport {
    async fn set_role(&self, peer_id: &str, role: Role) -> Result<()> {
        let mut state = self.hub.state.lock().await;
        let room_id = self.hosted_room(&state, "set_role")?;
        match state
            .rooms
            .get_mut(&room_id)
            .and_then(|m| m.get_mut(peer_id))
        {
            Some(member) => member.role = role,
            None => return Err(RoomError::Transport(format!("{peer_id} is not in the room"))),
        }
        let event = TransportEvent::RoleChanged {
            peer_id: peer_id.to_string(),
            role,
        };
        state.fan_out(&room_id, &event, |_| true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(room_id: &str, role: Role, name: &str) -> JoinRequest {
        JoinRequest {
            room_id: room_id.into(),
            token: "t".into(),
            role,
            metadata: ParticipantMetadata {
                display_name: name.into(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn joiner_sees_existing_members_and_is_announced() {
        let hub = MemoryHub::new();
        let host = hub.transport("host");
        let guest = hub.transport("guest");

        let mut host_rx = host.join_room(request("r1", Role::Host, "Deborah")).await.unwrap();
        let mut guest_rx = guest.join_room(request("r1", Role::Listener, "Anna")).await.unwrap();

        let seen = guest_rx.recv().await.unwrap();
        assert!(matches!(seen, TransportEvent::PeerJoined { ref peer_id, role: Role::Host, .. } if peer_id == "host"));

        let announced = host_rx.recv().await.unwrap();
        assert!(matches!(announced, TransportEvent::PeerJoined { ref peer_id, .. } if peer_id == "guest"));
        assert_eq!(hub.members("r1").await, vec!["guest", "host"]);
    }

    #[tokio::test]
    async fn data_is_routed_to_targets_only() {
        let hub = MemoryHub::new();
        let a = hub.transport("a");
        let b = hub.transport("b");
        let c = hub.transport("c");
        let _a_rx = a.join_room(request("r", Role::Host, "A")).await.unwrap();
        let mut b_rx = b.join_room(request("r", Role::Listener, "B")).await.unwrap();
        let mut c_rx = c.join_room(request("r", Role::Listener, "C")).await.unwrap();
        while b_rx.try_recv().is_ok() {}
        while c_rx.try_recv().is_ok() {}

        a.send_data(&Targets::peer("b"), "whisper", "hi b").await.unwrap();

        let got = b_rx.try_recv().unwrap();
        assert!(matches!(got, TransportEvent::Data(ref env) if env.payload == "hi b" && env.from == "a"));
        assert!(c_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_join_leaves_no_member() {
        let hub = MemoryHub::new();
        hub.fail_next_joins(1).await;
        let t = hub.transport("p1");
        assert!(t.join_room(request("r", Role::Host, "P")).await.is_err());
        assert!(hub.members("r").await.is_empty());
        assert!(t.join_room(request("r", Role::Host, "P")).await.is_ok());
    }

    #[tokio::test]
    async fn remove_peer_notifies_target_and_room() {
        let hub = MemoryHub::new();
        let host = hub.transport("host");
        let guest = hub.transport("guest");
        let mut host_rx = host.join_room(request("r", Role::Host, "H")).await.unwrap();
        let mut guest_rx = guest.join_room(request("r", Role::Listener, "G")).await.unwrap();
        while host_rx.try_recv().is_ok() {}
        while guest_rx.try_recv().is_ok() {}

        host.remove_peer("guest").await.unwrap();

        assert!(matches!(guest_rx.recv().await, Some(TransportEvent::Removed { ref by }) if by == "host"));
        assert!(matches!(host_rx.recv().await, Some(TransportEvent::PeerLeft { ref peer_id }) if peer_id == "guest"));
        assert_eq!(hub.members("r").await, vec!["host"]);
    }

    #[tokio::test]
    async fn host_actions_from_guests_are_refused() {
        let hub = MemoryHub::new();
        let host = hub.transport("host");
        let guest = hub.transport("guest");
        let mut host_rx = host.join_room(request("r", Role::Host, "H")).await.unwrap();
        let _guest_rx = guest.join_room(request("r", Role::Listener, "G")).await.unwrap();
        while host_rx.try_recv().is_ok() {}

        assert!(matches!(
            guest.set_role("guest", Role::Host).await,
            Err(RoomError::Unauthorized { action: "set_role" })
        ));
        assert!(matches!(
            guest.remove_peer("host").await,
            Err(RoomError::Unauthorized { .. })
        ));
        assert!(matches!(
            guest.mute_everyone().await,
            Err(RoomError::Unauthorized { .. })
        ));

        assert!(host_rx.try_recv().is_err());
        assert_eq!(hub.members("r").await, vec!["guest", "host"]);
    }

    #[tokio::test]
    async fn promoted_host_gains_host_actions() {
        let hub = MemoryHub::new();
        let host = hub.transport("host");
        let guest = hub.transport("guest");
        let _host_rx = host.join_room(request("r", Role::Host, "H")).await.unwrap();
        let _guest_rx = guest.join_room(request("r", Role::Listener, "G")).await.unwrap();

        host.set_role("guest", Role::Host).await.unwrap();

        assert!(guest.mute_everyone().await.is_ok());
    }

    #[tokio::test]
    async fn video_stream_is_announced_to_others() {
        let hub = MemoryHub::new();
        let a = hub.transport("a");
        let b = hub.transport("b");
        let mut a_rx = a.join_room(request("r", Role::Host, "A")).await.unwrap();
        let mut b_rx = b.join_room(request("r", Role::Speaker, "B")).await.unwrap();
        while a_rx.try_recv().is_ok() {}
        while b_rx.try_recv().is_ok() {}

        hub.publish_video("b", true).await;

        assert_eq!(
            a_rx.try_recv().unwrap(),
            TransportEvent::VideoStream {
                peer_id: "b".into(),
                available: true,
            }
        );
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn calls_before_join_are_rejected() {
        let hub = MemoryHub::new();
        let t = hub.transport("p1");
        assert!(matches!(
            t.update_metadata(&ParticipantMetadata::default()).await,
            Err(RoomError::NotJoined)
        ));
        assert!(matches!(
            t.send_data(&Targets::All, "emoji", "💖").await,
            Err(RoomError::NotJoined)
        ));
    }
}
