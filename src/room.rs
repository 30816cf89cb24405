use crate::error::RoomError;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// What a room needs from a member: who it is, and a way to hand it a payload.
///
/// `send` must not block. The room calls it while holding its read lock.
pub trait Participant: Send + Sync {
    fn id(&self) -> &str;
    fn send(&self, payload: &str);
}

#[derive(Default)]
struct Membership {
    // Join order. A handful of entries, so linear lookups are fine.
    members: Vec<Arc<dyn Participant>>,
    retired: bool,
}

impl Membership {
    fn find(&self, participant_id: &str) -> Option<&Arc<dyn Participant>> {
        self.members.iter().find(|m| m.id() == participant_id)
    }
}

/// A bounded group of participants exchanging signaling messages.
pub struct Room {
    id: String,
    capacity: usize,
    membership: RwLock<Membership>,
}

impl Room {
    pub fn new(id: impl Into<String>, capacity: usize) -> Self {
        Room {
            id: id.into(),
            capacity,
            membership: RwLock::new(Membership::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adds a member. Leaves the room untouched on any error.
    pub async fn add_member(&self, participant: Arc<dyn Participant>) -> Result<(), RoomError> {
        let mut membership = self.membership.write().await;
        if membership.retired {
            return Err(RoomError::Retired);
        }
        if membership.members.len() >= self.capacity {
            return Err(RoomError::Full {
                capacity: self.capacity,
            });
        }
        if membership.find(participant.id()).is_some() {
            return Err(RoomError::DuplicateParticipant(participant.id().to_string()));
        }
        debug!(room = %self.id, participant = participant.id(), "member added");
        membership.members.push(participant);
        Ok(())
    }

    /// Removes a member. Removing someone who is not here is a no-op.
    pub async fn remove_member(&self, participant_id: &str) -> Option<Arc<dyn Participant>> {
        let mut membership = self.membership.write().await;
        let index = membership
            .members
            .iter()
            .position(|m| m.id() == participant_id)?;
        debug!(room = %self.id, participant = participant_id, "member removed");
        Some(membership.members.remove(index))
    }

    /// Hands `payload` to every member except `exclude_id`. Returns how many got it.
    pub async fn broadcast(&self, exclude_id: &str, payload: &str) -> usize {
        let membership = self.membership.read().await;
        let mut delivered = 0;
        for member in membership.members.iter().filter(|m| m.id() != exclude_id) {
            member.send(payload);
            delivered += 1;
        }
        delivered
    }

    /// Hands `payload` to one member. Returns false if that member is not here.
    pub async fn send_to(&self, participant_id: &str, payload: &str) -> bool {
        let membership = self.membership.read().await;
        match membership.find(participant_id) {
            Some(member) => {
                member.send(payload);
                true
            }
            None => false,
        }
    }

    /// Ids of everyone but `exclude_id`, in join order. Stale as soon as it returns.
    pub async fn other_members(&self, exclude_id: &str) -> Vec<String> {
        let membership = self.membership.read().await;
        membership
            .members
            .iter()
            .map(|m| m.id())
            .filter(|id| *id != exclude_id)
            .map(str::to_string)
            .collect()
    }

    pub async fn contains(&self, participant_id: &str) -> bool {
        self.membership.read().await.find(participant_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.membership.read().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Marks an empty room as closed so no one can join it again.
    /// Returns false, and changes nothing, if anyone is still inside.
    pub(crate) async fn retire_if_empty(&self) -> bool {
        let mut membership = self.membership.write().await;
        if membership.members.is_empty() {
            membership.retired = true;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records every payload it is handed.
    pub(crate) struct FakeParticipant {
        id: String,
        pub received: Mutex<Vec<String>>,
    }

    impl FakeParticipant {
        pub(crate) fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                received: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn received(&self) -> Vec<String> {
            self.received.lock().clone()
        }
    }

    impl Participant for FakeParticipant {
        fn id(&self) -> &str {
            &self.id
        }

        fn send(&self, payload: &str) {
            self.received.lock().push(payload.to_string());
        }
    }

    async fn room_with(ids: &[&str]) -> (Room, Vec<Arc<FakeParticipant>>) {
        let room = Room::new("r1", 4);
        let mut members = Vec::new();
        for id in ids {
            let member = FakeParticipant::new(id);
            room.add_member(member.clone()).await.unwrap();
            members.push(member);
        }
        (room, members)
    }

    #[tokio::test]
    async fn test_fifth_member_is_rejected() {
        let (room, _members) = room_with(&["a", "b", "c", "d"]).await;

        let result = room.add_member(FakeParticipant::new("e")).await;

        assert_eq!(result, Err(RoomError::Full { capacity: 4 }));
        assert_eq!(room.len().await, 4);
        assert!(!room.contains("e").await);
    }

    #[tokio::test]
    async fn test_duplicate_participant_is_rejected() {
        let (room, _members) = room_with(&["a"]).await;

        let result = room.add_member(FakeParticipant::new("a")).await;

        assert_eq!(result, Err(RoomError::DuplicateParticipant("a".into())));
        assert_eq!(room.len().await, 1);
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let (room, members) = room_with(&["a", "b", "c"]).await;

        let delivered = room.broadcast("a", "hello").await;

        assert_eq!(delivered, 2);
        assert!(members[0].received().is_empty());
        assert_eq!(members[1].received(), vec!["hello"]);
        assert_eq!(members[2].received(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_send_to_single_member() {
        let (room, members) = room_with(&["a", "b", "c"]).await;

        assert!(room.send_to("c", "psst").await);
        assert!(!room.send_to("zed", "psst").await);

        assert!(members[0].received().is_empty());
        assert!(members[1].received().is_empty());
        assert_eq!(members[2].received(), vec!["psst"]);
    }

    #[tokio::test]
    async fn test_remove_absent_member_is_noop() {
        let (room, _members) = room_with(&["a", "b"]).await;

        assert!(room.remove_member("zed").await.is_none());
        assert_eq!(room.len().await, 2);

        assert!(room.remove_member("a").await.is_some());
        assert!(room.remove_member("a").await.is_none());
        assert_eq!(room.len().await, 1);
    }

    #[tokio::test]
    async fn test_other_members_in_join_order() {
        let (room, _members) = room_with(&["a", "b", "c"]).await;

        assert_eq!(room.other_members("b").await, vec!["a", "c"]);
        assert_eq!(room.other_members("zed").await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_retired_room_refuses_members() {
        let (room, _members) = room_with(&["a"]).await;
        assert!(!room.retire_if_empty().await);

        room.remove_member("a").await;
        assert!(room.retire_if_empty().await);

        let result = room.add_member(FakeParticipant::new("b")).await;
        assert_eq!(result, Err(RoomError::Retired));
    }
}
