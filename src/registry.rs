//! Process-wide directory of rooms.
//!
//! Lock order is always registry, then room. Rooms are dropped from the
//! directory once their last member leaves; see [`RoomRegistry::remove_if_empty`].

use crate::room::Room;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub const ROOM_ID_LENGTH: usize = 6;
const ROOM_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    room_capacity: usize,
}

impl RoomRegistry {
    pub fn new(room_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            room_capacity,
        }
    }

    /// Lookup only. Never creates.
    pub async fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Returns the room, creating it if needed. Concurrent callers with the
    /// same id always get the same `Room`.
    pub async fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        if let Some(room) = self.get(room_id).await {
            return room;
        }
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                info!(room = room_id, "room created");
                Arc::new(Room::new(room_id, self.room_capacity))
            })
            .clone()
    }

    /// Creates a room under a freshly generated id that is not already taken.
    pub async fn create(&self) -> Arc<Room> {
        let mut rooms = self.rooms.write().await;
        let mut rng = rand::thread_rng();
        let room_id = loop {
            let candidate = generate_room_id(&mut rng);
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let room = Arc::new(Room::new(room_id.clone(), self.room_capacity));
        rooms.insert(room_id.clone(), room.clone());
        info!(room = %room_id, "room created with generated id");
        room
    }

    /// Drops the room from the directory if nobody is in it.
    ///
    /// The room is retired under its own lock while the registry lock is
    /// held, so a racing `add_member` either lands before (and the room stays)
    /// or sees `RoomError::Retired` and resolves the id again.
    pub async fn remove_if_empty(&self, room_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get(room_id) else {
            return false;
        };
        if !room.retire_if_empty().await {
            return false;
        }
        rooms.remove(room_id);
        info!(room = room_id, "empty room removed");
        true
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn generate_room_id<R: Rng>(rng: &mut R) -> String {
    let index = Uniform::from(0..ROOM_ID_ALPHABET.len());
    (0..ROOM_ID_LENGTH)
        .map(|_| ROOM_ID_ALPHABET[index.sample(rng)] as char)
        .collect()
}
