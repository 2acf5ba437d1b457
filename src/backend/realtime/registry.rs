/**
 * Connection Registry
 *
 * Process-wide set of live connections, indexed three ways:
 *
 * - `by_key`  - identity slot → the one connection occupying it
 * - `by_user` - user → every connection of that user (devices, rooms)
 * - `by_room` - chatroom → connections currently viewing it
 *
 * # Concurrency
 *
 * The registry is split into shards by a hash of the user ID. All three
 * indices for a given connection live in the same shard, so `register` and
 * `remove` update them together in one short critical section, while
 * unrelated users land on different locks. No lock is ever held across an
 * `.await`; lookups return snapshot copies.
 */
use std::collections::hash_map::RandomState;
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasher;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::connection::{Connection, ConnectionId, ConnectionKey};

const SHARD_COUNT: usize = 16;

/// Who a lookup or broadcast is aimed at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    /// A chatroom
    Room(String),
    /// All connections of one user
    User(Uuid),
    /// All connections of several users
    Users(Vec<Uuid>),
}

type ConnectionSet = HashMap<ConnectionId, Arc<Connection>>;

#[derive(Default)]
struct Shard {
    by_key: HashMap<ConnectionKey, Arc<Connection>>,
    by_user: HashMap<Uuid, ConnectionSet>,
    by_room: HashMap<String, ConnectionSet>,
}

impl Shard {
    fn index(&mut self, conn: &Arc<Connection>) {
        self.by_user
            .entry(conn.user_id())
            .or_default()
            .insert(conn.id(), conn.clone());
        if let Some(room) = conn.chatroom_id() {
            self.by_room
                .entry(room.to_string())
                .or_default()
                .insert(conn.id(), conn.clone());
        }
    }

    fn unindex(&mut self, conn: &Connection) {
        if let Some(set) = self.by_user.get_mut(&conn.user_id()) {
            set.remove(&conn.id());
            if set.is_empty() {
                self.by_user.remove(&conn.user_id());
            }
        }
        if let Some(room) = conn.chatroom_id() {
            if let Some(set) = self.by_room.get_mut(room) {
                set.remove(&conn.id());
                if set.is_empty() {
                    self.by_room.remove(room);
                }
            }
        }
    }
}

/// Registry of all live connections
pub struct ConnectionRegistry {
    shards: Box<[Mutex<Shard>]>,
    hasher: RandomState,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(Shard::default())).collect(),
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, user_id: &Uuid) -> &Mutex<Shard> {
        let index = self.hasher.hash_one(user_id) as usize % self.shards.len();
        &self.shards[index]
    }

    /// Insert `conn` into its identity slot.
    ///
    /// If another connection held the slot it is unindexed and returned; the
    /// caller owns closing it. Atomic with respect to every other registry
    /// call on the same user.
    pub fn register(&self, conn: Arc<Connection>) -> Option<Arc<Connection>> {
        let prior = {
            let mut shard = self.shard(&conn.user_id()).lock();
            let prior = shard.by_key.insert(conn.key().clone(), conn.clone());
            if let Some(prior) = &prior {
                shard.unindex(prior);
            }
            shard.index(&conn);
            prior
        };

        tracing::debug!(
            user_id = %conn.user_id(),
            connection_id = %conn.id(),
            chatroom_id = ?conn.chatroom_id(),
            superseded = ?prior.as_ref().map(|p| p.id()),
            "[Realtime] Connection registered"
        );

        prior.filter(|prior| prior.id() != conn.id())
    }

    /// Remove `conn`, but only while it still owns its identity slot.
    ///
    /// A late removal of a connection that was already superseded leaves the
    /// newer connection alone. Returns whether anything was removed; calling
    /// it again is a no-op.
    pub fn remove(&self, conn: &Connection) -> bool {
        let removed = {
            let mut shard = self.shard(&conn.user_id()).lock();
            let owns_slot = shard
                .by_key
                .get(conn.key())
                .is_some_and(|current| current.id() == conn.id());
            if owns_slot {
                shard.by_key.remove(conn.key());
                shard.unindex(conn);
            }
            owns_slot
        };

        if removed {
            tracing::debug!(
                user_id = %conn.user_id(),
                connection_id = %conn.id(),
                "[Realtime] Connection removed"
            );
        }
        removed
    }

    /// Whether `conn` currently owns its identity slot
    pub fn is_registered(&self, conn: &Connection) -> bool {
        self.shard(&conn.user_id())
            .lock()
            .by_key
            .get(conn.key())
            .is_some_and(|current| current.id() == conn.id())
    }

    /// The connection occupying `key`, if any
    pub fn get(&self, key: &ConnectionKey) -> Option<Arc<Connection>> {
        self.shard(&key.user_id).lock().by_key.get(key).cloned()
    }

    /// Snapshot of every connection of `user_id`
    pub fn lookup_user(&self, user_id: Uuid) -> Vec<Arc<Connection>> {
        self.shard(&user_id)
            .lock()
            .by_user
            .get(&user_id)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Snapshot of every connection of the given users
    pub fn lookup_users(&self, user_ids: &[Uuid]) -> Vec<Arc<Connection>> {
        let unique: HashSet<&Uuid> = user_ids.iter().collect();
        unique
            .into_iter()
            .flat_map(|user_id| self.lookup_user(*user_id))
            .collect()
    }

    /// Snapshot of connections currently viewing `chatroom_id`
    pub fn lookup_room(&self, chatroom_id: &str) -> Vec<Arc<Connection>> {
        self.shards
            .iter()
            .flat_map(|shard| {
                shard
                    .lock()
                    .by_room
                    .get(chatroom_id)
                    .map(|set| set.values().cloned().collect::<Vec<_>>())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Snapshot of the live connections matching `audience`.
    ///
    /// For `Audience::Room` these are the connections scoped to that room;
    /// membership filtering is the dispatcher's job.
    pub fn lookup_audience(&self, audience: &Audience) -> Vec<Arc<Connection>> {
        match audience {
            Audience::Room(chatroom_id) => self.lookup_room(chatroom_id),
            Audience::User(user_id) => self.lookup_user(*user_id),
            Audience::Users(user_ids) => self.lookup_users(user_ids),
        }
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().by_key.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of users with at least one connection
    pub fn user_count(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().by_user.len()).sum()
    }

    /// Remove and return every connection. Used on shutdown.
    pub fn drain(&self) -> Vec<Arc<Connection>> {
        self.shards
            .iter()
            .flat_map(|shard| {
                let mut shard = shard.lock();
                shard.by_user.clear();
                shard.by_room.clear();
                let drained: Vec<_> = shard.by_key.drain().map(|(_, conn)| conn).collect();
                drained
            })
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
