//! Property-based tests for the connection registry

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;
use roomchat::backend::realtime::{Connection, ConnectionKey, ConnectionRegistry};
use uuid::Uuid;

#[derive(Debug, Clone)]
enum Op {
    Register { slot: usize },
    Remove { slot: usize },
    RemoveSuperseded { slot: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..8usize).prop_map(|slot| Op::Register { slot }),
        1 => (0..8usize).prop_map(|slot| Op::Remove { slot }),
        1 => (0..8usize).prop_map(|slot| Op::RemoveSuperseded { slot }),
    ]
}

/// Eight identity slots: two users, two devices, with and without a room
fn keys() -> Vec<ConnectionKey> {
    let users = [Uuid::from_u128(1), Uuid::from_u128(2)];
    let mut keys = Vec::new();
    for user in users {
        for device in ["phone", "laptop"] {
            keys.push(ConnectionKey::new(user, device, None));
            keys.push(ConnectionKey::new(user, device, Some("r1".to_string())));
        }
    }
    keys
}

proptest! {
    #[test]
    fn test_at_most_one_connection_per_identity(ops in prop::collection::vec(op(), 1..64)) {
        let keys = keys();
        let registry = ConnectionRegistry::new();
        let mut live: HashMap<usize, Arc<Connection>> = HashMap::new();
        let mut superseded: HashMap<usize, Arc<Connection>> = HashMap::new();

        for op in ops {
            match op {
                Op::Register { slot } => {
                    let (conn, _channels) = Connection::new(keys[slot].clone(), 4);
                    let prior = registry.register(conn.clone());
                    prop_assert_eq!(prior.as_ref().map(|c| c.id()), live.get(&slot).map(|c| c.id()));
                    if let Some(prior) = prior {
                        superseded.insert(slot, prior);
                    }
                    live.insert(slot, conn);
                }
                Op::Remove { slot } => {
                    if let Some(conn) = live.remove(&slot) {
                        prop_assert!(registry.remove(&conn));
                        prop_assert!(!registry.remove(&conn));
                    }
                }
                Op::RemoveSuperseded { slot } => {
                    // a late cleanup of an evicted connection must not touch its successor
                    if let Some(old) = superseded.get(&slot) {
                        prop_assert!(!registry.remove(old));
                    }
                }
            }

            prop_assert_eq!(registry.len(), live.len());
            for (slot, key) in keys.iter().enumerate() {
                let registered = registry.get(key).map(|c| c.id());
                prop_assert_eq!(registered, live.get(&slot).map(|c| c.id()));
            }
            for user in [Uuid::from_u128(1), Uuid::from_u128(2)] {
                let expected = live.values().filter(|c| c.user_id() == user).count();
                prop_assert_eq!(registry.lookup_user(user).len(), expected);
            }
            let in_room = live.values().filter(|c| c.chatroom_id() == Some("r1")).count();
            prop_assert_eq!(registry.lookup_room("r1").len(), in_room);
        }
    }
}
