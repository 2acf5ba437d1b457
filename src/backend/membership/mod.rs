//! Chatroom Membership
//!
//! The realtime core never stores who belongs to which chatroom; it asks a
//! `MembershipProvider`. Two providers ship with the server:
//!
//! - **`InMemoryMembership`** - a `DashMap` of room → members, used in tests
//!   and single-process development setups
//! - **`HttpMembership`** - asks the chat REST service over HTTP
//!
//! Which one runs is decided by `membership_url` in the server config.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

/// HTTP-backed provider
pub mod http;

pub use http::HttpMembership;

/// Membership lookup failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MembershipError {
    #[error("chatroom not found: {0}")]
    RoomNotFound(String),

    #[error("membership service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid membership response: {0}")]
    InvalidResponse(String),
}

/// Source of truth for chatroom members
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    /// Every member of `chatroom_id`, sender included
    async fn room_member_ids(&self, chatroom_id: &str) -> Result<Vec<Uuid>, MembershipError>;

    /// Whether `user_id` belongs to `chatroom_id`. An unknown room counts as
    /// "not a member".
    async fn is_member(&self, chatroom_id: &str, user_id: Uuid) -> Result<bool, MembershipError> {
        match self.room_member_ids(chatroom_id).await {
            Ok(members) => Ok(members.contains(&user_id)),
            Err(MembershipError::RoomNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Membership held in process memory
#[derive(Debug, Default)]
pub struct InMemoryMembership {
    rooms: DashMap<String, HashSet<Uuid>>,
}

impl InMemoryMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the member list of a room
    pub fn set_members(&self, chatroom_id: impl Into<String>, members: impl IntoIterator<Item = Uuid>) {
        self.rooms
            .insert(chatroom_id.into(), members.into_iter().collect());
    }

    pub fn add_member(&self, chatroom_id: impl Into<String>, user_id: Uuid) {
        self.rooms.entry(chatroom_id.into()).or_default().insert(user_id);
    }

    pub fn remove_member(&self, chatroom_id: &str, user_id: Uuid) {
        if let Some(mut members) = self.rooms.get_mut(chatroom_id) {
            members.remove(&user_id);
        }
    }
}

#[async_trait]
impl MembershipProvider for InMemoryMembership {
    async fn room_member_ids(&self, chatroom_id: &str) -> Result<Vec<Uuid>, MembershipError> {
        self.rooms
            .get(chatroom_id)
            .map(|members| members.iter().copied().collect())
            .ok_or_else(|| MembershipError::RoomNotFound(chatroom_id.to_string()))
    }
}
