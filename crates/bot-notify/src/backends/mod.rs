//! Collaborator interfaces the pipeline talks to.
//!
//! The host server supplies implementations backed by its own persistence
//! and real-time transport. [`MemoryBackend`] and [`BroadcastBus`] are
//! in-process implementations used by the demo binary and the tests.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::events::RealtimeEvent;
use crate::localize::TemplateLocalizer;
use crate::model::{Channel, ChannelMember, Post, Preference, User};

pub use memory::{BroadcastBus, MemoryBackend};

/// The set of collaborators a [`BotNotifier`](crate::BotNotifier) is built from.
#[derive(Clone)]
pub struct Backends {
    pub users: Arc<dyn UserDirectory>,
    pub channels: Arc<dyn ChannelStore>,
    pub posts: Arc<dyn PostStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub bus: Arc<dyn RealtimeBus>,
    pub localizer: Arc<dyn Localizer>,
}

impl Backends {
    /// Use `store` for every store and the built-in message catalog.
    pub fn in_memory(store: &Arc<MemoryBackend>, bus: Arc<dyn RealtimeBus>) -> Self {
        Self {
            users: store.clone(),
            channels: store.clone(),
            posts: store.clone(),
            preferences: store.clone(),
            bus,
            localizer: Arc::new(TemplateLocalizer::with_defaults()),
        }
    }
}

/// User account lookups and creation.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_by_username(&self, username: &str) -> Result<User, StoreError>;

    async fn get(&self, user_id: &str) -> Result<User, StoreError>;

    /// Persist a new user. Fails with `Conflict` if the username is taken.
    async fn create(&self, user: User) -> Result<User, StoreError>;
}

/// Channel lookups and direct channel creation.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn get_by_canonical_name(&self, name: &str) -> Result<Channel, StoreError>;

    /// Create the direct channel between two users and add both as members.
    ///
    /// Fails with `NotFound` if either user does not exist and with
    /// `Conflict` if the channel already exists.
    async fn create_direct(&self, user_a: &str, user_b: &str) -> Result<Channel, StoreError>;

    async fn get_members(&self, channel_id: &str) -> Result<Vec<ChannelMember>, StoreError>;
}

/// Post persistence.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, StoreError>;
}

/// Per-user client preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(
        &self,
        user_id: &str,
        category: &str,
        name: &str,
    ) -> Result<Preference, StoreError>;

    async fn save(&self, preferences: &[Preference]) -> Result<(), StoreError>;
}

/// Real-time event transport to connected clients.
///
/// Publishing is fire-and-forget: it must not block and reports nothing.
pub trait RealtimeBus: Send + Sync {
    fn publish(&self, event: RealtimeEvent);
}

/// Message string lookup and formatting.
pub trait Localizer: Send + Sync {
    /// Render the message `key` with named `args`.
    fn translate(&self, key: &str, args: &Value) -> String;
}
