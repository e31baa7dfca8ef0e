//! In-process backend implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{ChannelStore, PostStore, PreferenceStore, RealtimeBus, UserDirectory};
use crate::error::StoreError;
use crate::events::RealtimeEvent;
use crate::model::{direct_channel_name, Channel, ChannelMember, Post, Preference, User};

/// Store operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    UserLookup,
    UserCreate,
    ChannelLookup,
    ChannelCreate,
    MemberList,
    PostCreate,
    PreferenceRead,
    PreferenceWrite,
}

const FAULT_COUNT: usize = 8;

type PreferenceKey = (String, String, String);

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    /// Channels keyed by name
    channels: HashMap<String, Channel>,
    members: Vec<ChannelMember>,
    posts: Vec<Post>,
    preferences: HashMap<PreferenceKey, Preference>,
}

/// Thread-safe in-memory implementation of every store trait.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    faults: [AtomicBool; FAULT_COUNT],
    user_creates: AtomicUsize,
    channel_creates: AtomicUsize,
    preference_writes: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `fault` fail (or succeed again) on subsequent calls.
    pub fn set_fault(&self, fault: Fault, failing: bool) {
        self.faults[fault as usize].store(failing, Ordering::SeqCst);
    }

    fn check(&self, fault: Fault) -> Result<(), StoreError> {
        if self.faults[fault as usize].load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{fault:?} disabled")));
        }
        Ok(())
    }

    /// Insert a user directly, bypassing fault injection.
    pub async fn add_user(&self, username: &str) -> User {
        let user = User::new(
            username,
            format!("{username}@example.com"),
            username,
            String::new(),
        );
        let mut state = self.state.write().await;
        state.users.insert(user.id.clone(), user.clone());
        user
    }

    /// Insert a channel and its members directly.
    pub async fn add_channel(&self, channel: Channel, member_ids: &[&str]) {
        let mut state = self.state.write().await;
        for user_id in member_ids {
            state.members.push(ChannelMember {
                channel_id: channel.id.clone(),
                user_id: (*user_id).to_string(),
            });
        }
        state.channels.insert(channel.name.clone(), channel);
    }

    /// Store a preference directly, without counting it as a write.
    pub async fn put_preference(&self, preference: Preference) {
        let key = preference_key(&preference);
        self.state.write().await.preferences.insert(key, preference);
    }

    /// Look up a stored preference.
    pub async fn preference(
        &self,
        user_id: &str,
        category: &str,
        name: &str,
    ) -> Option<Preference> {
        let key = (user_id.to_string(), category.to_string(), name.to_string());
        self.state.read().await.preferences.get(&key).cloned()
    }

    /// All posts, in creation order.
    pub async fn posts(&self) -> Vec<Post> {
        self.state.read().await.posts.clone()
    }

    /// All channels.
    pub async fn channels(&self) -> Vec<Channel> {
        self.state.read().await.channels.values().cloned().collect()
    }

    /// Number of users currently stored.
    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    /// Number of successful user creations through [`UserDirectory::create`].
    pub fn user_creates(&self) -> usize {
        self.user_creates.load(Ordering::SeqCst)
    }

    /// Number of successful direct channel creations.
    pub fn channel_creates(&self) -> usize {
        self.channel_creates.load(Ordering::SeqCst)
    }

    /// Number of successful preference saves.
    pub fn preference_writes(&self) -> usize {
        self.preference_writes.load(Ordering::SeqCst)
    }
}

fn preference_key(preference: &Preference) -> PreferenceKey {
    (
        preference.user_id.clone(),
        preference.category.clone(),
        preference.name.clone(),
    )
}

#[async_trait]
impl UserDirectory for MemoryBackend {
    async fn get_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.check(Fault::UserLookup)?;
        let state = self.state.read().await;
        state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", username))
    }

    async fn get(&self, user_id: &str) -> Result<User, StoreError> {
        self.check(Fault::UserLookup)?;
        let state = self.state.read().await;
        state
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", user_id))
    }

    async fn create(&self, user: User) -> Result<User, StoreError> {
        self.check(Fault::UserCreate)?;
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        state.users.insert(user.id.clone(), user.clone());
        self.user_creates.fetch_add(1, Ordering::SeqCst);
        Ok(user)
    }
}

#[async_trait]
impl ChannelStore for MemoryBackend {
    async fn get_by_canonical_name(&self, name: &str) -> Result<Channel, StoreError> {
        self.check(Fault::ChannelLookup)?;
        let state = self.state.read().await;
        state
            .channels
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found("channel", name))
    }

    async fn create_direct(&self, user_a: &str, user_b: &str) -> Result<Channel, StoreError> {
        self.check(Fault::ChannelCreate)?;
        let mut state = self.state.write().await;
        for user_id in [user_a, user_b] {
            if !state.users.contains_key(user_id) {
                return Err(StoreError::not_found("user", user_id));
            }
        }

        let name = direct_channel_name(user_a, user_b);
        if state.channels.contains_key(&name) {
            return Err(StoreError::Conflict(format!(
                "channel '{name}' already exists"
            )));
        }

        let channel = Channel::direct(user_a, user_b);
        for user_id in [user_a, user_b] {
            state.members.push(ChannelMember {
                channel_id: channel.id.clone(),
                user_id: user_id.to_string(),
            });
        }
        state.channels.insert(name, channel.clone());
        self.channel_creates.fetch_add(1, Ordering::SeqCst);
        Ok(channel)
    }

    async fn get_members(&self, channel_id: &str) -> Result<Vec<ChannelMember>, StoreError> {
        self.check(Fault::MemberList)?;
        let state = self.state.read().await;
        Ok(state
            .members
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PostStore for MemoryBackend {
    async fn create(&self, post: Post) -> Result<Post, StoreError> {
        self.check(Fault::PostCreate)?;
        let mut state = self.state.write().await;
        if !state.channels.values().any(|c| c.id == post.channel_id) {
            return Err(StoreError::not_found("channel", &post.channel_id));
        }
        state.posts.push(post.clone());
        Ok(post)
    }
}

#[async_trait]
impl PreferenceStore for MemoryBackend {
    async fn get(
        &self,
        user_id: &str,
        category: &str,
        name: &str,
    ) -> Result<Preference, StoreError> {
        self.check(Fault::PreferenceRead)?;
        self.preference(user_id, category, name)
            .await
            .ok_or_else(|| {
                StoreError::not_found("preference", format!("{user_id}/{category}/{name}"))
            })
    }

    async fn save(&self, preferences: &[Preference]) -> Result<(), StoreError> {
        self.check(Fault::PreferenceWrite)?;
        let mut state = self.state.write().await;
        for preference in preferences {
            state
                .preferences
                .insert(preference_key(preference), preference.clone());
        }
        self.preference_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Real-time bus backed by a tokio broadcast channel.
pub struct BroadcastBus {
    tx: broadcast::Sender<RealtimeEvent>,
}

impl BroadcastBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to all events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RealtimeBus for BroadcastBus {
    fn publish(&self, event: RealtimeEvent) {
        let name = event.name();
        if self.tx.send(event).is_err() {
            debug!(event = name, "No realtime subscribers, event dropped");
        }
    }
}
