//! Direct channel resolution.

use std::sync::Arc;

use tracing::debug;

use crate::backends::ChannelStore;
use crate::error::ResolutionError;
use crate::model::{direct_channel_name, Channel};

/// Finds or creates the one-to-one channel between two users.
pub struct DirectChannelResolver {
    channels: Arc<dyn ChannelStore>,
}

impl DirectChannelResolver {
    #[must_use]
    pub fn new(channels: Arc<dyn ChannelStore>) -> Self {
        Self { channels }
    }

    /// Return the direct channel between `user_a` and `user_b`, creating it if needed.
    ///
    /// Argument order does not matter.
    pub async fn resolve_or_create(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<Channel, ResolutionError> {
        let name = direct_channel_name(user_a, user_b);

        match self.channels.get_by_canonical_name(&name).await {
            Ok(channel) => return Ok(channel),
            Err(e) if e.is_not_found() => {}
            Err(source) => return Err(ResolutionError::Lookup { name, source }),
        }

        match self.channels.create_direct(user_a, user_b).await {
            Ok(channel) => {
                debug!(channel_id = %channel.id, %name, "Created direct channel");
                Ok(channel)
            }
            // Created concurrently by another caller
            Err(e) if e.is_conflict() => self
                .channels
                .get_by_canonical_name(&name)
                .await
                .map_err(|source| ResolutionError::Lookup { name, source }),
            Err(source) => Err(ResolutionError::Create { name, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{Fault, MemoryBackend};
    use crate::error::StoreError;
    use crate::model::{ChannelMember, ChannelType};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_creates_then_reuses_channel() {
        let backend = Arc::new(MemoryBackend::new());
        let bot = backend.add_user("systembot").await;
        let alice = backend.add_user("alice").await;
        let resolver = DirectChannelResolver::new(backend.clone());

        let first = resolver.resolve_or_create(&bot.id, &alice.id).await.unwrap();
        let second = resolver.resolve_or_create(&bot.id, &alice.id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.channel_type, ChannelType::Direct);
        assert_eq!(backend.channel_creates(), 1);
    }

    #[tokio::test]
    async fn test_resolution_is_symmetric() {
        let backend = Arc::new(MemoryBackend::new());
        let bot = backend.add_user("systembot").await;
        let alice = backend.add_user("alice").await;
        let resolver = DirectChannelResolver::new(backend.clone());

        let forward = resolver.resolve_or_create(&bot.id, &alice.id).await.unwrap();
        let reverse = resolver.resolve_or_create(&alice.id, &bot.id).await.unwrap();

        assert_eq!(forward.id, reverse.id);
        assert_eq!(backend.channels().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_recipient_fails() {
        let backend = Arc::new(MemoryBackend::new());
        let bot = backend.add_user("systembot").await;
        let resolver = DirectChannelResolver::new(backend.clone());

        let err = resolver.resolve_or_create(&bot.id, "nobody").await.unwrap_err();
        assert!(matches!(err, ResolutionError::Create { .. }));
        assert!(backend.channels().await.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_does_not_create() {
        let backend = Arc::new(MemoryBackend::new());
        let bot = backend.add_user("systembot").await;
        let alice = backend.add_user("alice").await;
        backend.set_fault(Fault::ChannelLookup, true);
        let resolver = DirectChannelResolver::new(backend.clone());

        let err = resolver.resolve_or_create(&bot.id, &alice.id).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Lookup { .. }));
        assert_eq!(backend.channel_creates(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_resolution_yields_one_channel() {
        let backend = Arc::new(MemoryBackend::new());
        let bot = backend.add_user("systembot").await;
        let alice = backend.add_user("alice").await;
        let resolver = Arc::new(DirectChannelResolver::new(backend.clone()));

        let mut handles = vec![];
        for i in 0..6 {
            let resolver = Arc::clone(&resolver);
            let (a, b) = if i % 2 == 0 {
                (bot.id.clone(), alice.id.clone())
            } else {
                (alice.id.clone(), bot.id.clone())
            };
            handles.push(tokio::spawn(async move {
                resolver.resolve_or_create(&a, &b).await.unwrap().id
            }));
        }

        let mut ids = vec![];
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(backend.channel_creates(), 1);
    }

    #[tokio::test]
    async fn test_create_failure_is_reported() {
        let backend = Arc::new(MemoryBackend::new());
        let bot = backend.add_user("systembot").await;
        let alice = backend.add_user("alice").await;
        backend.set_fault(Fault::ChannelCreate, true);
        let resolver = DirectChannelResolver::new(backend.clone());

        let err = resolver.resolve_or_create(&bot.id, &alice.id).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Create { .. }));
        assert!(backend.channels().await.is_empty());
    }

    /// Store where another caller creates the channel right after our lookup.
    struct RacingChannelStore {
        inner: MemoryBackend,
        pair: (String, String),
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl ChannelStore for RacingChannelStore {
        async fn get_by_canonical_name(&self, name: &str) -> Result<Channel, StoreError> {
            if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
                self.inner.create_direct(&self.pair.0, &self.pair.1).await?;
                return Err(StoreError::not_found("channel", name));
            }
            self.inner.get_by_canonical_name(name).await
        }

        async fn create_direct(&self, user_a: &str, user_b: &str) -> Result<Channel, StoreError> {
            self.inner.create_direct(user_a, user_b).await
        }

        async fn get_members(&self, channel_id: &str) -> Result<Vec<ChannelMember>, StoreError> {
            self.inner.get_members(channel_id).await
        }
    }

    #[tokio::test]
    async fn test_conflicting_create_adopts_existing_channel() {
        let inner = MemoryBackend::new();
        let bot = inner.add_user("systembot").await;
        let alice = inner.add_user("alice").await;
        let store = Arc::new(RacingChannelStore {
            inner,
            pair: (alice.id.clone(), bot.id.clone()),
            lookups: AtomicUsize::new(0),
        });
        let resolver = DirectChannelResolver::new(store.clone());

        let channel = resolver.resolve_or_create(&bot.id, &alice.id).await.unwrap();

        let stored = store.inner.channels().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(channel.id, stored[0].id);
        assert_eq!(store.inner.channel_creates(), 1);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 2);
    }
}
