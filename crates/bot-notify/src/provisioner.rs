//! Bot account provisioning.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::backends::UserDirectory;
use crate::config::BotAccountConfig;
use crate::error::ProvisionError;
use crate::model::User;

/// Owns the bot identity used as the sender of every notification.
///
/// The identity is assigned at most once. Initialisation is serialized, so
/// concurrent first calls produce a single lookup-or-create sequence and the
/// others observe its result. A failed attempt leaves the identity unset until
/// the next call to [`ensure_bot_account`](Self::ensure_bot_account).
pub struct BotAccountProvisioner {
    users: Arc<dyn UserDirectory>,
    account: BotAccountConfig,
    identity: OnceCell<Arc<User>>,
}

impl BotAccountProvisioner {
    #[must_use]
    pub fn new(users: Arc<dyn UserDirectory>, account: BotAccountConfig) -> Self {
        Self {
            users,
            account,
            identity: OnceCell::new(),
        }
    }

    /// The provisioned bot identity, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<User>> {
        self.identity.get().cloned()
    }

    /// Reserved username of the bot account.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.account.username
    }

    /// Find the bot account or create it, caching the result.
    pub async fn ensure_bot_account(&self) -> Result<Arc<User>, ProvisionError> {
        self.identity
            .get_or_try_init(|| self.find_or_create())
            .await
            .cloned()
    }

    async fn find_or_create(&self) -> Result<Arc<User>, ProvisionError> {
        let username = self.account.username.as_str();

        match self.users.get_by_username(username).await {
            Ok(user) => {
                info!(bot_id = %user.id, username, "Using existing bot account");
                return Ok(Arc::new(user));
            }
            Err(e) if e.is_not_found() => {
                debug!(username, "No bot account yet, creating one");
            }
            Err(e) => {
                warn!(username, error = %e, "Bot account lookup failed, attempting create");
            }
        }

        let user = User::new(
            username,
            &self.account.email,
            &self.account.nickname,
            &self.account.password,
        );

        match self.users.create(user).await {
            Ok(user) => {
                info!(bot_id = %user.id, username, "Created bot account");
                Ok(Arc::new(user))
            }
            // Someone else created it between our lookup and create
            Err(e) if e.is_conflict() => {
                let user = self
                    .users
                    .get_by_username(username)
                    .await
                    .map_err(|source| ProvisionError::Lookup {
                        username: username.to_string(),
                        source,
                    })?;
                info!(bot_id = %user.id, username, "Adopted concurrently created bot account");
                Ok(Arc::new(user))
            }
            Err(source) => Err(ProvisionError::Create {
                username: username.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{Fault, MemoryBackend};
    use crate::error::StoreError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn provisioner(backend: &Arc<MemoryBackend>) -> BotAccountProvisioner {
        BotAccountProvisioner::new(backend.clone(), BotAccountConfig::default())
    }

    #[tokio::test]
    async fn test_existing_account_is_reused() {
        let backend = Arc::new(MemoryBackend::new());
        let existing = backend.add_user("systembot").await;
        let provisioner = provisioner(&backend);

        let first = provisioner.ensure_bot_account().await.unwrap();
        let second = provisioner.ensure_bot_account().await.unwrap();

        assert_eq!(first.id, existing.id);
        assert_eq!(second.id, existing.id);
        assert_eq!(backend.user_creates(), 0);
        assert_eq!(backend.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_missing_account_is_created_once() {
        let backend = Arc::new(MemoryBackend::new());
        let provisioner = provisioner(&backend);
        assert!(provisioner.current().is_none());

        let bot = provisioner.ensure_bot_account().await.unwrap();
        assert_eq!(bot.username, "systembot");
        assert_eq!(bot.email, "systembot@localhost");
        assert_eq!(provisioner.current().unwrap().id, bot.id);

        provisioner.ensure_bot_account().await.unwrap();
        assert_eq!(backend.user_creates(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_create_one_account() {
        let backend = Arc::new(MemoryBackend::new());
        let provisioner = Arc::new(provisioner(&backend));

        let mut handles = vec![];
        for _ in 0..8 {
            let provisioner = Arc::clone(&provisioner);
            handles.push(tokio::spawn(async move {
                provisioner.ensure_bot_account().await.unwrap().id.clone()
            }));
        }

        let mut ids = vec![];
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(backend.user_creates(), 1);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_identity_unset() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_fault(Fault::UserCreate, true);
        let provisioner = provisioner(&backend);

        let err = provisioner.ensure_bot_account().await.unwrap_err();
        assert!(matches!(err, ProvisionError::Create { .. }));
        assert!(provisioner.current().is_none());

        backend.set_fault(Fault::UserCreate, false);
        let bot = provisioner.ensure_bot_account().await.unwrap();
        assert_eq!(provisioner.current().unwrap().id, bot.id);
    }

    /// Directory where another process creates the account right after our lookup.
    struct RacingDirectory {
        inner: MemoryBackend,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl UserDirectory for RacingDirectory {
        async fn get_by_username(&self, username: &str) -> Result<User, StoreError> {
            if self.lookups.fetch_add(1, Ordering::SeqCst) == 0 {
                self.inner.add_user(username).await;
                return Err(StoreError::not_found("user", username));
            }
            self.inner.get_by_username(username).await
        }

        async fn get(&self, user_id: &str) -> Result<User, StoreError> {
            UserDirectory::get(&self.inner, user_id).await
        }

        async fn create(&self, user: User) -> Result<User, StoreError> {
            UserDirectory::create(&self.inner, user).await
        }
    }

    #[tokio::test]
    async fn test_conflicting_create_adopts_winner() {
        let directory = Arc::new(RacingDirectory {
            inner: MemoryBackend::new(),
            lookups: AtomicUsize::new(0),
        });
        let provisioner =
            BotAccountProvisioner::new(directory.clone(), BotAccountConfig::default());

        let bot = provisioner.ensure_bot_account().await.unwrap();
        let stored = directory.inner.get_by_username("systembot").await.unwrap();
        assert_eq!(bot.id, stored.id);
        assert_eq!(directory.inner.user_count().await, 1);
    }
}
