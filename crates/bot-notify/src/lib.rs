//! Bot-account notifications for a team chat server.
//!
//! The server owns a synthetic "bot" user that sends system-generated
//! direct messages, for example when someone is removed from a channel or a
//! channel is archived. Delivery is fire-and-forget: callers never wait for
//! a notification and never see its errors, which are logged instead.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use bot_notify::{Backends, BotConfig, BotNotifier, BroadcastBus, MemoryBackend};
//!
//! # async fn run() {
//! let store = Arc::new(MemoryBackend::new());
//! let backends = Backends::in_memory(&store, Arc::new(BroadcastBus::default()));
//!
//! let notifier = BotNotifier::start(backends, BotConfig::from_env());
//! notifier.provision().await;
//!
//! // Returns immediately
//! notifier.notify("user-id", "Your export is ready.");
//!
//! // Finish outstanding work on shutdown
//! notifier.shutdown().await;
//! # }
//! ```
//!
//! # Configuration
//!
//! See [`BotConfig`] for the environment variables that are read:
//!
//! - `BOT_USERNAME`, `BOT_EMAIL`, `BOT_NICKNAME`, `BOT_PASSWORD`: bot account
//! - `NOTIFY_DISABLED`: set to "true" to disable all notifications
//! - `NOTIFY_QUEUE_CAPACITY`, `NOTIFY_MAX_IN_FLIGHT`: worker limits
//!
//! # Architecture
//!
//! - [`BotAccountProvisioner`] finds or creates the bot account once
//! - [`DirectChannelResolver`] finds or creates the bot's direct channel with a user
//! - [`NotificationDispatcher`] posts the message into that channel
//! - [`VisibilitySynchronizer`] makes sure the recipient's client shows the channel
//! - [`NotificationWorker`] runs deliveries and visibility updates as independent tasks
//! - [`BotNotifier`] ties them together for the host server

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod announcements;
pub mod backends;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod localize;
pub mod model;
pub mod provisioner;
pub mod resolver;
pub mod visibility;
pub mod worker;

pub use backends::{
    Backends, BroadcastBus, ChannelStore, Localizer, MemoryBackend, PostStore, PreferenceStore,
    RealtimeBus, UserDirectory,
};
pub use config::{BotAccountConfig, BotConfig};
pub use dispatcher::{Delivery, NotificationDispatcher, Skipped};
pub use error::{
    DeliveryError, DispatchError, ProvisionError, ResolutionError, StoreError, SyncError,
};
pub use events::RealtimeEvent;
pub use localize::TemplateLocalizer;
pub use model::{Channel, ChannelMember, ChannelType, Post, PostType, Preference, User};
pub use provisioner::BotAccountProvisioner;
pub use resolver::DirectChannelResolver;
pub use visibility::{VisibilityChange, VisibilitySynchronizer};
pub use worker::{Job, JobQueue, NotificationWorker};

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Entry point for the host server.
///
/// Owns the bot identity and the background worker. Every notification
/// method returns without waiting for delivery.
pub struct BotNotifier {
    provisioner: Arc<BotAccountProvisioner>,
    dispatcher: Arc<NotificationDispatcher>,
    users: Arc<dyn UserDirectory>,
    channels: Arc<dyn ChannelStore>,
    localizer: Arc<dyn Localizer>,
    queue: Option<JobQueue>,
    worker: Option<JoinHandle<()>>,
}

impl BotNotifier {
    /// Wire the pipeline and start its worker.
    ///
    /// Must be called from within a tokio runtime. With `config.disabled`
    /// no worker is started and every notification is skipped.
    #[must_use]
    pub fn start(backends: Backends, config: BotConfig) -> Self {
        let provisioner = Arc::new(BotAccountProvisioner::new(
            Arc::clone(&backends.users),
            config.account.clone(),
        ));

        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&provisioner),
            DirectChannelResolver::new(Arc::clone(&backends.channels)),
            Arc::clone(&backends.posts),
            Arc::clone(&backends.bus),
        ));

        let (queue, worker) = if config.disabled {
            info!("Notifications disabled via NOTIFY_DISABLED");
            (None, None)
        } else {
            let visibility = Arc::new(VisibilitySynchronizer::new(
                Arc::clone(&backends.preferences),
                Arc::clone(&backends.bus),
            ));
            let (worker, queue) = NotificationWorker::new(
                Arc::clone(&dispatcher),
                visibility,
                config.queue_capacity,
                config.max_in_flight,
            );
            info!(
                queue_capacity = config.queue_capacity,
                max_in_flight = config.max_in_flight,
                "Notification worker started"
            );
            (Some(queue), Some(worker.spawn()))
        };

        Self {
            provisioner,
            dispatcher,
            users: backends.users,
            channels: backends.channels,
            localizer: backends.localizer,
            queue,
            worker,
        }
    }

    /// Start with configuration read from the environment.
    #[must_use]
    pub fn from_env(backends: Backends) -> Self {
        Self::start(backends, BotConfig::from_env())
    }

    /// Whether notifications are being processed.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// The provisioned bot identity, if any.
    #[must_use]
    pub fn bot(&self) -> Option<Arc<User>> {
        self.provisioner.current()
    }

    /// Find or create the bot account.
    ///
    /// Failure is logged and leaves notifications disabled until a later
    /// call succeeds.
    pub async fn provision(&self) -> Option<Arc<User>> {
        match self.try_provision().await {
            Ok(bot) => Some(bot),
            Err(e) => {
                error!(
                    username = self.provisioner.username(),
                    error = %e,
                    "Bot account provisioning failed, notifications inactive"
                );
                None
            }
        }
    }

    /// Find or create the bot account, returning the error on failure.
    pub async fn try_provision(&self) -> Result<Arc<User>, ProvisionError> {
        self.provisioner.ensure_bot_account().await
    }

    /// Send `message` from the bot to `recipient_id` (fire-and-forget).
    ///
    /// Returns whether the notification was queued. Nothing is queued while
    /// no bot is provisioned or when `recipient_id` is the bot itself. A
    /// queued notification is sent as the bot identity current at this call,
    /// and can still be dropped later; that is only logged.
    pub fn notify(&self, recipient_id: impl Into<String>, message: impl Into<String>) -> bool {
        let Some(queue) = &self.queue else {
            debug!("Notifications disabled, skipping");
            return false;
        };

        let recipient_id = recipient_id.into();
        let Ok(bot) = self.dispatcher.sender_for(&recipient_id) else {
            return false;
        };

        queue.submit(Job::Deliver {
            bot_id: bot.id.clone(),
            recipient_id,
            message: message.into(),
        })
    }

    /// Stop accepting work and wait for queued and running jobs to finish.
    pub async fn shutdown(mut self) {
        self.queue.take();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "Notification worker ended abnormally");
            }
        }
    }
}
