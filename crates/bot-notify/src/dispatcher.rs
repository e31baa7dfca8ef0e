//! Posting notification messages from the bot.

use std::sync::Arc;

use tracing::{debug, info};

use crate::backends::{PostStore, RealtimeBus};
use crate::error::{DeliveryError, DispatchError};
use crate::events::RealtimeEvent;
use crate::model::{Post, User};
use crate::provisioner::BotAccountProvisioner;
use crate::resolver::DirectChannelResolver;

/// Outcome of a single delivery attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// No bot identity is provisioned
    NoBot,
    /// The recipient is the bot itself
    ToSelf,
    /// The post was persisted
    Sent { bot_id: String, post: Post },
}

impl Delivery {
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Why a notification is not sent at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skipped {
    /// No bot identity is provisioned
    NoBot,
    /// The recipient is the bot itself
    ToSelf,
}

impl From<Skipped> for Delivery {
    fn from(skipped: Skipped) -> Self {
        match skipped {
            Skipped::NoBot => Self::NoBot,
            Skipped::ToSelf => Self::ToSelf,
        }
    }
}

/// Resolves the direct channel and persists the bot's post into it.
pub struct NotificationDispatcher {
    provisioner: Arc<BotAccountProvisioner>,
    resolver: DirectChannelResolver,
    posts: Arc<dyn PostStore>,
    bus: Arc<dyn RealtimeBus>,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(
        provisioner: Arc<BotAccountProvisioner>,
        resolver: DirectChannelResolver,
        posts: Arc<dyn PostStore>,
        bus: Arc<dyn RealtimeBus>,
    ) -> Self {
        Self {
            provisioner,
            resolver,
            posts,
            bus,
        }
    }

    /// Apply the short-circuits for a notification to `recipient_id`.
    ///
    /// Returns the bot identity to send as. A missing bot is reported before
    /// a self-addressed notification.
    pub fn sender_for(&self, recipient_id: &str) -> Result<Arc<User>, Skipped> {
        let Some(bot) = self.provisioner.current() else {
            debug!(recipient_id, "No bot account provisioned, skipping notification");
            return Err(Skipped::NoBot);
        };

        if recipient_id == bot.id {
            debug!(bot_id = %bot.id, "Refusing to notify the bot itself");
            return Err(Skipped::ToSelf);
        }

        Ok(bot)
    }

    /// Send `message` from the bot to `recipient_id` and wait for the result.
    ///
    /// Does not provision the bot: without an identity this returns
    /// [`Delivery::NoBot`]. Nothing is retried.
    pub async fn deliver(
        &self,
        recipient_id: &str,
        message: &str,
    ) -> Result<Delivery, DispatchError> {
        let bot = match self.sender_for(recipient_id) {
            Ok(bot) => bot,
            Err(skipped) => return Ok(skipped.into()),
        };

        let post = self.send_as(&bot.id, recipient_id, message).await?;
        Ok(Delivery::Sent {
            bot_id: bot.id.clone(),
            post,
        })
    }

    /// Post `message` as `bot_id` into its direct channel with `recipient_id`.
    ///
    /// The caller must have admitted the pair through
    /// [`sender_for`](Self::sender_for).
    pub async fn send_as(
        &self,
        bot_id: &str,
        recipient_id: &str,
        message: &str,
    ) -> Result<Post, DispatchError> {
        let channel = self.resolver.resolve_or_create(bot_id, recipient_id).await?;

        let post = Post::new(&channel.id, bot_id, message);
        let post = self
            .posts
            .create(post)
            .await
            .map_err(|source| DeliveryError {
                channel_id: channel.id.clone(),
                source,
            })?;

        info!(
            recipient_id,
            channel_id = %channel.id,
            post_id = %post.id,
            "Notification posted"
        );
        self.bus.publish(RealtimeEvent::posted(post.clone()));

        Ok(post)
    }
}
