//! Channel event announcements sent by the bot.

use serde_json::json;
use tracing::{debug, warn};

use crate::localize::{CHANNEL_ARCHIVED_KEY, MEMBER_REMOVED_KEY};
use crate::model::Channel;
use crate::BotNotifier;

impl BotNotifier {
    /// Tell `removed_user_id` that `actor_id` removed them from `channel`.
    ///
    /// Returns the number of notifications queued (0 or 1).
    pub async fn member_removed(
        &self,
        removed_user_id: &str,
        actor_id: &str,
        channel: &Channel,
    ) -> usize {
        if self.bot().is_none() {
            debug!(channel_id = %channel.id, "No bot account, skipping removal notice");
            return 0;
        }

        let actor = match self.users.get(actor_id).await {
            Ok(actor) => actor,
            Err(e) => {
                warn!(actor_id, error = %e, "Failed to look up removing user");
                return 0;
            }
        };

        let message = self.localizer.translate(
            MEMBER_REMOVED_KEY,
            &json!({ "channel": channel.display_name, "actor": actor.username }),
        );
        usize::from(self.notify(removed_user_id, message))
    }

    /// Tell every member of `channel` except `archiver_id` that it was archived.
    ///
    /// Each member gets an independent notification. Returns how many were queued.
    pub async fn channel_archived(&self, channel: &Channel, archiver_id: &str) -> usize {
        if self.bot().is_none() {
            debug!(channel_id = %channel.id, "No bot account, skipping archive notice");
            return 0;
        }

        let archiver = match self.users.get(archiver_id).await {
            Ok(archiver) => archiver,
            Err(e) => {
                warn!(archiver_id, error = %e, "Failed to look up archiving user");
                return 0;
            }
        };

        let members = match self.channels.get_members(&channel.id).await {
            Ok(members) => members,
            Err(e) => {
                warn!(channel_id = %channel.id, error = %e, "Failed to list channel members");
                return 0;
            }
        };

        let message = self.localizer.translate(
            CHANNEL_ARCHIVED_KEY,
            &json!({ "actor": archiver.username, "channel": channel.display_name }),
        );

        let mut queued = 0;
        for member in members.iter().filter(|m| m.user_id != archiver_id) {
            if self.notify(&member.user_id, message.clone()) {
                queued += 1;
            }
        }

        debug!(
            channel_id = %channel.id,
            queued,
            members = members.len(),
            "Queued archive notices"
        );
        queued
    }
}
