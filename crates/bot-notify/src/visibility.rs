//! Keeps the bot's direct channel visible in the recipient's client.

use std::sync::Arc;

use tracing::debug;

use crate::backends::{PreferenceStore, RealtimeBus};
use crate::error::SyncError;
use crate::events::RealtimeEvent;
use crate::model::{Preference, PREFERENCE_CATEGORY_DIRECT_CHANNEL_SHOW, PREFERENCE_VALUE_SHOWN};

/// What [`VisibilitySynchronizer::ensure_visible`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityChange {
    /// No preference existed; a "shown" one was created
    Created,
    /// A hidden preference was switched to "shown"
    Updated,
    /// The channel was already shown; nothing was written
    Unchanged,
}

/// Sets the "show direct channel" preference and tells connected clients.
///
/// Only ever moves a preference towards "shown".
pub struct VisibilitySynchronizer {
    preferences: Arc<dyn PreferenceStore>,
    bus: Arc<dyn RealtimeBus>,
}

impl VisibilitySynchronizer {
    #[must_use]
    pub fn new(preferences: Arc<dyn PreferenceStore>, bus: Arc<dyn RealtimeBus>) -> Self {
        Self { preferences, bus }
    }

    /// Make sure `recipient_id` sees the direct channel with `bot_id`.
    pub async fn ensure_visible(
        &self,
        recipient_id: &str,
        bot_id: &str,
    ) -> Result<VisibilityChange, SyncError> {
        let existing = match self
            .preferences
            .get(recipient_id, PREFERENCE_CATEGORY_DIRECT_CHANNEL_SHOW, bot_id)
            .await
        {
            Ok(preference) => Some(preference),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(SyncError::Read(e)),
        };

        let (preference, change) = match existing {
            None => (
                Preference::direct_channel_shown(recipient_id, bot_id),
                VisibilityChange::Created,
            ),
            Some(preference) if preference.is_shown() => {
                debug!(recipient_id, bot_id, "Direct channel already visible");
                return Ok(VisibilityChange::Unchanged);
            }
            Some(preference) => (
                Preference {
                    value: PREFERENCE_VALUE_SHOWN.to_string(),
                    ..preference
                },
                VisibilityChange::Updated,
            ),
        };

        let changed = vec![preference];
        self.preferences.save(&changed).await.map_err(SyncError::Write)?;

        self.bus.publish(RealtimeEvent::preferences_changed(recipient_id, changed));
        debug!(recipient_id, bot_id, ?change, "Direct channel made visible");

        Ok(change)
    }
}
