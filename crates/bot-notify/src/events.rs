//! Real-time events published by the notification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Post, Preference};

/// Events handed to the real-time transport for connected clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// A post was created in a channel
    Posted {
        channel_id: String,
        post: Post,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },

    /// A user's preferences changed
    PreferencesChanged {
        user_id: String,
        preferences: Vec<Preference>,
        #[serde(default = "Utc::now")]
        timestamp: DateTime<Utc>,
    },
}

impl RealtimeEvent {
    /// Event for a newly created post.
    #[must_use]
    pub fn posted(post: Post) -> Self {
        Self::Posted {
            channel_id: post.channel_id.clone(),
            post,
            timestamp: Utc::now(),
        }
    }

    /// Event for a preference change of `user_id`.
    pub fn preferences_changed(user_id: impl Into<String>, preferences: Vec<Preference>) -> Self {
        Self::PreferencesChanged {
            user_id: user_id.into(),
            preferences,
            timestamp: Utc::now(),
        }
    }

    /// Short name of the event type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Posted { .. } => "posted",
            Self::PreferencesChanged { .. } => "preferences_changed",
        }
    }

    /// Get the timestamp for this event.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Posted { timestamp, .. } | Self::PreferencesChanged { timestamp, .. } => {
                *timestamp
            }
        }
    }
}
