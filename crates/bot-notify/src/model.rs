//! Records exchanged with the backing stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Preference category controlling which direct channels a client shows.
pub const PREFERENCE_CATEGORY_DIRECT_CHANNEL_SHOW: &str = "direct_channel_show";

/// Preference value meaning "show this direct channel".
pub const PREFERENCE_VALUE_SHOWN: &str = "true";

/// Generate a new record identifier.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub nickname: String,
    /// Initial credential; only ever sent to the store on creation
    #[serde(skip_serializing, default)]
    pub password: String,
    pub create_at: DateTime<Utc>,
}

impl User {
    /// Build a new, not yet persisted, user record.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        nickname: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            username: username.into(),
            email: email.into(),
            nickname: nickname.into(),
            password: password.into(),
            create_at: Utc::now(),
        }
    }
}

/// Kind of channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "D")]
    Direct,
}

/// A conversation channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub channel_type: ChannelType,
    pub create_at: DateTime<Utc>,
}

impl Channel {
    /// Build a new open channel record.
    pub fn open(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            display_name: display_name.into(),
            channel_type: ChannelType::Open,
            create_at: Utc::now(),
        }
    }

    /// Build a new direct channel record for the pair `a`, `b`.
    #[must_use]
    pub fn direct(a: &str, b: &str) -> Self {
        Self {
            id: new_id(),
            name: direct_channel_name(a, b),
            display_name: String::new(),
            channel_type: ChannelType::Direct,
            create_at: Utc::now(),
        }
    }
}

/// Canonical name of the direct channel between two users.
///
/// The name does not depend on argument order.
#[must_use]
pub fn direct_channel_name(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}__{b}")
    } else {
        format!("{b}__{a}")
    }
}

/// Membership of a user in a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMember {
    pub channel_id: String,
    pub user_id: String,
}

/// Message classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostType {
    /// A regular message
    #[default]
    #[serde(rename = "")]
    Default,
}

/// A message posted into a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub channel_id: String,
    /// Sender
    pub user_id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub create_at: DateTime<Utc>,
}

impl Post {
    /// Build a default-typed post from `user_id` into `channel_id`.
    pub fn new(
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            message: message.into(),
            post_type: PostType::Default,
            create_at: Utc::now(),
        }
    }
}

/// A per-user client preference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    pub user_id: String,
    pub category: String,
    pub name: String,
    pub value: String,
}

impl Preference {
    /// Preference showing the direct channel with `other_user_id` to `user_id`.
    pub fn direct_channel_shown(
        user_id: impl Into<String>,
        other_user_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            category: PREFERENCE_CATEGORY_DIRECT_CHANNEL_SHOW.to_string(),
            name: other_user_id.into(),
            value: PREFERENCE_VALUE_SHOWN.to_string(),
        }
    }

    /// Whether the preference value means "shown".
    #[must_use]
    pub fn is_shown(&self) -> bool {
        self.value == PREFERENCE_VALUE_SHOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_channel_name_is_order_independent() {
        assert_eq!(direct_channel_name("bot", "alice"), "alice__bot");
        assert_eq!(direct_channel_name("alice", "bot"), "alice__bot");
        assert_eq!(
            Channel::direct("x", "y").name,
            Channel::direct("y", "x").name
        );
    }

    #[test]
    fn test_post_defaults() {
        let post = Post::new("c1", "bot", "hello");
        assert_eq!(post.post_type, PostType::Default);
        assert_eq!(post.id.len(), 32);

        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["type"], "");
        assert_eq!(json["user_id"], "bot");
    }

    #[test]
    fn test_password_is_not_serialized() {
        let user = User::new("systembot", "bot@localhost", "systembot", "secret");
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("systembot"));
    }

    #[test]
    fn test_preference_shown() {
        let pref = Preference::direct_channel_shown("u1", "bot");
        assert!(pref.is_shown());
        assert_eq!(pref.category, PREFERENCE_CATEGORY_DIRECT_CHANNEL_SHOW);

        let hidden = Preference {
            value: "false".to_string(),
            ..pref
        };
        assert!(!hidden.is_shown());
    }
}
