//! Configuration for the notification bot.

use std::env;

/// Environment variable for the reserved bot username.
const ENV_BOT_USERNAME: &str = "BOT_USERNAME";
/// Environment variable for the bot's placeholder email.
const ENV_BOT_EMAIL: &str = "BOT_EMAIL";
/// Environment variable for the bot's nickname.
const ENV_BOT_NICKNAME: &str = "BOT_NICKNAME";
/// Environment variable for the bot's initial credential.
const ENV_BOT_PASSWORD: &str = "BOT_PASSWORD";
/// Environment variable to disable all notifications.
const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";
/// Environment variable for the job queue bound.
const ENV_NOTIFY_QUEUE_CAPACITY: &str = "NOTIFY_QUEUE_CAPACITY";
/// Environment variable for the number of concurrently running jobs.
const ENV_NOTIFY_MAX_IN_FLIGHT: &str = "NOTIFY_MAX_IN_FLIGHT";

pub const DEFAULT_BOT_USERNAME: &str = "systembot";
pub const DEFAULT_BOT_EMAIL: &str = "systembot@localhost";
pub const DEFAULT_BOT_PASSWORD: &str = "Password1";
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Attributes of the bot account created on first provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotAccountConfig {
    /// Reserved username, also used to find an existing account.
    pub username: String,
    pub email: String,
    pub nickname: String,
    /// Placeholder credential; the bot never logs in.
    pub password: String,
}

impl Default for BotAccountConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_BOT_USERNAME.to_string(),
            email: DEFAULT_BOT_EMAIL.to_string(),
            nickname: DEFAULT_BOT_USERNAME.to_string(),
            password: DEFAULT_BOT_PASSWORD.to_string(),
        }
    }
}

/// Notification pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub account: BotAccountConfig,
    /// Whether the whole pipeline is a no-op.
    pub disabled: bool,
    /// Maximum number of queued jobs before new ones are dropped.
    pub queue_capacity: usize,
    /// Maximum number of jobs running at the same time.
    pub max_in_flight: usize,
}

impl BotConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let username =
            non_empty(ENV_BOT_USERNAME).unwrap_or_else(|| DEFAULT_BOT_USERNAME.to_string());
        let account = BotAccountConfig {
            email: non_empty(ENV_BOT_EMAIL).unwrap_or_else(|| DEFAULT_BOT_EMAIL.to_string()),
            nickname: non_empty(ENV_BOT_NICKNAME).unwrap_or_else(|| username.clone()),
            password: non_empty(ENV_BOT_PASSWORD)
                .unwrap_or_else(|| DEFAULT_BOT_PASSWORD.to_string()),
            username,
        };

        Self {
            account,
            disabled: lookup(ENV_NOTIFY_DISABLED)
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            queue_capacity: non_empty(ENV_NOTIFY_QUEUE_CAPACITY)
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            max_in_flight: non_empty(ENV_NOTIFY_MAX_IN_FLIGHT)
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_IN_FLIGHT),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
