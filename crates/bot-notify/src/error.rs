//! Error types for the notification pipeline.
//!
//! Every collaborator call fails with a [`StoreError`]. Each pipeline stage
//! wraps it in its own error so logs say which stage dropped a notification.

use thiserror::Error;

/// Errors reported by the backing stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A record with the same unique key already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Build a `NotFound` error for the given entity and key.
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Whether this error means the record is absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error means the record already exists.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Bot account lookup or creation failed.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Creating the account failed
    #[error("Failed to create bot account '{username}': {source}")]
    Create {
        username: String,
        #[source]
        source: StoreError,
    },

    /// The account existed after a conflicting create but could not be read
    #[error("Bot account '{username}' could not be read back after a conflicting create: {source}")]
    Lookup {
        username: String,
        #[source]
        source: StoreError,
    },
}

/// Direct channel lookup or creation failed.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Looking up the channel by canonical name failed
    #[error("Failed to look up direct channel '{name}': {source}")]
    Lookup {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Creating the channel failed
    #[error("Failed to create direct channel '{name}': {source}")]
    Create {
        name: String,
        #[source]
        source: StoreError,
    },
}

/// Post persistence failed.
#[derive(Debug, Error)]
#[error("Failed to persist post in channel {channel_id}: {source}")]
pub struct DeliveryError {
    /// Channel the post was meant for
    pub channel_id: String,
    #[source]
    pub source: StoreError,
}

/// A notification could not be delivered.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The direct channel could not be resolved
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The post could not be persisted
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Preference read or write failed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading the current preference failed
    #[error("Failed to read visibility preference: {0}")]
    Read(#[source] StoreError),

    /// Saving the updated preference failed
    #[error("Failed to save visibility preference: {0}")]
    Write(#[source] StoreError),
}
