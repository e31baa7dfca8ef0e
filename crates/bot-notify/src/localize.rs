//! Handlebars-backed message catalog.

use handlebars::Handlebars;
use serde_json::Value;
use tracing::warn;

use crate::backends::Localizer;

/// Message sent to a user removed from a channel.
///
/// Arguments: `channel` (display name), `actor` (username).
pub const MEMBER_REMOVED_KEY: &str = "notify.channel.member_removed";

/// Message sent to members of an archived channel.
///
/// Arguments: `actor` (username), `channel` (display name).
pub const CHANNEL_ARCHIVED_KEY: &str = "notify.channel.archived";

/// Built-in English catalog.
const DEFAULT_MESSAGES: &[(&str, &str)] = &[
    (
        MEMBER_REMOVED_KEY,
        "You have been removed from {{channel}} by {{actor}}.",
    ),
    (
        CHANNEL_ARCHIVED_KEY,
        "{{actor}} has archived the channel {{channel}}.",
    ),
];

/// [`Localizer`] rendering Handlebars templates keyed by message id.
///
/// Unknown keys and render failures yield the key itself.
pub struct TemplateLocalizer {
    registry: Handlebars<'static>,
}

impl TemplateLocalizer {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        // Plain text chat messages, not HTML
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }

    /// Create a catalog holding the built-in messages.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut localizer = Self::new();
        for (key, template) in DEFAULT_MESSAGES {
            if let Err(e) = localizer.register(key, template) {
                warn!(key, error = %e, "Invalid built-in message template");
            }
        }
        localizer
    }

    /// Add or replace the template for `key`.
    pub fn register(
        &mut self,
        key: &str,
        template: &str,
    ) -> Result<(), handlebars::TemplateError> {
        self.registry.register_template_string(key, template)
    }

    /// Whether a template exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.registry.has_template(key)
    }
}

impl Default for TemplateLocalizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Localizer for TemplateLocalizer {
    fn translate(&self, key: &str, args: &Value) -> String {
        match self.registry.render(key, args) {
            Ok(text) => text,
            Err(e) => {
                warn!(key, error = %e, "Failed to render message");
                key.to_string()
            }
        }
    }
}
