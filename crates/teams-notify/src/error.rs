//! Error types for the notification system.

use thiserror::Error;

/// Errors that can occur while resolving, building or delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A project configuration group is unusable
    #[error("Teams notifier configuration is corrupted: {0}")]
    ConfigCorruption(String),

    /// A required message input is missing or empty
    #[error("[Assertion failed] - {0} argument is required; it must not be empty")]
    InvalidArgument(String),

    /// A required setting is not configured
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// HTTP request failed before a response was received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The webhook answered with a non-success status
    #[error("Webhook returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Settings document could not be parsed
    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),

    /// Settings file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NotifyError {
    /// Whether this error means the webhook call itself failed.
    #[must_use]
    pub const fn is_delivery_failure(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Rejected { .. })
    }
}
