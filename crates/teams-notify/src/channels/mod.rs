//! Webhook delivery channels.

pub mod teams;

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::payload::Payload;

/// Trait for webhook channels that deliver a built [`Payload`].
#[async_trait]
pub trait WebhookChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Post `payload` to `webhook_url`, or to the channel's default hook
    /// when `webhook_url` is empty. No retry is attempted.
    async fn deliver(&self, webhook_url: &str, payload: &Payload) -> Result<(), NotifyError>;
}
