//! Office/Teams incoming webhook channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};

use crate::channels::WebhookChannel;
use crate::error::NotifyError;
use crate::payload::Payload;
use crate::settings::{keys, Configuration, ProxySettings};

/// Content type sent with the JSON body. Existing webhook consumers expect
/// this header, so it is kept even though the body is JSON.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for a whole request, including sending the body and reading
/// the response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts message cards to an Office/Teams incoming webhook.
pub struct OfficeWebhookClient {
    client: reqwest::Client,
    config: Arc<dyn Configuration>,
}

impl OfficeWebhookClient {
    /// Create a client using the proxy settings found in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error when the proxy settings are invalid or the HTTP
    /// client cannot be built.
    pub fn new(config: Arc<dyn Configuration>) -> Result<Self, NotifyError> {
        Self::with_timeouts(config, CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    /// Like [`OfficeWebhookClient::new`] with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error when the proxy settings are invalid or the HTTP
    /// client cannot be built.
    pub fn with_timeouts(
        config: Arc<dyn Configuration>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let proxy = ProxySettings::from_config(config.as_ref())?;
        let builder = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout);

        let builder = if let Some(proxy) = proxy {
            info!(
                protocol = %proxy.protocol,
                host = %proxy.host,
                port = proxy.port,
                "Routing webhook calls through proxy"
            );
            builder.proxy(reqwest::Proxy::all(proxy.url())?)
        } else {
            debug!("No proxy configured for webhook calls");
            builder.no_proxy()
        };

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// The project hook if set, otherwise the global default hook.
    fn target_url(&self, project_hook: &str) -> Result<String, NotifyError> {
        if !project_hook.trim().is_empty() {
            return Ok(project_hook.to_string());
        }
        self.config
            .get_string(keys::HOOK)
            .filter(|hook| !hook.trim().is_empty())
            .ok_or_else(|| NotifyError::NotConfigured(keys::HOOK.to_string()))
    }
}

#[async_trait]
impl WebhookChannel for OfficeWebhookClient {
    fn name(&self) -> &'static str {
        "teams"
    }

    async fn deliver(&self, webhook_url: &str, payload: &Payload) -> Result<(), NotifyError> {
        let url = self.target_url(webhook_url)?;
        let body = serde_json::to_string(payload)?;

        info!(channel = "teams", uri = %url, payload = %body, "Sending webhook request");
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(
                channel = "teams",
                payload = %serde_json::to_string_pretty(payload)?,
                "Formatted payload"
            );
        }

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, FORM_URLENCODED)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        info!(channel = "teams", status = %status, "Webhook HTTP response status");
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            info!(channel = "teams", body = %body, "Webhook HTTP response body");
            Ok(())
        } else {
            warn!(
                channel = "teams",
                status = %status,
                body = %body,
                "Webhook request failed"
            );
            Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}
