//! Quality gate notifications for Office/Teams incoming webhooks.
//!
//! When the analysis server finishes analyzing a project, the host calls
//! [`TeamsNotifier::on_analysis_finished`]. The notifier resolves the
//! project's webhook and policy, turns the quality gate into a message card
//! and posts it.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use teams_notify::{KeyFallbackCatalog, MapSettings, TeamsNotifier};
//!
//! # async fn run(analysis: teams_notify::ProjectAnalysis) -> Result<(), teams_notify::NotifyError> {
//! let settings = MapSettings::from_file("notifier.toml")?;
//! let notifier = TeamsNotifier::from_config(Arc::new(settings), Arc::new(KeyFallbackCatalog))?;
//!
//! let outcome = notifier.on_analysis_finished(&analysis).await;
//! println!("delivered: {}", outcome.delivered());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`ProjectConfigResolver`] maps a project key to its [`ProjectConfig`]
//! - [`message::build_payload`] translates the analysis into a [`Payload`]
//! - [`WebhookChannel`] delivers it; [`OfficeWebhookClient`] is the HTTP
//!   implementation
//! - [`TeamsNotifier`] applies the gating policy and never lets an error
//!   reach the host

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod analysis;
pub mod catalog;
pub mod channels;
pub mod error;
pub mod message;
pub mod payload;
pub mod project_config;
pub mod settings;

pub use analysis::{
    Branch, Condition, EvaluationStatus, GateStatus, Operator, Project, ProjectAnalysis,
    QualityGate,
};
pub use catalog::{KeyFallbackCatalog, MapCatalog, MetricCatalog};
pub use channels::teams::OfficeWebhookClient;
pub use channels::WebhookChannel;
pub use error::NotifyError;
pub use payload::{Fact, Payload};
pub use project_config::{
    ProjectConfig, ProjectConfigResolver, ProjectConfigs, ProjectMatcher, SubstringMatcher,
};
pub use settings::{Configuration, MapSettings, PluginSettings};

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::message::MessageContext;

/// Why a notification was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Notifications are switched off globally.
    Disabled,
    /// The project only wants failures and the gate passed.
    QualityGatePassed,
}

/// Result of handling one finished analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Skipped(SkipReason),
    Failed,
}

impl Outcome {
    /// Whether the webhook accepted the message.
    #[must_use]
    pub const fn delivered(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Handles finished analyses for the host.
///
/// Settings are read from the host's [`Configuration`] on every call, so
/// administrator changes apply without recreating the notifier.
pub struct TeamsNotifier {
    config: Arc<dyn Configuration>,
    catalog: Arc<dyn MetricCatalog>,
    channel: Arc<dyn WebhookChannel>,
    resolver: ProjectConfigResolver,
}

impl TeamsNotifier {
    /// Create a notifier with a specific delivery channel.
    #[must_use]
    pub fn new(
        config: Arc<dyn Configuration>,
        catalog: Arc<dyn MetricCatalog>,
        channel: Arc<dyn WebhookChannel>,
    ) -> Self {
        Self {
            config,
            catalog,
            channel,
            resolver: ProjectConfigResolver::new(),
        }
    }

    /// Create a notifier delivering through [`OfficeWebhookClient`].
    ///
    /// # Errors
    ///
    /// Returns an error when the configured proxy is invalid.
    pub fn from_config(
        config: Arc<dyn Configuration>,
        catalog: Arc<dyn MetricCatalog>,
    ) -> Result<Self, NotifyError> {
        let channel = OfficeWebhookClient::new(Arc::clone(&config))?;
        Ok(Self::new(config, catalog, Arc::new(channel)))
    }

    /// Replace the project resolver, e.g. to use another [`ProjectMatcher`].
    #[must_use]
    pub fn with_resolver(mut self, resolver: ProjectConfigResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Check that the project configuration can be loaded.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::ConfigCorruption`] for a group without a project key.
    pub fn validate(&self) -> Result<(), NotifyError> {
        let configs = self.resolver.refresh(self.config.as_ref())?;
        info!(count = configs.len(), "Project configuration is valid");
        Ok(())
    }

    /// Notify about a finished analysis.
    ///
    /// Errors are logged and reported as [`Outcome::Failed`]; they are never
    /// propagated to the caller.
    pub async fn on_analysis_finished(&self, analysis: &ProjectAnalysis) -> Outcome {
        let plugin = PluginSettings::from_config(self.config.as_ref());
        debug!(
            settings = %PluginSettings::describe(self.config.as_ref()),
            "Relevant notifier settings"
        );

        if !plugin.enabled {
            info!(
                project_key = %analysis.project.key,
                "Notifications disabled, skipping"
            );
            return Outcome::Skipped(SkipReason::Disabled);
        }

        match self.notify(analysis, &plugin).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    channel = self.channel.name(),
                    project_key = %analysis.project.key,
                    delivery_failure = e.is_delivery_failure(),
                    error = %e,
                    "Failed to send notification"
                );
                Outcome::Failed
            }
        }
    }

    async fn notify(
        &self,
        analysis: &ProjectAnalysis,
        plugin: &PluginSettings,
    ) -> Result<Outcome, NotifyError> {
        let project_key = &analysis.project.key;
        let project_config = self
            .resolver
            .resolve(self.config.as_ref(), project_key, &plugin.default_hook)?;

        if should_skip(&project_config, analysis) {
            info!(
                project_key = %project_key,
                "Project only reports failed quality gates, but the gate passed"
            );
            return Ok(Outcome::Skipped(SkipReason::QualityGatePassed));
        }

        let project_url = message::project_url(&plugin.server_url, analysis, plugin.include_branch);
        let payload = message::build_payload(&MessageContext {
            analysis,
            project_config: &project_config,
            project_url: &project_url,
            catalog: self.catalog.as_ref(),
            include_branch: plugin.include_branch,
        })?;

        self.channel
            .deliver(&project_config.webhook_url, &payload)
            .await?;

        info!(
            channel = self.channel.name(),
            project_key = %project_key,
            "Notification sent"
        );
        Ok(Outcome::Sent)
    }
}

fn should_skip(project_config: &ProjectConfig, analysis: &ProjectAnalysis) -> bool {
    project_config.failures_only
        && analysis
            .quality_gate
            .as_ref()
            .is_some_and(|gate| gate.status == GateStatus::Ok)
}
