//! Per-project notification settings.
//!
//! Administrators configure groups of `{project, projectHook, notify, qg}`
//! fields. Each notification rebuilds the full set of groups from the
//! current settings and picks the one whose pattern matches the analyzed
//! project key, falling back to a record built from the global hook.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::error::NotifyError;
use crate::settings::{keys, Configuration};

/// Notification settings that apply to one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectConfig {
    /// Webhook for this project; empty means the global default hook.
    pub webhook_url: String,
    /// Key or pattern this record was configured for.
    pub project_key_or_pattern: String,
    /// Text inserted as an `@mention` before the message; empty for none.
    pub mention: String,
    /// Only report degraded or failed conditions.
    pub failures_only: bool,
}

impl ProjectConfig {
    /// Record used when no configured group matches.
    #[must_use]
    pub fn fallback(project_key: &str, default_hook: &str) -> Self {
        Self {
            webhook_url: default_hook.to_string(),
            project_key_or_pattern: project_key.to_string(),
            mention: String::new(),
            failures_only: false,
        }
    }

    fn from_group(config: &dyn Configuration, group_id: &str) -> Result<Self, NotifyError> {
        let field = |name: &str| config.get_string(&keys::group_field(group_id, name));

        let pattern = field(keys::PROJECT_PATTERN)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                NotifyError::ConfigCorruption(format!(
                    "project configuration '{group_id}' has no project key. Contact your \
                     administrator to update this configuration in the global administration \
                     section."
                ))
            })?;

        Ok(Self {
            webhook_url: field(keys::PROJECT_HOOK)
                .or_else(|| field(keys::CHANNEL))
                .unwrap_or_default(),
            project_key_or_pattern: pattern,
            mention: field(keys::NOTIFY).unwrap_or_default(),
            failures_only: config
                .get_bool(&keys::group_field(group_id, keys::QG_FAIL_ONLY))
                .unwrap_or(true),
        })
    }
}

/// Decides whether a configured pattern applies to a project key.
pub trait ProjectMatcher: Send + Sync {
    fn matches(&self, pattern: &str, project_key: &str) -> bool;
}

/// Plain substring containment: `org:` matches `org:app`.
///
/// Patterns are not regular expressions and are not anchored.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl ProjectMatcher for SubstringMatcher {
    fn matches(&self, pattern: &str, project_key: &str) -> bool {
        project_key.contains(pattern)
    }
}

/// Snapshot of all configured project groups, keyed by pattern.
///
/// Entries keep the order of the group list; a pattern configured twice
/// keeps its first position and its last values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectConfigs {
    entries: Vec<ProjectConfig>,
}

impl ProjectConfigs {
    /// Build the snapshot from the current settings.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::ConfigCorruption`] if any group lacks its
    /// project key. No partial snapshot is returned.
    pub fn load(config: &dyn Configuration) -> Result<Self, NotifyError> {
        let group_ids = config.get_string_array(keys::PROJECT_CONFIG);
        debug!(groups = ?group_ids, "Reading project configurations");

        let mut entries: Vec<ProjectConfig> = Vec::with_capacity(group_ids.len());
        for group_id in &group_ids {
            let record = ProjectConfig::from_group(config, group_id)?;
            info!(config = ?record, "Found project configuration");

            match entries
                .iter_mut()
                .find(|e| e.project_key_or_pattern == record.project_key_or_pattern)
            {
                Some(existing) => *existing = record,
                None => entries.push(record),
            }
        }

        Ok(Self { entries })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectConfig> {
        self.entries.iter()
    }

    /// All records whose pattern matches `project_key`, in configuration order.
    #[must_use]
    pub fn matching(&self, project_key: &str, matcher: &dyn ProjectMatcher) -> Vec<&ProjectConfig> {
        self.entries
            .iter()
            .filter(|c| matcher.matches(&c.project_key_or_pattern, project_key))
            .collect()
    }

    /// Pick the record for `project_key`, or build the fallback record.
    #[must_use]
    pub fn select(
        &self,
        project_key: &str,
        default_hook: &str,
        matcher: &dyn ProjectMatcher,
    ) -> ProjectConfig {
        let matches = self.matching(project_key, matcher);
        match matches.as_slice() {
            [] => {
                info!(
                    project_key = %project_key,
                    configs = %self,
                    "No project configuration matched, using the default"
                );
                ProjectConfig::fallback(project_key, default_hook)
            }
            [only] => (*only).clone(),
            [first, ..] => {
                warn!(
                    project_key = %project_key,
                    matched = matches.len(),
                    using = %first.project_key_or_pattern,
                    "More than one project configuration matched, using the first"
                );
                (*first).clone()
            }
        }
    }

    fn as_set(&self) -> BTreeSet<&ProjectConfig> {
        self.entries.iter().collect()
    }
}

impl fmt::Display for ProjectConfigs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, c) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{}(hook={}, mention={}, failures_only={})",
                c.project_key_or_pattern, c.webhook_url, c.mention, c.failures_only
            )?;
        }
        f.write_str("]")
    }
}

/// Resolves the [`ProjectConfig`] for an analyzed project.
///
/// Settings are re-read on every call. The previous snapshot is kept only to
/// log configuration changes between runs.
pub struct ProjectConfigResolver {
    matcher: Box<dyn ProjectMatcher>,
    previous: Mutex<ProjectConfigs>,
}

impl ProjectConfigResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::with_matcher(SubstringMatcher)
    }

    #[must_use]
    pub fn with_matcher(matcher: impl ProjectMatcher + 'static) -> Self {
        Self {
            matcher: Box::new(matcher),
            previous: Mutex::new(ProjectConfigs::default()),
        }
    }

    /// Rebuild the snapshot from `config` and log what changed since the last run.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::ConfigCorruption`] if any group lacks its
    /// project key. The previous snapshot is kept in that case.
    pub fn refresh(&self, config: &dyn Configuration) -> Result<ProjectConfigs, NotifyError> {
        let current = ProjectConfigs::load(config)?;

        let mut previous = self.previous.lock().unwrap_or_else(PoisonError::into_inner);
        if previous.as_set() != current.as_set() {
            let old: &ProjectConfigs = &previous;
            info!(old = %old, new = %current, "Project configurations changed");
        }
        *previous = current.clone();

        Ok(current)
    }

    /// Resolve the configuration that applies to `project_key`. Unmatched
    /// keys get a record pointing at `default_hook`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::ConfigCorruption`] when the configured groups
    /// cannot be loaded.
    pub fn resolve(
        &self,
        config: &dyn Configuration,
        project_key: &str,
        default_hook: &str,
    ) -> Result<ProjectConfig, NotifyError> {
        let configs = self.refresh(config)?;
        Ok(configs.select(project_key, default_hook, self.matcher.as_ref()))
    }
}

impl Default for ProjectConfigResolver {
    fn default() -> Self {
        Self::new()
    }
}
