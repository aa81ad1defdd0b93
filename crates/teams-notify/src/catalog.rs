//! Metric display names supplied by the host's localization bundle.

use std::collections::HashMap;

/// Locale used for every message lookup.
pub const MESSAGE_LOCALE: &str = "en";

/// Localization lookup provided by the host.
pub trait MetricCatalog: Send + Sync {
    /// Message for `key` in `locale`, or `fallback` when the bundle has none.
    fn message(&self, locale: &str, key: &str, fallback: &str) -> String;
}

/// Catalog without a bundle: every lookup yields its fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFallbackCatalog;

impl MetricCatalog for KeyFallbackCatalog {
    fn message(&self, _locale: &str, _key: &str, fallback: &str) -> String {
        fallback.to_string()
    }
}

/// Single-locale catalog backed by a map of message keys.
#[derive(Debug, Clone, Default)]
pub struct MapCatalog {
    messages: HashMap<String, String>,
}

impl MapCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the display name of a metric under `metric.<key>.name`.
    #[must_use]
    pub fn with_metric(mut self, metric_key: &str, name: impl Into<String>) -> Self {
        self.messages.insert(metric_name_key(metric_key), name.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapCatalog {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            messages: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl MetricCatalog for MapCatalog {
    fn message(&self, _locale: &str, key: &str, fallback: &str) -> String {
        self.messages
            .get(key)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Bundle key holding the display name of a metric.
#[must_use]
pub fn metric_name_key(metric_key: &str) -> String {
    format!("metric.{metric_key}.name")
}
