//! Host configuration access.
//!
//! The host exposes a flat string-keyed property store. [`Configuration`]
//! is the read-only view this crate needs from it, and [`MapSettings`] is an
//! in-memory implementation that can also be loaded from a TOML document.
//!
//! Project specific settings use the host's grouped multi-value convention:
//!
//! ```text
//! ckss.projectconfig = org:,legacy
//! ckss.projectconfig.org:.project = org:
//! ckss.projectconfig.org:.projectHook = https://example.webhook.office.com/...
//! ckss.projectconfig.org:.notify = channel
//! ckss.projectconfig.org:.qg = true
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::NotifyError;

/// Property keys read from the host configuration.
pub mod keys {
    /// Default incoming webhook URL.
    pub const HOOK: &str = "ckss.hook";
    /// Icon shown next to messages.
    pub const ICON_URL: &str = "ckss.icon";
    /// Global on/off switch.
    pub const ENABLED: &str = "ckss.enabled";
    pub const PROXY_IP: &str = "ckss.proxy_ip";
    pub const PROXY_PORT: &str = "ckss.proxy_port";
    pub const PROXY_PROTOCOL: &str = "ckss.proxy_protocol";
    /// Append the analyzed branch to the message.
    pub const INCLUDE_BRANCH: &str = "ckss.include_branch";
    /// Ordered list of project configuration group ids.
    pub const PROJECT_CONFIG: &str = "ckss.projectconfig";
    /// Public URL of the analysis server.
    pub const SERVER_BASE_URL: &str = "sonar.core.serverBaseURL";

    // Per-group fields, relative to `ckss.projectconfig.<id>.`
    pub const PROJECT_HOOK: &str = "projectHook";
    pub const PROJECT_PATTERN: &str = "project";
    pub const CHANNEL: &str = "channel";
    pub const NOTIFY: &str = "notify";
    pub const QG_FAIL_ONLY: &str = "qg";

    /// Full key of a field inside a project configuration group.
    #[must_use]
    pub fn group_field(group_id: &str, field: &str) -> String {
        format!("{PROJECT_CONFIG}.{group_id}.{field}")
    }
}

const DEFAULT_PROXY_PORT: u16 = 8080;
const DEFAULT_SERVER_URL: &str = "http://pleaseDefineSonarQubeUrl/";

/// Read-only view of the host's key/value settings.
pub trait Configuration: Send + Sync {
    /// Raw value for `key`, if set.
    fn get_string(&self, key: &str) -> Option<String>;

    /// Boolean value; anything other than `true` (any case) is `false`.
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get_string(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Integer value; unparsable values read as unset.
    fn get_int(&self, key: &str) -> Option<i64> {
        self.get_string(key).and_then(|v| v.trim().parse().ok())
    }

    /// Comma separated values, trimmed, with `%2C` decoded to `,`.
    fn get_string_array(&self, key: &str) -> Vec<String> {
        self.get_string(key)
            .map(|raw| {
                raw.split(',')
                    .map(|item| item.trim().replace("%2C", ","))
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-memory settings store.
#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    values: HashMap<String, String>,
}

impl MapSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Remove a property.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Chaining variant of [`MapSettings::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Parse a TOML document into flat properties.
    ///
    /// Nested tables flatten into dotted keys, so `[ckss] hook = "..."` and
    /// `"ckss.hook" = "..."` are equivalent. Arrays become comma separated
    /// lists the way [`Configuration::get_string_array`] reads them.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Settings`] when `content` is not valid TOML.
    pub fn from_toml_str(content: &str) -> Result<Self, NotifyError> {
        let table = toml::Table::from_str(content)?;
        let mut values = HashMap::new();
        for (key, value) in &table {
            flatten_into(key, value, &mut values);
        }
        debug!(count = values.len(), "Loaded settings from TOML");
        Ok(Self { values })
    }

    /// Load a TOML settings file.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Io`] when the file cannot be read and
    /// [`NotifyError::Settings`] when it is not valid TOML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NotifyError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }
}

impl Configuration for MapSettings {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSettings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn flatten_into(key: &str, value: &toml::Value, out: &mut HashMap<String, String>) {
    match value {
        toml::Value::Table(table) => {
            for (child, nested) in table {
                flatten_into(&format!("{key}.{child}"), nested, out);
            }
        }
        toml::Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| scalar_to_string(item).replace(',', "%2C"))
                .collect::<Vec<_>>()
                .join(",");
            out.insert(key.to_string(), joined);
        }
        scalar => {
            out.insert(key.to_string(), scalar_to_string(scalar));
        }
    }
}

fn scalar_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Proxy kind configured for outgoing webhook calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyProtocol {
    Direct,
    Http,
    Socks,
}

impl FromStr for ProxyProtocol {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DIRECT" => Ok(Self::Direct),
            "HTTP" => Ok(Self::Http),
            "SOCKS" => Ok(Self::Socks),
            other => Err(NotifyError::NotConfigured(format!(
                "{}: unsupported proxy protocol '{other}'",
                keys::PROXY_PROTOCOL
            ))),
        }
    }
}

impl fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Direct => "DIRECT",
            Self::Http => "HTTP",
            Self::Socks => "SOCKS",
        })
    }
}

/// Proxy endpoint, present only when traffic must go through one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub protocol: ProxyProtocol,
    pub host: String,
    pub port: u16,
}

impl ProxySettings {
    /// Read the proxy settings. `DIRECT` or an empty host means no proxy.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::NotConfigured`] for an unknown protocol or a
    /// port outside the TCP range.
    pub fn from_config(config: &dyn Configuration) -> Result<Option<Self>, NotifyError> {
        let protocol = config
            .get_string(keys::PROXY_PROTOCOL)
            .filter(|p| !p.trim().is_empty())
            .map_or(Ok(ProxyProtocol::Http), |p| p.parse())?;

        let host = config
            .get_string(keys::PROXY_IP)
            .map(|h| h.trim().to_string())
            .unwrap_or_default();

        if protocol == ProxyProtocol::Direct || host.is_empty() {
            return Ok(None);
        }

        let port = match config.get_int(keys::PROXY_PORT) {
            None => DEFAULT_PROXY_PORT,
            Some(raw) => u16::try_from(raw).map_err(|_| {
                NotifyError::NotConfigured(format!(
                    "{}: port {raw} is out of range",
                    keys::PROXY_PORT
                ))
            })?,
        };

        Ok(Some(Self {
            protocol,
            host,
            port,
        }))
    }

    /// Proxy URL understood by the HTTP client.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = match self.protocol {
            ProxyProtocol::Socks => "socks5",
            ProxyProtocol::Http | ProxyProtocol::Direct => "http",
        };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Plugin-wide settings, read fresh for each notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSettings {
    pub enabled: bool,
    pub default_hook: String,
    pub include_branch: bool,
    pub server_url: String,
}

impl PluginSettings {
    #[must_use]
    pub fn from_config(config: &dyn Configuration) -> Self {
        Self {
            enabled: config.get_bool(keys::ENABLED).unwrap_or(false),
            default_hook: config.get_string(keys::HOOK).unwrap_or_default(),
            include_branch: config.get_bool(keys::INCLUDE_BRANCH).unwrap_or(false),
            server_url: server_url(config),
        }
    }

    /// Settings worth logging when diagnosing a notification run.
    #[must_use]
    pub fn describe(config: &dyn Configuration) -> String {
        [
            keys::HOOK,
            keys::ICON_URL,
            keys::PROXY_IP,
            keys::PROXY_PORT,
            keys::PROXY_PROTOCOL,
            keys::ENABLED,
            keys::PROJECT_CONFIG,
            keys::INCLUDE_BRANCH,
        ]
        .iter()
        .map(|key| format!("{key}={}", config.get_string(key).unwrap_or_default()))
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Server base URL, always ending in `/`.
fn server_url(config: &dyn Configuration) -> String {
    match config.get_string(keys::SERVER_BASE_URL) {
        None => DEFAULT_SERVER_URL.to_string(),
        Some(url) if url.ends_with('/') => url,
        Some(url) => format!("{url}/"),
    }
}
