//! Settings schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Header written on top of documents that do not carry their own.
pub const DEFAULT_HEADER: &str =
    "This file is managed by live-config.\nEdits are picked up automatically while the host is running.";

/// Root settings for a configuration store.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreSettings {
    /// Where documents live and how they are written.
    pub documents: DocumentSettings,

    /// Live reload.
    pub watch: WatchSettings,

    pub logging: LoggingSettings,

    pub observability: ObservabilitySettings,

    /// Path templates bound to document kinds.
    pub bindings: Vec<BindingSettings>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Header comment for new documents. Empty disables the header.
    pub header: String,

    /// Relative document paths are resolved against this directory.
    pub base_dir: PathBuf,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            header: DEFAULT_HEADER.to_string(),
            base_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Start the OS watcher. When false documents load once.
    pub enabled: bool,

    /// Quiet period before a burst of change events triggers one reload.
    pub debounce_ms: u64,
}

impl WatchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// A path template bound to a document kind.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BindingSettings {
    /// `Document::KIND` of the bound type.
    pub kind: String,

    /// Path template, e.g. `configs/{lobby}/settings.yml`.
    pub path: String,
}
