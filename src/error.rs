//! Error types for the configuration store.

use std::path::PathBuf;
use thiserror::Error;

/// Position of a syntax error inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Errors produced while resolving, loading, saving or watching documents.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A path template could not be turned into a usable path.
    #[error("cannot resolve path template `{template}`: {reason}")]
    Resolution { template: String, reason: String },

    /// Document text is not valid YAML, or does not fit the target type.
    #[error("cannot parse {}{}: {message}", path.display(), location.map(|l| format!(" at {l}")).unwrap_or_default())]
    Parse {
        path: PathBuf,
        location: Option<Location>,
        message: String,
    },

    /// Metadata was missing, the document produced no usable value, or the
    /// target directory is invalid.
    #[error("cannot load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// A custom codec could not be built for a document type.
    #[error("codec `{codec}` for `{kind}` could not be registered: {reason}")]
    CodecRegistration {
        kind: String,
        codec: String,
        reason: String,
    },

    /// A typed value could not be turned into a document.
    #[error("cannot serialize {}: {message}", path.display())]
    Serialize { path: PathBuf, message: String },

    /// The OS watch for a path could not be set up.
    #[error("cannot watch {}: {reason}", path.display())]
    Watch { path: PathBuf, reason: String },

    /// The OS watcher itself could not be started or stopped working.
    #[error("live reload unavailable: {reason}")]
    WatchUnavailable { reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store's own settings file is unusable.
    #[error(transparent)]
    Settings(#[from] crate::settings::SettingsError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, location: Option<Location>, message: impl Into<String>) -> Self {
        StoreError::Parse {
            path: path.into(),
            location,
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
