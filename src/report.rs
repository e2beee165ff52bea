//! Reporting channel for failures that must not reach host code.
//!
//! Reload errors, codec build errors and watch errors are logged, counted and
//! broadcast to any subscriber. Nothing here ever returns an error or panics.

use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::observability::metrics;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Re-reading a watched file failed; the previous value was kept.
    Reload,
    /// A custom codec could not be built; built-in handling is used instead.
    CodecRegistration,
    /// A path could not be watched; it is loaded once without live reload.
    Watch,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Reload => "reload",
            FailureKind::CodecRegistration => "codec_registration",
            FailureKind::Watch => "watch",
        }
    }
}

/// A swallowed failure.
#[derive(Debug, Clone)]
pub struct Failure {
    pub kind: FailureKind,
    pub path: Option<PathBuf>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ErrorReporter {
    tx: broadcast::Sender<Failure>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Receive every failure reported from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Failure> {
        self.tx.subscribe()
    }

    pub fn report(&self, kind: FailureKind, path: Option<&Path>, error: &StoreError) {
        tracing::warn!(kind = kind.as_str(), path = ?path, error = %error, "Configuration failure");
        metrics::record_failure(kind);

        // No subscribers is fine.
        let _ = self.tx.send(Failure {
            kind,
            path: path.map(Path::to_path_buf),
            message: error.to_string(),
        });
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_receive_failures() {
        let reporter = ErrorReporter::new();
        let mut rx = reporter.subscribe();
        let err = StoreError::load("a.yml", "broken");
        reporter.report(FailureKind::Reload, Some(Path::new("a.yml")), &err);

        let failure = rx.try_recv().unwrap();
        assert_eq!(failure.kind, FailureKind::Reload);
        assert_eq!(failure.path.as_deref(), Some(Path::new("a.yml")));
        assert!(failure.message.contains("broken"));
    }

    #[test]
    fn test_report_without_subscribers() {
        let reporter = ErrorReporter::new();
        reporter.report(FailureKind::Watch, None, &StoreError::load("x", "y"));
    }
}
