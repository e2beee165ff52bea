//! The shared watch service behind every live reference.

use std::collections::HashMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;

use dashmap::DashMap;
use notify::event::{EventKind, ModifyKind};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{StoreError, StoreResult};
use crate::observability::metrics;
use crate::report::{ErrorReporter, FailureKind};
use crate::watch::state::WatchState;

/// Invoked on the dispatcher thread when a registered file changes.
pub type ReloadCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Events for the same path arriving within this window trigger one reload.
    pub debounce: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
        }
    }
}

enum Signal {
    Changed(PathBuf),
    Failed { paths: Vec<PathBuf>, reason: String },
}

struct Registration {
    id: u64,
    callback: ReloadCallback,
    state: Arc<AtomicU8>,
    /// Parent directory whose watch this registration holds a count on.
    directory: Option<PathBuf>,
}

struct Shared {
    registrations: DashMap<PathBuf, Registration>,
    directories: Mutex<HashMap<PathBuf, usize>>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    next_id: AtomicU64,
    reporter: ErrorReporter,
}

/// Process-wide watch service, shared by cloning.
///
/// Created explicitly and handed to every load; [`WatcherContext::shutdown`]
/// stops the OS watcher and drops all registrations.
#[derive(Clone)]
pub struct WatcherContext {
    shared: Arc<Shared>,
}

impl WatcherContext {
    /// Start the OS watcher and its dispatcher thread.
    pub fn new(options: WatchOptions, reporter: ErrorReporter) -> StoreResult<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if is_change(&event.kind) {
                        for path in event.paths {
                            let _ = tx.send(Signal::Changed(path));
                        }
                    }
                }
                Err(e) => {
                    let paths = e.paths.clone();
                    let _ = tx.send(Signal::Failed {
                        paths,
                        reason: e.to_string(),
                    });
                }
            },
            Config::default(),
        )
        .map_err(|e| StoreError::WatchUnavailable { reason: e.to_string() })?;

        let shared = Arc::new(Shared::new(Some(watcher), reporter));
        let weak = Arc::downgrade(&shared);
        let debounce = options.debounce;
        thread::Builder::new()
            .name("live-config-watch".to_string())
            .spawn(move || dispatch(rx, weak, debounce))
            .map_err(|e| StoreError::WatchUnavailable { reason: e.to_string() })?;

        tracing::info!(debounce_ms = debounce.as_millis() as u64, "Watch service started");
        Ok(Self { shared })
    }

    /// A context without an OS watcher: documents load once and never reload.
    pub fn disabled(reporter: ErrorReporter) -> Self {
        Self {
            shared: Arc::new(Shared::new(None, reporter)),
        }
    }

    /// Whether the OS watcher is running.
    pub fn is_live(&self) -> bool {
        lock(&self.shared.watcher).is_some()
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.shared.reporter
    }

    /// Register `callback` for `path`, replacing any earlier registration.
    ///
    /// Never fails: if the path cannot be watched the failure is reported and
    /// the returned handle shows [`WatchState::Failed`]. Dropping the handle
    /// removes the registration.
    pub fn register(&self, path: &Path, callback: ReloadCallback) -> WatchHandle {
        let shared = &self.shared;
        let id = shared.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(AtomicU8::new(WatchState::Watching as u8));

        let (key, directory) = match canonical_key(path) {
            Ok(key) => {
                let inherited = shared
                    .registrations
                    .remove(&key)
                    .and_then(|(_, previous)| previous.directory);
                let directory = match inherited {
                    Some(dir) => Ok(dir),
                    None => shared.watch_directory(&key),
                };
                (key, directory)
            }
            Err(e) => (path.to_path_buf(), Err(e.to_string())),
        };

        let directory = match directory {
            Ok(dir) => {
                tracing::debug!(path = ?key, "Watch registered");
                Some(dir)
            }
            Err(reason) => {
                state.store(WatchState::Failed as u8, Ordering::Release);
                let err = StoreError::Watch {
                    path: key.clone(),
                    reason,
                };
                shared.reporter.report(FailureKind::Watch, Some(&key), &err);
                None
            }
        };

        shared.registrations.insert(
            key.clone(),
            Registration {
                id,
                callback,
                state,
                directory,
            },
        );
        metrics::record_watched_paths(shared.registrations.len());

        WatchHandle {
            shared: Arc::clone(shared),
            path: key,
            id,
        }
    }

    /// State of the registration for `path`, if any.
    pub fn state(&self, path: &Path) -> Option<WatchState> {
        let key = canonical_key(path).unwrap_or_else(|_| path.to_path_buf());
        self.shared
            .registrations
            .get(&key)
            .map(|r| WatchState::from(r.state.load(Ordering::Acquire)))
    }

    /// Registered paths, sorted.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .shared
            .registrations
            .iter()
            .map(|r| r.key().clone())
            .collect();
        paths.sort();
        paths
    }

    /// Stop the OS watcher and drop every registration.
    pub fn shutdown(&self) {
        let watcher = lock(&self.shared.watcher).take();
        drop(watcher);
        lock(&self.shared.directories).clear();
        self.shared.registrations.clear();
        metrics::record_watched_paths(0);
        tracing::info!("Watch service stopped");
    }
}

impl Shared {
    fn new(watcher: Option<RecommendedWatcher>, reporter: ErrorReporter) -> Self {
        Self {
            registrations: DashMap::new(),
            directories: Mutex::new(HashMap::new()),
            watcher: Mutex::new(watcher),
            next_id: AtomicU64::new(1),
            reporter,
        }
    }

    fn watch_directory(&self, file: &Path) -> Result<PathBuf, String> {
        let dir = file
            .parent()
            .ok_or_else(|| "path has no parent directory".to_string())?
            .to_path_buf();

        let mut directories = lock(&self.directories);
        if let Some(count) = directories.get_mut(&dir) {
            *count += 1;
            return Ok(dir);
        }

        let mut guard = lock(&self.watcher);
        let watcher = guard
            .as_mut()
            .ok_or_else(|| "live reload is unavailable".to_string())?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| e.to_string())?;
        directories.insert(dir.clone(), 1);
        tracing::debug!(directory = ?dir, "Watching directory");
        Ok(dir)
    }

    fn release_directory(&self, dir: &Path) {
        let mut directories = lock(&self.directories);
        let Some(count) = directories.get_mut(dir) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        directories.remove(dir);
        if let Some(watcher) = lock(&self.watcher).as_mut() {
            if let Err(e) = watcher.unwatch(dir) {
                tracing::debug!(directory = ?dir, error = %e, "Unwatch failed");
            }
        }
    }

    fn unregister(&self, path: &Path, id: u64) {
        let Some((_, registration)) = self.registrations.remove_if(path, |_, r| r.id == id) else {
            return;
        };
        if let Some(dir) = registration.directory {
            self.release_directory(&dir);
        }
        metrics::record_watched_paths(self.registrations.len());
        tracing::debug!(path = ?path, "Watch removed");
    }

    fn fire(&self, path: &Path) {
        let Some((callback, state)) = self
            .registrations
            .get(path)
            .map(|r| (Arc::clone(&r.callback), Arc::clone(&r.state)))
        else {
            return;
        };

        let started = state.compare_exchange(
            WatchState::Watching as u8,
            WatchState::Reloading as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if started.is_err() {
            return;
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback()));
        let _ = state.compare_exchange(
            WatchState::Reloading as u8,
            WatchState::Watching as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        if outcome.is_err() {
            let err = StoreError::load(path, "reload callback panicked");
            self.reporter.report(FailureKind::Reload, Some(path), &err);
        }
    }

    fn fail(&self, paths: Vec<PathBuf>, reason: &str) {
        if paths.is_empty() {
            let err = StoreError::WatchUnavailable {
                reason: reason.to_string(),
            };
            self.reporter.report(FailureKind::Watch, None, &err);
            return;
        }

        for path in paths {
            for entry in self.registrations.iter() {
                let affected = entry.key() == &path
                    || entry.value().directory.as_deref() == Some(path.as_path());
                if !affected {
                    continue;
                }
                entry.value().state.store(WatchState::Failed as u8, Ordering::Release);
                let err = StoreError::Watch {
                    path: entry.key().clone(),
                    reason: reason.to_string(),
                };
                self.reporter.report(FailureKind::Watch, Some(entry.key()), &err);
            }
        }
    }
}

/// Keeps a registration alive; dropping it unregisters the path unless a
/// newer registration has replaced it.
///
/// The handle keeps the watch service running after the [`WatcherContext`]
/// that created it is dropped; only [`WatcherContext::shutdown`] stops it.
pub struct WatchHandle {
    shared: Arc<Shared>,
    path: PathBuf,
    id: u64,
}

impl WatchHandle {
    /// The canonical path events are matched against.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// None once the registration was replaced or the service shut down.
    pub fn state(&self) -> Option<WatchState> {
        let registration = self.shared.registrations.get(&self.path)?;
        (registration.id == self.id)
            .then(|| WatchState::from(registration.state.load(Ordering::Acquire)))
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.shared.unregister(&self.path, self.id);
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("path", &self.path)
            .field("id", &self.id)
            .finish()
    }
}

#[derive(Default)]
struct Batch {
    changed: Vec<PathBuf>,
    failed: Vec<(Vec<PathBuf>, String)>,
}

impl Batch {
    fn push(&mut self, signal: Signal) {
        match signal {
            Signal::Changed(path) => {
                if !self.changed.contains(&path) {
                    self.changed.push(path);
                }
            }
            Signal::Failed { paths, reason } => self.failed.push((paths, reason)),
        }
    }
}

fn dispatch(mut rx: mpsc::UnboundedReceiver<Signal>, shared: Weak<Shared>, debounce: Duration) {
    while let Some(first) = rx.blocking_recv() {
        let mut batch = Batch::default();
        batch.push(first);
        if !debounce.is_zero() {
            thread::sleep(debounce);
        }
        while let Ok(signal) = rx.try_recv() {
            batch.push(signal);
        }

        let Some(shared) = shared.upgrade() else {
            break;
        };
        for (paths, reason) in batch.failed {
            shared.fail(paths, &reason);
        }
        for path in batch.changed {
            shared.fire(&path);
        }
    }
    tracing::debug!("Watch dispatcher stopped");
}

fn is_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        kind => kind.is_modify() || kind.is_create(),
    }
}

/// Canonical parent directory joined with the file name, so the key matches
/// the paths the OS reports for the watched directory.
fn canonical_key(path: &Path) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(parent.canonicalize()?.join(file_name))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
