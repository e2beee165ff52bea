//! Live handle to one loaded document.
//!
//! # Data Flow
//! ```text
//! load:   read → parse → backfill defaults → decode → write canonical form → watch
//! change: watcher callback → reload → swap current value (old value kept on error)
//! save:   encode → replace tree root → write → swap current value
//! ```
//!
//! # Design Decisions
//! - Readers get an `Arc<T>` snapshot; a reload swaps the whole value, so a
//!   reader never observes a half-updated document
//! - A reload writes back only when backfill added something, which keeps
//!   the store from reacting to its own writes forever

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use arc_swap::ArcSwap;

use crate::codec::CodecSet;
use crate::document::{self, Document, DocumentError};
use crate::error::{Location, StoreError, StoreResult};
use crate::node::{parse_document, NodeTree};
use crate::observability::metrics;
use crate::persist;
use crate::report::{ErrorReporter, FailureKind};
use crate::watch::{ReloadCallback, WatchHandle, WatchState, WatcherContext};

/// A loaded document that follows its file.
///
/// Cloning is cheap and every clone observes the same value. The watch
/// registration lives as long as the last clone.
pub struct ConfigReference<T: Document> {
    inner: Arc<Inner<T>>,
}

struct Inner<T: Document> {
    path: PathBuf,
    codecs: Arc<CodecSet>,
    header: String,
    tree: Mutex<NodeTree>,
    current: ArcSwap<T>,
    reporter: ErrorReporter,
    watch: WatchHandle,
}

struct Loaded<T> {
    tree: NodeTree,
    value: T,
    backfilled: bool,
}

impl<T: Document> ConfigReference<T> {
    /// Load `path`, creating it from `T::default()` if missing, write the
    /// canonical form back and register it with `watcher`.
    ///
    /// `header` is written on top of the file unless the file already has one.
    pub fn load(
        path: impl Into<PathBuf>,
        codecs: Arc<CodecSet>,
        watcher: &WatcherContext,
        header: &str,
    ) -> StoreResult<Self> {
        let path = path.into();
        persist::ensure_parent(&path)?;

        let Loaded { tree, value, .. } = read_document::<T>(&path, &codecs, header)?;
        let written = persist::write_if_changed(&path, &tree.emit())?;

        let inner = Arc::new_cyclic(|weak: &Weak<Inner<T>>| {
            let weak = weak.clone();
            let callback: ReloadCallback = Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.reload_and_report();
                }
            });
            Inner {
                watch: watcher.register(&path, callback),
                path,
                codecs,
                header: header.to_string(),
                tree: Mutex::new(tree),
                current: ArcSwap::from_pointee(value),
                reporter: watcher.reporter().clone(),
            }
        });

        metrics::record_load(T::KIND);
        tracing::info!(kind = T::KIND, path = ?inner.path, written, "Configuration loaded");
        Ok(Self { inner })
    }

    /// Current value.
    pub fn get(&self) -> Arc<T> {
        self.inner.current.load_full()
    }

    /// Write `value` to the file and make it current.
    ///
    /// On error neither the file nor the current value changes.
    pub fn save(&self, value: T) -> StoreResult<()> {
        let inner = &self.inner;
        let root = document::encode(&value, &inner.codecs).map_err(|e| StoreError::Serialize {
            path: inner.path.clone(),
            message: e.to_string(),
        })?;

        let mut tree = lock(&inner.tree);
        let previous = std::mem::replace(tree.root_mut(), root);
        if let Err(e) = persist::write_if_changed(&inner.path, &tree.emit()) {
            tree.set_root(previous);
            return Err(e);
        }
        inner.current.store(Arc::new(value));
        drop(tree);

        metrics::record_save(T::KIND);
        tracing::debug!(kind = T::KIND, path = ?inner.path, "Configuration saved");
        Ok(())
    }

    /// Modify a copy of the current value and save it.
    pub fn update<F>(&self, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut T),
    {
        let mut value = T::clone(&self.get());
        f(&mut value);
        self.save(value)
    }

    /// Re-read the file now. On error the current value is kept.
    pub fn reload(&self) -> StoreResult<()> {
        self.inner.reload()
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Snapshot of the document tree as last read or written.
    pub fn node(&self) -> NodeTree {
        lock(&self.inner.tree).clone()
    }

    /// None when the path is not registered with a running watcher.
    pub fn watch_state(&self) -> Option<WatchState> {
        self.inner.watch.state()
    }
}

impl<T: Document> Inner<T> {
    fn reload(&self) -> StoreResult<()> {
        let Loaded {
            tree,
            value,
            backfilled,
        } = read_document::<T>(&self.path, &self.codecs, &self.header)?;

        let mut guard = lock(&self.tree);
        if backfilled {
            persist::write_if_changed(&self.path, &tree.emit())?;
        }
        *guard = tree;
        self.current.store(Arc::new(value));
        drop(guard);

        metrics::record_reload(T::KIND);
        tracing::info!(kind = T::KIND, path = ?self.path, backfilled, "Configuration reloaded");
        Ok(())
    }

    fn reload_and_report(&self) {
        if let Err(e) = self.reload() {
            self.reporter.report(FailureKind::Reload, Some(&self.path), &e);
        }
    }
}

impl<T: Document> Clone for ConfigReference<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Document + std::fmt::Debug> std::fmt::Debug for ConfigReference<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigReference")
            .field("kind", &T::KIND)
            .field("path", &self.inner.path)
            .field("value", &self.get())
            .finish()
    }
}

fn read_document<T: Document>(path: &Path, codecs: &CodecSet, header: &str) -> StoreResult<Loaded<T>> {
    let text = persist::read_or_empty(path)?;
    let mut tree = parse_document(&text, T::style())
        .map_err(|e| StoreError::parse(path, e.location, e.message))?;
    tree.header_or(header);

    let backfilled =
        document::backfill::<T>(tree.root_mut(), codecs).map_err(|e| document_error(path, e))?;
    let value = document::decode::<T>(tree.root(), codecs).map_err(|e| document_error(path, e))?;

    Ok(Loaded {
        tree,
        value,
        backfilled,
    })
}

fn document_error(path: &Path, err: DocumentError) -> StoreError {
    match err {
        DocumentError::NotAMapping { found } => {
            StoreError::load(path, format!("document has no usable value: root is {}", found))
        }
        DocumentError::Serde(e) => {
            let location = e.location().map(|l| Location {
                line: l.line(),
                column: l.column(),
            });
            StoreError::parse(path, location, e.to_string())
        }
        other => StoreError::parse(path, None, other.to_string()),
    }
}

fn lock(tree: &Mutex<NodeTree>) -> MutexGuard<'_, NodeTree> {
    tree.lock().unwrap_or_else(PoisonError::into_inner)
}
