//! Host-facing entry point.
//!
//! # Responsibilities
//! - Own the watch service, the codec registry and the failure channel
//! - Map document kinds to path templates
//! - Load single documents and directories, save ad-hoc documents
//!
//! # State Transitions
//! ```text
//! new ──▶ live (watcher running) ──shutdown──▶ load-once
//!  └────▶ load-once (watch disabled or watcher unavailable)
//! ```

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::codec::{CodecFactory, SerializerRegistry};
use crate::directory::{self, DefaultConfig};
use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::path::{self, Substitution};
use crate::reference::ConfigReference;
use crate::report::{ErrorReporter, Failure, FailureKind};
use crate::settings::StoreSettings;
use crate::watch::{WatchOptions, WatcherContext};

pub struct ConfigStore {
    settings: StoreSettings,
    watcher: WatcherContext,
    serializers: SerializerRegistry,
    bindings: DashMap<String, String>,
    reporter: ErrorReporter,
    startup_failure: Option<Failure>,
}

impl ConfigStore {
    /// Build a store from settings.
    ///
    /// If the OS watcher cannot be started the store still works, loading
    /// each document once; the failure is kept in [`ConfigStore::startup_failure`].
    pub fn new(settings: StoreSettings) -> Self {
        let reporter = ErrorReporter::new();
        if !settings.watch.enabled {
            tracing::info!("Live reload disabled by settings");
            return Self::with_watcher(settings, WatcherContext::disabled(reporter));
        }
        let options = WatchOptions {
            debounce: settings.watch.debounce(),
        };
        let started = WatcherContext::new(options, reporter.clone());
        Self::from_started(settings, started, reporter)
    }

    fn from_started(settings: StoreSettings, started: StoreResult<WatcherContext>, reporter: ErrorReporter) -> Self {
        match started {
            Ok(watcher) => Self::with_watcher(settings, watcher),
            Err(e) => {
                reporter.report(FailureKind::Watch, None, &e);
                let mut store = Self::with_watcher(settings, WatcherContext::disabled(reporter));
                store.startup_failure = Some(Failure {
                    kind: FailureKind::Watch,
                    path: None,
                    message: e.to_string(),
                });
                store
            }
        }
    }

    /// Build a store around an existing watch service, sharing its failure
    /// channel.
    pub fn with_watcher(settings: StoreSettings, watcher: WatcherContext) -> Self {
        let reporter = watcher.reporter().clone();
        let bindings = settings
            .bindings
            .iter()
            .map(|b| (b.kind.clone(), b.path.clone()))
            .collect();
        Self {
            serializers: SerializerRegistry::new(reporter.clone()),
            settings,
            watcher,
            bindings,
            reporter,
            startup_failure: None,
        }
    }

    /// Bind `T` to a path template, replacing any earlier binding.
    pub fn bind<T: Document>(&self, template: impl Into<String>) {
        let template = template.into();
        tracing::debug!(kind = T::KIND, template = %template, "Path template bound");
        self.bindings.insert(T::KIND.to_string(), template);
    }

    /// The template bound to `T`, if any.
    pub fn binding<T: Document>(&self) -> Option<String> {
        self.bindings.get(T::KIND).map(|t| t.value().clone())
    }

    /// Add a codec for `T`.
    pub fn register_codec<T: Document>(&self, factory: CodecFactory) {
        self.serializers.register::<T>(factory);
    }

    /// Resolve `T`'s bound template with `substitutions` and load that file.
    pub fn load_single<T: Document>(&self, substitutions: &[Substitution]) -> StoreResult<ConfigReference<T>> {
        let template = self.binding::<T>().ok_or_else(|| {
            StoreError::load(
                PathBuf::from(T::KIND),
                format!("no path template bound for document type `{}`", T::KIND),
            )
        })?;
        let path = self.absolute(path::resolve(&template, substitutions)?);
        ConfigReference::load(path, self.serializers.codecs_for::<T>(), &self.watcher, self.header())
    }

    /// Load a file at an explicit path.
    pub fn load_path<T: Document>(&self, path: impl AsRef<Path>) -> StoreResult<ConfigReference<T>> {
        let path = self.absolute(path.as_ref().to_path_buf());
        ConfigReference::load(path, self.serializers.codecs_for::<T>(), &self.watcher, self.header())
    }

    /// Seed `dir` with `defaults` and load every file below it.
    pub fn load_directory<T: Document>(
        &self,
        dir: impl AsRef<Path>,
        defaults: Vec<DefaultConfig<T>>,
    ) -> StoreResult<Vec<ConfigReference<T>>> {
        let dir = self.absolute(dir.as_ref().to_path_buf());
        directory::load_directory(
            &dir,
            &defaults,
            self.serializers.codecs_for::<T>(),
            &self.watcher,
            self.header(),
        )
    }

    /// Write `value` to `path` and return the absolute path written.
    ///
    /// The file is not loaded or watched; call [`ConfigStore::load_path`] on
    /// the returned path to get a live reference to it.
    pub fn save_as<T: Document>(&self, path: impl AsRef<Path>, value: &T) -> StoreResult<PathBuf> {
        let path = self.absolute(path.as_ref().to_path_buf());
        let codecs = self.serializers.codecs_for::<T>();
        directory::write_document(&path, value, &codecs, self.header())?;
        tracing::info!(kind = T::KIND, path = ?path, "Document saved");
        Ok(path)
    }

    /// Receive failures that were handled inside the store from now on.
    pub fn failures(&self) -> broadcast::Receiver<Failure> {
        self.reporter.subscribe()
    }

    /// Why the store runs without live reload, if the watcher failed to start.
    pub fn startup_failure(&self) -> Option<&Failure> {
        self.startup_failure.as_ref()
    }

    pub fn watcher(&self) -> &WatcherContext {
        &self.watcher
    }

    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Stop live reload. Loaded references keep their last value.
    pub fn shutdown(&self) {
        self.watcher.shutdown();
    }

    fn header(&self) -> &str {
        &self.settings.documents.header
    }

    fn absolute(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.settings.documents.base_dir.join(path)
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(StoreSettings::default())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("base_dir", &self.settings.documents.base_dir)
            .field("live", &self.watcher.is_live())
            .field("bindings", &self.bindings.len())
            .finish()
    }
}
