//! Directory loading and default-file seeding.
//!
//! # Responsibilities
//! - Create the directory and seed it with default documents
//! - Load every file below it as one document type
//!
//! # Design Decisions
//! - Traversal is sorted by file name at each level, so results are stable
//! - Symbolic links are followed; a link to a directory is loaded like a
//!   subdirectory and a link cycle fails the batch
//! - A batch is all-or-nothing: on the first failure the references already
//!   loaded are dropped, which removes their watches

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::codec::CodecSet;
use crate::document::{self, Document};
use crate::error::{StoreError, StoreResult};
use crate::node::NodeTree;
use crate::persist;
use crate::reference::ConfigReference;
use crate::watch::WatcherContext;

/// A named instance used to seed a missing file.
#[derive(Debug, Clone)]
pub struct DefaultConfig<T> {
    file_name: String,
    instance: T,
    replace_existing: bool,
}

impl<T: Document> DefaultConfig<T> {
    /// Written only if `file_name` does not exist yet.
    pub fn new(file_name: impl Into<String>, instance: T) -> Self {
        Self {
            file_name: file_name.into(),
            instance,
            replace_existing: false,
        }
    }

    /// Written on every load, overwriting whatever is there.
    pub fn replacing(file_name: impl Into<String>, instance: T) -> Self {
        Self::new(file_name, instance).replace_existing(true)
    }

    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn instance(&self) -> &T {
        &self.instance
    }

    pub fn replaces_existing(&self) -> bool {
        self.replace_existing
    }
}

/// Encode `value` and write it to `path` with `header` on top.
pub fn write_document<T: Document>(path: &Path, value: &T, codecs: &CodecSet, header: &str) -> StoreResult<bool> {
    let root = document::encode(value, codecs).map_err(|e| StoreError::Serialize {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let header = (!header.is_empty()).then(|| header.to_string());
    let mut tree = NodeTree::new(T::style(), header);
    tree.set_root(root);
    persist::write_if_changed(path, &tree.emit())
}

/// Write each default into `dir` according to its replace policy.
/// Returns the number of files written.
pub fn install_defaults<T: Document>(
    dir: &Path,
    defaults: &[DefaultConfig<T>],
    codecs: &CodecSet,
    header: &str,
) -> StoreResult<usize> {
    let mut written = 0;
    for default in defaults {
        let path = default_path(dir, default.file_name())?;
        if path.exists() && !default.replace_existing {
            tracing::debug!(path = ?path, "Default already present");
            continue;
        }
        if write_document(&path, &default.instance, codecs, header)? {
            tracing::info!(kind = T::KIND, path = ?path, "Default installed");
            written += 1;
        }
    }
    Ok(written)
}

/// Seed `dir` with `defaults`, then load every file below it.
pub fn load_directory<T: Document>(
    dir: &Path,
    defaults: &[DefaultConfig<T>],
    codecs: Arc<CodecSet>,
    watcher: &WatcherContext,
    header: &str,
) -> StoreResult<Vec<ConfigReference<T>>> {
    prepare_directory(dir)?;
    install_defaults(dir, defaults, &codecs, header)?;

    let files = collect_files(dir)?;
    if files.is_empty() {
        tracing::warn!(kind = T::KIND, directory = ?dir, "Configuration directory is empty");
    }

    let references = files
        .into_iter()
        .map(|path| ConfigReference::load(path, Arc::clone(&codecs), watcher, header))
        .collect::<StoreResult<Vec<_>>>()
        .inspect_err(|e| {
            tracing::error!(kind = T::KIND, directory = ?dir, error = %e, "Directory load aborted");
        })?;

    tracing::info!(kind = T::KIND, directory = ?dir, count = references.len(), "Directory loaded");
    Ok(references)
}

fn prepare_directory(dir: &Path) -> StoreResult<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(StoreError::load(dir, "exists but is not a directory")),
        Err(_) => fs::create_dir_all(dir)
            .map_err(|e| StoreError::load(dir, format!("cannot create directory: {}", e))),
    }
}

fn default_path(dir: &Path, file_name: &str) -> StoreResult<PathBuf> {
    let relative = Path::new(file_name);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if file_name.is_empty() || escapes {
        return Err(StoreError::load(
            dir.join(file_name),
            "default file name must be a relative path inside the directory",
        ));
    }
    Ok(dir.join(relative))
}

fn collect_files(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            StoreError::io(path, e.into())
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if persist::is_temp_file(entry.path()) {
            tracing::debug!(path = ?entry.path(), "Skipping temporary file");
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ErrorReporter;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Arena {
        name: String,
        teams: u32,
    }

    impl Default for Arena {
        fn default() -> Self {
            Self {
                name: "arena".into(),
                teams: 2,
            }
        }
    }

    impl Document for Arena {
        const KIND: &'static str = "arena";
    }

    fn arena(name: &str, teams: u32) -> Arena {
        Arena {
            name: name.into(),
            teams,
        }
    }

    fn load(dir: &Path, defaults: &[DefaultConfig<Arena>]) -> StoreResult<Vec<ConfigReference<Arena>>> {
        let watcher = WatcherContext::disabled(ErrorReporter::new());
        load_directory(dir, defaults, Arc::new(CodecSet::builtin()), &watcher, "")
    }

    #[test]
    fn test_missing_directory_is_created_and_seeded() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("arenas");
        let loaded = load(&dir, &[DefaultConfig::new("desert.yml", arena("desert", 4))]).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(*loaded[0].get(), arena("desert", 4));
    }

    #[test]
    fn test_existing_file_is_not_replaced_by_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("desert.yml"), "name: custom\nteams: 8\n").unwrap();

        let loaded = load(dir.path(), &[DefaultConfig::new("desert.yml", arena("desert", 4))]).unwrap();
        assert_eq!(*loaded[0].get(), arena("custom", 8));
    }

    #[test]
    fn test_replacing_default_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("desert.yml"), "name: custom\nteams: 8\n").unwrap();

        let loaded = load(dir.path(), &[DefaultConfig::replacing("desert.yml", arena("desert", 4))]).unwrap();
        assert_eq!(*loaded[0].get(), arena("desert", 4));
    }

    #[test]
    fn test_order_is_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("c.yml"), "name: c\n").unwrap();
        fs::write(dir.path().join("a.yml"), "name: a\n").unwrap();
        fs::write(dir.path().join("b/inner.yml"), "name: inner\n").unwrap();
        fs::write(dir.path().join(".c.yml.live-config-tmp"), "partial").unwrap();

        let names: Vec<String> = load(dir.path(), &[])
            .unwrap()
            .iter()
            .map(|r| r.get().name.clone())
            .collect();
        assert_eq!(names, vec!["a", "inner", "c"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_linked_directory_is_walked() {
        let root = tempfile::tempdir().unwrap();
        let shared = root.path().join("shared");
        let dir = root.path().join("arenas");
        fs::create_dir_all(&shared).unwrap();
        fs::create_dir_all(&dir).unwrap();
        fs::write(shared.join("sky.yml"), "name: sky\n").unwrap();
        fs::write(dir.join("a.yml"), "name: a\n").unwrap();
        std::os::unix::fs::symlink(&shared, dir.join("shared")).unwrap();

        let names: Vec<String> = load(&dir, &[])
            .unwrap()
            .iter()
            .map(|r| r.get().name.clone())
            .collect();
        assert_eq!(names, vec!["a", "sky"]);
    }

    #[test]
    fn test_one_malformed_file_fails_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yml"), "name: a\n").unwrap();
        fs::write(dir.path().join("b.yml"), "name: [broken\n").unwrap();
        fs::write(dir.path().join("c.yml"), "name: c\n").unwrap();

        let err = load(dir.path(), &[]).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_file_in_place_of_directory() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("arenas");
        fs::write(&file, "").unwrap();
        assert!(matches!(load(&file, &[]).unwrap_err(), StoreError::Load { .. }));
    }

    #[test]
    fn test_default_names_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path(), &[DefaultConfig::new("../escape.yml", Arena::default())]).unwrap_err();
        assert!(matches!(err, StoreError::Load { .. }));
        assert!(default_path(dir.path(), "nested/ok.yml").is_ok());
    }
}
