//! Filesystem writes for managed documents.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// Suffix of the scratch file used for atomic replacement.
const TEMP_SUFFIX: &str = ".live-config-tmp";

/// Create the parent directories of `path`.
pub(crate) fn ensure_parent(path: &Path) -> StoreResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| StoreError::load(path, format!("cannot create directory {}: {}", parent.display(), e))),
        _ => Ok(()),
    }
}

/// Read a document; a missing file reads as empty.
pub(crate) fn read_or_empty(path: &Path) -> StoreResult<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Replace the file's contents atomically unless they are already equal.
/// Returns true if the file was written.
pub(crate) fn write_if_changed(path: &Path, contents: &str) -> StoreResult<bool> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            return Ok(false);
        }
    }

    ensure_parent(path)?;
    let temp = temp_path(path);
    let written = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp);
        return Err(StoreError::io(path, e));
    }
    Ok(true)
}

/// Scratch files left behind by an interrupted write.
pub(crate) fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.ends_with(TEMP_SUFFIX))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}{}", name, TEMP_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_if_changed_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/a.yml");
        assert!(write_if_changed(&path, "a: 1\n").unwrap());
        assert!(!write_if_changed(&path, "a: 1\n").unwrap());
        assert!(write_if_changed(&path, "a: 2\n").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a: 2\n");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_read_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_or_empty(&dir.path().join("none.yml")).unwrap(), "");
    }

    #[test]
    fn test_temp_file_detection() {
        let temp = temp_path(Path::new("configs/a.yml"));
        assert!(is_temp_file(&temp));
        assert!(!is_temp_file(Path::new("configs/a.yml")));
    }
}
