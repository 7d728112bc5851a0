//! Atomic file writes
//!
//! Config files, inventories and records are replaced with
//! write-to-temp-then-rename so a reader never observes a half-written file.

use crate::error::{CoreError, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically replace `path` with `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    write_with_mode(path, contents, None)
}

/// Same as [`write_atomic`] but restricts the file to its owner (0600 on unix).
pub fn write_atomic_private(path: &Path, contents: &[u8]) -> Result<()> {
    write_with_mode(path, contents, Some(0o600))
}

fn write_with_mode(path: &Path, contents: &[u8], mode: Option<u32>) -> Result<()> {
    let persist_err = |message: String| CoreError::Persist {
        path: path.to_path_buf(),
        message,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    // The temp file must live in the same directory so the rename stays on
    // one filesystem.
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    tmp.persist(path)
        .map_err(|e| persist_err(e.error.to_string()))?;

    tracing::debug!("Wrote {}", path.display());
    Ok(())
}

/// Remove a file or directory, treating "already absent" as success.
///
/// Returns `true` when something was actually removed.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
