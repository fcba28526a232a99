//! Read and persist text artifacts.
//!
//! Writes go through a sibling temp file and a rename so an artifact is either
//! left untouched or fully replaced, never half-written.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::types::ReconcileError;

/// Read the full artifact as UTF-8, distinguishing a missing file.
pub fn read_artifact(path: &Path) -> Result<String, ReconcileError> {
    if !path.exists() {
        return Err(ReconcileError::ArtifactMissing {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|source| ReconcileError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically replace the artifact (temp file + rename), keeping its permissions.
///
/// A symlinked artifact is written through: the link stays and the file it
/// points to is replaced.
pub fn write_artifact(path: &Path, contents: &str) -> Result<(), ReconcileError> {
    let write_failed = |source| ReconcileError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let target = resolve_target(path).map_err(write_failed)?;
    let tmp_path = temp_sibling(&target);
    debug!(
        path = %path.display(),
        target = %target.display(),
        bytes = contents.len(),
        "writing artifact"
    );
    fs::write(&tmp_path, contents).map_err(write_failed)?;
    if let Ok(metadata) = fs::metadata(&target)
        && let Err(source) = fs::set_permissions(&tmp_path, metadata.permissions())
    {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_failed(source));
    }
    if let Err(source) = fs::rename(&tmp_path, &target) {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_failed(source));
    }
    Ok(())
}

/// The file a write must land on: `path` itself, or its fully resolved
/// target when `path` is a symlink.
fn resolve_target(path: &Path) -> std::io::Result<PathBuf> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.file_type().is_symlink() => fs::canonicalize(path),
        _ => Ok(path.to_path_buf()),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".envsync.tmp");
    path.with_file_name(name)
}
