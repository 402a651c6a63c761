/*
File: modlink-aio/src/fs.rs
Purpose: Primitive synchronous filesystem operations.
*/
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use modlink_common::error::{ModlinkError, Result};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, error, warn};

fn fs_error(path: &Path, err: io::Error) -> ModlinkError {
    ModlinkError::Filesystem(path.to_path_buf(), err.to_string())
}

/// Creates a directory and all its parent components if they are missing.
pub fn create_dir_all(path: &Path) -> Result<()> {
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        fs_error(path, e)
    })
}

/// Reads the entire contents of a file into a byte vector.
pub fn read_to_bytes(path: &Path) -> Result<Vec<u8>> {
    debug!("Reading file to bytes: {}", path.display());
    fs::read(path).map_err(|e| {
        error!("Failed read file {}: {}", path.display(), e);
        fs_error(path, e)
    })
}

/// Writes a file in one go, creating parent directories.
pub fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    debug!("Writing {} bytes to {}", content.len(), path.display());
    let mut file = File::create(path).map_err(|e| fs_error(path, e))?;
    file.write_all(content).map_err(|e| fs_error(path, e))
}

/// Sets file permissions (Unix only). Mode is standard Unix octal mode.
#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    debug!("Setting permissions on {}: {:o}", path.display(), mode);
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
        error!("Failed set permissions on {}: {}", path.display(), e);
        fs_error(path, e)
    })
}

#[cfg(not(unix))]
pub fn set_permissions(path: &Path, _mode: u32) -> Result<()> {
    debug!(
        "Setting permissions not supported on this platform: {}",
        path.display()
    );
    Ok(())
}

/// Atomically writes data to a file using a temporary file in the same directory.
pub fn atomic_write_file(original_path: &Path, content: &[u8]) -> Result<()> {
    let dir = original_path.parent().ok_or_else(|| {
        ModlinkError::Filesystem(
            original_path.to_path_buf(),
            "cannot determine parent directory".to_string(),
        )
    })?;
    create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| fs_error(dir, e))?;
    let temp_path = temp_file.path().to_path_buf();

    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_path.display()
    );

    temp_file
        .write_all(content)
        .and_then(|_| temp_file.flush())
        .and_then(|_| temp_file.as_file().sync_all())
        .map_err(|e| fs_error(&temp_path, e))?;

    temp_file.persist(original_path).map_err(|e| {
        error!(
            "Failed to persist temporary file {} over {}: {}",
            temp_path.display(),
            original_path.display(),
            e.error
        );
        fs_error(original_path, e.error)
    })?;
    Ok(())
}

/// Creates an empty staging directory next to `target` so it can later be
/// renamed into place on the same filesystem. Dropping the guard removes it.
pub fn staging_dir_for(target: &Path) -> Result<TempDir> {
    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    create_dir_all(&parent)?;
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{name}.staging-"))
        .tempdir_in(&parent)
        .map_err(|e| fs_error(&parent, e))?;
    debug!("Created staging directory {}", staging.path().display());
    Ok(staging)
}

/// Moves a fully built directory to `target`, replacing whatever was there.
///
/// The old tree is first renamed aside, so `target` always names either the
/// previous complete tree or the new one.
pub fn publish_directory(staged: &Path, target: &Path) -> Result<()> {
    debug!(
        "Publishing {} to {}",
        staged.display(),
        target.display()
    );
    let mut displaced: Option<PathBuf> = None;
    if target.symlink_metadata().is_ok() {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        let aside = tempfile::Builder::new()
            .prefix(".modlink-previous-")
            .tempdir_in(parent)
            .map_err(|e| fs_error(parent, e))?
            .keep();
        let backup = aside.join("image");
        fs::rename(target, &backup).map_err(|e| fs_error(target, e))?;
        displaced = Some(aside);
    }

    if let Err(e) = fs::rename(staged, target) {
        error!(
            "Failed to move {} into place at {}: {}",
            staged.display(),
            target.display(),
            e
        );
        if let Some(aside) = &displaced {
            if let Err(restore) = fs::rename(aside.join("image"), target) {
                warn!(
                    "Could not restore previous image at {}: {}",
                    target.display(),
                    restore
                );
            }
        }
        return Err(fs_error(target, e));
    }

    if let Some(aside) = displaced {
        if let Err(e) = fs::remove_dir_all(&aside) {
            warn!(
                "Failed to remove previous image at {}: {}",
                aside.display(),
                e
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_replaces_existing_directory() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("image");
        fs::create_dir_all(target.join("old")).unwrap();

        let staging = staging_dir_for(&target).unwrap();
        let built = staging.path().join("image");
        write_file(&built.join("bin/app"), b"#!/bin/sh\n").unwrap();

        publish_directory(&built, &target).unwrap();

        assert!(target.join("bin/app").is_file());
        assert!(!target.join("old").exists());
        let leftovers: Vec<_> = fs::read_dir(root.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(".modlink-previous-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn dropping_staging_dir_cleans_up() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("image");
        let staged_path = {
            let staging = staging_dir_for(&target).unwrap();
            write_file(&staging.path().join("partial"), b"x").unwrap();
            staging.path().to_path_buf()
        };
        assert!(!staged_path.exists());
        assert!(!target.exists());
    }

    #[test]
    fn atomic_write_creates_parents() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("a/b/module-info.java");
        atomic_write_file(&path, b"module a {}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "module a {}\n");
    }
}
