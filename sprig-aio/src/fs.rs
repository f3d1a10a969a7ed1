/*
File: sprig-aio/src/fs.rs
Purpose: Primitive synchronous filesystem operations.
*/
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Component, Path, PathBuf},
    sync::Arc,
};

#[cfg(unix)]
use std::{fs::Permissions, os::unix::fs::PermissionsExt};

use sprig_common::error::{Result, SprigError};
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

/// Result of [`seed_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created,
    /// Something already existed at the path and was left untouched.
    Preserved,
}

/// Creates a directory and all its parent components if they are missing.
///
/// Returns `true` when the directory did not exist before.
pub fn ensure_dir(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    debug!("Creating directory recursively: {}", path.display());
    fs::create_dir_all(path).map_err(|e| {
        error!("Failed create dir {}: {}", path.display(), e);
        SprigError::from(e)
    })?;
    Ok(true)
}

/// Writes `content` to `path` only if nothing exists there yet.
///
/// The existence check and the creation are one `O_CREAT | O_EXCL` open, so a
/// concurrent writer can never be overwritten. A write that fails halfway
/// removes the partial file so the next run seeds it again.
pub fn seed_file(path: &Path, content: &[u8]) -> Result<SeedOutcome> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!("Seed target exists, preserving: {}", path.display());
            return Ok(SeedOutcome::Preserved);
        }
        Err(e) => {
            error!("Failed to create seed file {}: {}", path.display(), e);
            return Err(e.into());
        }
    };

    let written = file
        .write_all(content)
        .and_then(|_| file.flush())
        .and_then(|_| file.sync_all());
    if let Err(e) = written {
        error!("Failed to write seed file {}: {}", path.display(), e);
        drop(file);
        if let Err(rm) = fs::remove_file(path) {
            warn!("Could not remove partial seed {}: {}", path.display(), rm);
        }
        return Err(e.into());
    }
    debug!("Seeded {} ({} bytes)", path.display(), content.len());
    Ok(SeedOutcome::Created)
}

/// Sets file permissions (Unix only). Mode is standard Unix octal mode.
#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    debug!("Setting permissions on {}: {:o}", path.display(), mode);
    fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|e| {
        error!("Failed set permissions on {}: {}", path.display(), e);
        SprigError::from(e)
    })
}

#[cfg(not(unix))]
pub fn set_permissions(path: &Path, _mode: u32) -> Result<()> {
    warn!(
        "Setting permissions not fully supported on this platform: {}",
        path.display()
    );
    Ok(())
}

/// Whether any execute bit is set on a regular file.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Atomically writes data to a file using a temporary file in the same
/// directory, then applies `mode`.
pub fn atomic_write_file(original_path: &Path, content: &[u8], mode: u32) -> Result<()> {
    let dir = original_path.parent().ok_or_else(|| {
        SprigError::Generic(format!(
            "Cannot get parent directory for {}",
            original_path.display()
        ))
    })?;
    ensure_dir(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    let temp_path = temp_file.path().to_path_buf();
    debug!(
        "Atomically writing {} bytes to {} via temp file {}",
        content.len(),
        original_path.display(),
        temp_path.display()
    );

    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file().sync_all()?;

    temp_file.persist(original_path).map_err(|e| {
        error!(
            "Failed to persist temporary file {} over {}: {}",
            temp_path.display(),
            original_path.display(),
            e.error
        );
        SprigError::Io(Arc::new(e.error))
    })?;
    set_permissions(original_path, mode)
}

/// Copies `source` to `dest` through a temporary file so a reader never sees a
/// half-written destination, then applies `mode`.
pub fn install_file(source: &Path, dest: &Path, mode: u32) -> Result<()> {
    let dir = dest.parent().ok_or_else(|| {
        SprigError::Generic(format!("Cannot get parent directory for {}", dest.display()))
    })?;
    ensure_dir(dir)?;

    let mut reader = fs::File::open(source)?;
    let mut temp_file = NamedTempFile::new_in(dir)?;
    let bytes = io::copy(&mut reader, &mut temp_file)?;
    temp_file.as_file().sync_all()?;
    temp_file
        .persist(dest)
        .map_err(|e| SprigError::Io(Arc::new(e.error)))?;
    set_permissions(dest, mode)?;
    debug!(
        "Installed {} -> {} ({} bytes, mode {:o})",
        source.display(),
        dest.display(),
        bytes,
        mode
    );
    Ok(())
}

/// Removes a file. Returns `false` when it was already gone.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed file: {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => {
            error!("Failed remove file {}: {}", path.display(), e);
            Err(e.into())
        }
    }
}

/// Removes a directory only if it is empty. Returns whether it was removed.
pub fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    if fs::read_dir(path)?.next().is_some() {
        debug!("Directory not empty, keeping: {}", path.display());
        return Ok(false);
    }
    fs::remove_dir(path)?;
    debug!("Removed empty directory: {}", path.display());
    Ok(true)
}

/// Joins a relative path onto `base`, refusing absolute paths and `..`
/// components so the result always stays inside `base`.
pub fn contained_join(base: &Path, relative: &Path) -> Result<PathBuf> {
    let mut out = base.to_path_buf();
    let mut pushed = false;
    for comp in relative.components() {
        match comp {
            Component::Normal(part) => {
                out.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            _ => {
                return Err(SprigError::Generic(format!(
                    "Path '{}' escapes {}",
                    relative.display(),
                    base.display()
                )))
            }
        }
    }
    if !pushed {
        return Err(SprigError::Generic(format!(
            "Path '{}' does not name anything inside {}",
            relative.display(),
            base.display()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_file_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".tool").join("config");

        assert_eq!(seed_file(&path, b"WORK_TIME=25\n").unwrap(), SeedOutcome::Created);
        fs::write(&path, b"WORK_TIME=50\n").unwrap();
        assert_eq!(seed_file(&path, b"WORK_TIME=25\n").unwrap(), SeedOutcome::Preserved);
        assert_eq!(fs::read(&path).unwrap(), b"WORK_TIME=50\n");
    }

    #[test]
    fn seed_file_preserves_existing_directories_too() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken");
        fs::create_dir(&path).unwrap();
        assert_eq!(seed_file(&path, b"x").unwrap(), SeedOutcome::Preserved);
        assert!(path.is_dir());
    }

    #[test]
    fn ensure_dir_reports_creation_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c");
        assert!(ensure_dir(&path).unwrap());
        assert!(!ensure_dir(&path).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn install_file_sets_mode_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tool.sh");
        fs::write(&src, b"#!/bin/sh\necho v2\n").unwrap();
        let dest = dir.path().join("prefix/bin/tool");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&dest, b"old").unwrap();

        install_file(&src, &dest, 0o755).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"#!/bin/sh\necho v2\n");
        assert!(is_executable(&dest));

        install_file(&src, &dest, 0o644).unwrap();
        assert!(!is_executable(&dest));
    }

    #[test]
    fn atomic_write_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("share/man/man1/tool.1");
        atomic_write_file(&path, b"first", 0o644).unwrap();
        atomic_write_file(&path, b"second", 0o644).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn contained_join_rejects_escapes() {
        let base = Path::new("/prefix");
        assert_eq!(
            contained_join(base, Path::new("share/./tool")).unwrap(),
            PathBuf::from("/prefix/share/tool")
        );
        assert!(contained_join(base, Path::new("../etc/passwd")).is_err());
        assert!(contained_join(base, Path::new("/etc/passwd")).is_err());
        assert!(contained_join(base, Path::new(".")).is_err());
    }

    #[test]
    fn remove_helpers_are_tolerant() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"x").unwrap();
        assert!(remove_file_if_exists(&file).unwrap());
        assert!(!remove_file_if_exists(&file).unwrap());

        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("keep"), b"x").unwrap();
        assert!(!remove_dir_if_empty(&sub).unwrap());
        fs::remove_file(sub.join("keep")).unwrap();
        assert!(remove_dir_if_empty(&sub).unwrap());
    }
}
