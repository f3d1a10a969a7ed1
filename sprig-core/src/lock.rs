// sprig-core/src/lock.rs
//! Per-recipe, per-prefix exclusive install lock.
//!
//! Installs and uninstalls of the same recipe in the same prefix are
//! serialized; runs of different recipes, or into different prefixes, proceed
//! in parallel. Lock files live in the cache directory so acquiring one never
//! writes into the prefix.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use sha2::{Digest, Sha256};
use sprig_common::config::Config;
use sprig_common::error::{Result, SprigError};
use tracing::{debug, info, warn};

/// Exclusive lock held for the lifetime of the value.
#[derive(Debug)]
pub struct InstallLock {
    file: File,
    path: PathBuf,
}

impl InstallLock {
    pub fn lock_path(config: &Config, recipe_name: &str) -> PathBuf {
        let prefix_key = hex::encode(Sha256::digest(
            config.prefix().to_string_lossy().as_bytes(),
        ));
        config
            .locks_dir()
            .join(format!("{recipe_name}-{}.lock", &prefix_key[..12]))
    }

    /// Acquires the lock, waiting on the blocking pool if another run holds it.
    pub async fn acquire(config: &Config, recipe_name: &str) -> Result<Self> {
        let path = Self::lock_path(config, recipe_name);
        if let Some(lock) = Self::try_acquire_at(&path)? {
            return Ok(lock);
        }
        info!(
            "Another sprig run is installing '{}' into {}; waiting",
            recipe_name,
            config.prefix().display()
        );
        tokio::task::spawn_blocking(move || Self::acquire_blocking_at(&path))
            .await
            .map_err(|e| SprigError::Lock(format!("lock task failed: {e}")))?
    }

    /// Tries to take the lock without blocking; `Ok(None)` when it is held.
    pub fn try_acquire_at(path: &Path) -> Result<Option<Self>> {
        let file = open_lock_file(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired install lock at {}", path.display());
                Ok(Some(Self {
                    file,
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                debug!("Install lock already held at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(SprigError::Lock(format!(
                "Failed to try-acquire {}: {e}",
                path.display()
            ))),
        }
    }

    fn acquire_blocking_at(path: &Path) -> Result<Self> {
        let file = open_lock_file(path)?;
        file.lock_exclusive().map_err(|e| {
            SprigError::Lock(format!("Failed to acquire {}: {e}", path.display()))
        })?;
        debug!("Acquired install lock at {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| SprigError::Lock(format!("Cannot open {}: {e}", path.display())))
}
