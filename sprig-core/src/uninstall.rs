// sprig-core/src/uninstall.rs
use std::path::{Path, PathBuf};

use sprig_aio::fs::{remove_dir_if_empty, remove_file_if_exists};
use sprig_common::config::Config;
use sprig_common::error::{Result, SprigError};
use sprig_common::model::InstalledArtifact;
use sprig_common::receipt::ReceiptRegistry;
use tracing::{debug, info, warn};

use crate::lock::InstallLock;

/// What an uninstall (or a reinstall's cleanup) took off the disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    pub removed_files: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
    /// Recorded files that were already gone.
    pub missing: Vec<PathBuf>,
    /// Recorded directories left behind because they still hold other files.
    pub kept_dirs: Vec<PathBuf>,
}

/// Removes everything the receipt of `name` lists, then the receipt itself.
///
/// Only engine-owned paths under the prefix are touched; operator state in
/// the home directory is never part of a receipt. Holds the recipe's install
/// lock, so it waits for a running install of the same recipe to finish.
pub async fn uninstall(name: &str, config: &Config) -> Result<UninstallReport> {
    let _lock = InstallLock::acquire(config, name).await?;
    let registry = ReceiptRegistry::new(config.clone());
    let receipt = registry
        .get_receipt(name)?
        .ok_or_else(|| SprigError::NotFound(format!("'{name}' is not installed")))?;
    debug!(
        "Uninstalling {} {} ({} recorded artifacts)",
        receipt.name,
        receipt.version,
        receipt.artifacts.len()
    );

    let report = remove_artifacts(&receipt.artifacts, config.prefix())?;
    remove_file_if_exists(&registry.receipt_path(name))?;
    info!(
        "Uninstalled '{}': {} files, {} directories removed",
        name,
        report.removed_files.len(),
        report.removed_dirs.len()
    );
    Ok(report)
}

/// Deletes recorded files, then recorded directories deepest-first when empty.
pub(crate) fn remove_artifacts<'a, I>(artifacts: I, prefix: &Path) -> Result<UninstallReport>
where
    I: IntoIterator<Item = &'a InstalledArtifact>,
{
    let mut report = UninstallReport::default();
    let mut dirs = Vec::new();
    for artifact in artifacts {
        let path = artifact.path();
        if !path.starts_with(prefix) {
            warn!("Refusing to remove {} outside {}", path.display(), prefix.display());
            continue;
        }
        if artifact.is_directory() {
            dirs.push(path.to_path_buf());
        } else if remove_file_if_exists(path)? {
            report.removed_files.push(path.to_path_buf());
        } else {
            report.missing.push(path.to_path_buf());
        }
    }

    dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    dirs.dedup();
    for dir in dirs {
        if remove_dir_if_empty(&dir)? {
            report.removed_dirs.push(dir);
        } else if dir.exists() {
            report.kept_dirs.push(dir);
        }
    }
    Ok(report)
}
