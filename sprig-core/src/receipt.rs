// sprig-core/src/receipt.rs
//! Writes install receipts and cleans up after the previous one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sprig_aio::json_io::write_json_atomic;
use sprig_common::config::Config;
use sprig_common::error::Result;
use sprig_common::model::{InstallReceipt, InstalledArtifact, Recipe};
use tracing::{debug, info};

use crate::install::InstalledLayout;
use crate::uninstall::{remove_artifacts, UninstallReport};

pub fn build_receipt(
    recipe: &Recipe,
    layout: &InstalledLayout,
    installed_at: DateTime<Utc>,
) -> InstallReceipt {
    InstallReceipt {
        name: recipe.name.clone(),
        version: recipe.version().to_string(),
        program: recipe.program.clone(),
        source_url: recipe.source.url.clone(),
        integrity_digest: recipe.integrity_digest.clone(),
        installed_at,
        artifacts: layout.artifacts.clone(),
    }
}

/// Persists the receipt for `recipe` and returns its path.
pub fn write_receipt(
    recipe: &Recipe,
    layout: &InstalledLayout,
    config: &Config,
    installed_at: DateTime<Utc>,
) -> Result<PathBuf> {
    let receipt = build_receipt(recipe, layout, installed_at);
    let path = config.receipt_path(&recipe.name);
    write_json_atomic(&path, &receipt)?;
    debug!(
        "Wrote receipt for {} {} ({} artifacts) to {}",
        receipt.name,
        receipt.version,
        receipt.artifacts.len(),
        path.display()
    );
    Ok(path)
}

/// Removes what `previous` recorded but the new install no longer placed.
pub fn prune_stale(
    previous: &InstallReceipt,
    current: &[InstalledArtifact],
    prefix: &Path,
) -> Result<UninstallReport> {
    let keep: HashSet<&Path> = current.iter().map(|a| a.path()).collect();
    let stale: Vec<&InstalledArtifact> = previous
        .artifacts
        .iter()
        .filter(|a| !keep.contains(a.path()))
        .collect();
    if stale.is_empty() {
        return Ok(UninstallReport::default());
    }
    let report = remove_artifacts(stale, prefix)?;
    info!(
        "Removed {} files left over from {} {}",
        report.removed_files.len(),
        previous.name,
        previous.version
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;
    use sprig_common::receipt::ReceiptRegistry;

    use super::*;

    #[test]
    fn receipt_round_trips_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_paths(dir.path().join("p"), dir.path().join("c"), "/r", "/h");
        let recipe = Recipe::from_toml_str(
            "t",
            r#"
            name = "netty"
            sha256 = "7e2ad93c7eec4301352cddbd0c99e4d983a2096794b3ea782dd17ef7c166cc70"
            [source]
            url = "https://github.com/jmeiracorbal/netty/archive/refs/tags/v1.0.0.tar.gz"
            "#,
        )
        .unwrap();
        let mut layout = InstalledLayout::for_recipe(&recipe, &config);
        layout.record(InstalledArtifact::Binary {
            path: config.bin_dir().join("netty"),
        });
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        let path = write_receipt(&recipe, &layout, &config, at).unwrap();
        assert_eq!(path, config.receipt_path("netty"));
        let receipt = ReceiptRegistry::new(config)
            .get_receipt("netty")
            .unwrap()
            .unwrap();
        assert_eq!(receipt.version, "1.0.0");
        assert_eq!(receipt.installed_at, at);
        assert_eq!(receipt.artifacts, layout.artifacts);
    }

    #[test]
    fn prune_removes_only_dropped_paths() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path();
        let old_file = prefix.join("share/tool/OLD.md");
        let kept_file = prefix.join("share/tool/README.md");
        fs::create_dir_all(prefix.join("share/tool")).unwrap();
        fs::write(&old_file, "old").unwrap();
        fs::write(&kept_file, "new").unwrap();

        let previous = InstallReceipt {
            name: "tool".into(),
            version: "0.9.0".into(),
            program: "tool".into(),
            source_url: "file:///x".into(),
            integrity_digest: "ab".into(),
            installed_at: Utc::now(),
            artifacts: vec![
                InstalledArtifact::Directory {
                    path: prefix.join("share/tool"),
                },
                InstalledArtifact::SharedFile {
                    path: old_file.clone(),
                },
                InstalledArtifact::SharedFile {
                    path: kept_file.clone(),
                },
            ],
        };
        let current = vec![
            InstalledArtifact::Directory {
                path: prefix.join("share/tool"),
            },
            InstalledArtifact::SharedFile {
                path: kept_file.clone(),
            },
        ];
        let report = prune_stale(&previous, &current, prefix).unwrap();
        assert_eq!(report.removed_files, vec![old_file.clone()]);
        assert!(!old_file.exists());
        assert!(kept_file.exists());
    }
}
