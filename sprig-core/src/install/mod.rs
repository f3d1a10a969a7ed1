// sprig-core/src/install/mod.rs
//! Installer: precondition checks, artifact staging and the install-step loop.

pub mod steps;

use std::path::{Path, PathBuf};

use sprig_aio::extract::extract_artifact_async;
use sprig_common::config::Config;
use sprig_common::error::{Result, SprigError};
use sprig_common::model::{InstallReceipt, InstalledArtifact, Platform, Recipe};
use sprig_common::receipt::ReceiptRegistry;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::template::TemplateVars;

/// Where a recipe's engine-owned files live, and which ones it placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledLayout {
    pub prefix: PathBuf,
    pub bin_dir: PathBuf,
    pub share_dir: PathBuf,
    pub program: String,
    pub artifacts: Vec<InstalledArtifact>,
}

impl InstalledLayout {
    pub fn for_recipe(recipe: &Recipe, config: &Config) -> Self {
        Self {
            prefix: config.prefix().to_path_buf(),
            bin_dir: config.bin_dir(),
            share_dir: config.share_dir(),
            program: recipe.program.clone(),
            artifacts: Vec::new(),
        }
    }

    /// Layout of an already installed recipe, as recorded in its receipt.
    pub fn from_receipt(receipt: &InstallReceipt, config: &Config) -> Self {
        Self {
            prefix: config.prefix().to_path_buf(),
            bin_dir: config.bin_dir(),
            share_dir: config.share_dir(),
            program: receipt.program.clone(),
            artifacts: receipt.artifacts.clone(),
        }
    }

    pub fn program_path(&self) -> PathBuf {
        self.bin_dir.join(&self.program)
    }

    /// Records an artifact once, keeping first-placement order.
    pub fn record(&mut self, artifact: InstalledArtifact) {
        if !self.artifacts.contains(&artifact) {
            self.artifacts.push(artifact);
        }
    }
}

/// Refuses recipes that cannot run here or whose dependencies are missing.
///
/// Runs before any install step touches the prefix.
pub fn check_preconditions(
    recipe: &Recipe,
    platform: Option<Platform>,
    receipts: &ReceiptRegistry,
) -> Result<()> {
    if !recipe.supports(platform) {
        return Err(SprigError::PlatformUnsupported {
            recipe: recipe.name.clone(),
            current: platform
                .map(|p| p.to_string())
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            allowed: recipe.platforms_display(),
        });
    }
    for dependency in &recipe.dependencies {
        if !receipts.is_installed(dependency) {
            return Err(SprigError::DependencyMissing {
                recipe: recipe.name.clone(),
                dependency: dependency.clone(),
            });
        }
        debug!("Dependency '{}' of '{}' is installed", dependency, recipe.name);
    }
    Ok(())
}

/// A verified artifact unpacked into a private directory outside the prefix.
/// The directory is removed when the value is dropped.
#[derive(Debug)]
pub struct StagedArtifact {
    _dir: TempDir,
    pub root: PathBuf,
}

/// Unpacks the artifact under the cache's staging area.
pub async fn stage_artifact(
    artifact: &Path,
    recipe: &Recipe,
    config: &Config,
) -> Result<StagedArtifact> {
    let tmp_root = config.tmp_dir();
    tokio::fs::create_dir_all(&tmp_root).await?;
    let dir = tempfile::Builder::new()
        .prefix(&format!("{}-", recipe.name))
        .tempdir_in(&tmp_root)?;
    let plain_name = plain_artifact_name(&recipe.source.url, &recipe.name);
    let root = extract_artifact_async(artifact, dir.path(), &plain_name).await?;
    debug!(
        "Staged {} for '{}' at {}",
        artifact.display(),
        recipe.name,
        root.display()
    );
    Ok(StagedArtifact { _dir: dir, root })
}

/// File name a non-archive artifact is staged under: the URL's last segment.
fn plain_artifact_name(url: &str, fallback: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|u| u.trim_end_matches('/').rsplit('/').next())
        .filter(|s| !s.is_empty() && !s.contains(':') && *s != "." && *s != "..")
        .unwrap_or(fallback)
        .to_string()
}

/// Executes the recipe's install steps in declared order against the prefix.
///
/// Stops at the first failing step with `SprigError::Install`; steps already
/// completed stay in place.
pub fn install(
    staged_root: &Path,
    recipe: &Recipe,
    config: &Config,
    vars: &TemplateVars,
) -> Result<InstalledLayout> {
    let mut layout = InstalledLayout::for_recipe(recipe, config);
    info!(
        "Installing {} {} into {}",
        recipe.name,
        recipe.version(),
        config.prefix().display()
    );
    for (i, step) in recipe.install_steps.iter().enumerate() {
        debug!("[{}] step {}: {}", recipe.name, i + 1, step.describe());
        steps::run_step(step, staged_root, &mut layout, vars).map_err(|reason| {
            SprigError::Install {
                index: i + 1,
                step: step.describe(),
                reason,
            }
        })?;
    }
    debug!(
        "[{}] {} install steps placed {} artifacts",
        recipe.name,
        recipe.install_steps.len(),
        layout.artifacts.len()
    );
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(text: &str) -> Recipe {
        Recipe::from_toml_str("t", text).unwrap()
    }

    const MAC_ONLY: &str = r#"
        name = "netty"
        sha256 = "ab"
        platform_constraint = ["macos"]
        dependencies = ["base-tool"]
        [source]
        url = "https://github.com/jmeiracorbal/netty/archive/refs/tags/v1.0.0.tar.gz"
    "#;

    #[test]
    fn platform_is_checked_before_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_paths(dir.path(), dir.path().join("c"), "/r", "/h");
        let receipts = ReceiptRegistry::new(config);
        let err = check_preconditions(&recipe(MAC_ONLY), Some(Platform::Linux), &receipts)
            .unwrap_err();
        match err {
            SprigError::PlatformUnsupported {
                current, allowed, ..
            } => {
                assert_eq!(current, "linux");
                assert_eq!(allowed, "macos");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_dependency_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_paths(dir.path(), dir.path().join("c"), "/r", "/h");
        let receipts = ReceiptRegistry::new(config.clone());
        let err = check_preconditions(&recipe(MAC_ONLY), Some(Platform::Macos), &receipts)
            .unwrap_err();
        assert!(matches!(
            err,
            SprigError::DependencyMissing { ref dependency, .. } if dependency == "base-tool"
        ));

        std::fs::create_dir_all(config.receipts_dir()).unwrap();
        std::fs::write(config.receipt_path("base-tool"), "{}").unwrap();
        check_preconditions(&recipe(MAC_ONLY), Some(Platform::Macos), &receipts).unwrap();
    }

    #[test]
    fn plain_names_come_from_the_url() {
        assert_eq!(
            plain_artifact_name("https://example.com/dl/tool.sh?x=1", "tool"),
            "tool.sh"
        );
        assert_eq!(plain_artifact_name("https://example.com/", "tool"), "example.com");
        assert_eq!(plain_artifact_name("", "tool"), "tool");
    }
}
