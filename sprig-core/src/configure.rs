// sprig-core/src/configure.rs
//! Post-install configurator: operator-owned state under the home directory.
//!
//! Everything here is created at most once. A reinstall finds the files in
//! place and leaves them byte-for-byte alone.

use std::fmt;
use std::path::{Path, PathBuf};

use sprig_aio::fs::{contained_join, ensure_dir, seed_file, SeedOutcome};
use sprig_common::error::{Result, SprigError};
use sprig_common::model::{PostInstallStep, Recipe};
use tracing::{debug, info};

use crate::template::TemplateVars;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureAction {
    Created,
    Preserved,
}

impl fmt::Display for ConfigureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigureAction::Created => f.write_str("created"),
            ConfigureAction::Preserved => f.write_str("preserved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigureOutcome {
    pub path: PathBuf,
    pub action: ConfigureAction,
}

/// Runs the recipe's post-install steps against `home`.
///
/// Stops at the first action that fails with `SprigError::Configure`.
pub fn configure(recipe: &Recipe, home: &Path, vars: &TemplateVars) -> Result<Vec<ConfigureOutcome>> {
    let mut outcomes = Vec::with_capacity(recipe.post_install_steps.len());
    for step in &recipe.post_install_steps {
        let path = resolve_home_path(home, step.path(), vars)?;
        let action = match step {
            PostInstallStep::EnsureDir { .. } => {
                let created = ensure_dir(&path).map_err(|e| configure_error(&path, e))?;
                if created {
                    ConfigureAction::Created
                } else {
                    ConfigureAction::Preserved
                }
            }
            PostInstallStep::SeedFile { content, .. } => {
                let rendered = vars.render(content);
                match seed_file(&path, rendered.as_bytes()).map_err(|e| configure_error(&path, e))? {
                    SeedOutcome::Created => ConfigureAction::Created,
                    SeedOutcome::Preserved => ConfigureAction::Preserved,
                }
            }
        };
        debug!("[{}] {} {}", recipe.name, action, path.display());
        outcomes.push(ConfigureOutcome { path, action });
    }
    let created = outcomes
        .iter()
        .filter(|o| o.action == ConfigureAction::Created)
        .count();
    if created > 0 {
        info!(
            "Initialized {} of {} state entries for '{}'",
            created,
            outcomes.len(),
            recipe.name
        );
    }
    Ok(outcomes)
}

/// Maps `~/.tool/config` or `.tool/config` under `home`; anything that would
/// leave the home directory is refused.
fn resolve_home_path(home: &Path, raw: &Path, vars: &TemplateVars) -> Result<PathBuf> {
    let rendered = vars.render(&raw.to_string_lossy());
    let relative = rendered
        .strip_prefix("~/")
        .unwrap_or(rendered.as_str())
        .to_string();
    contained_join(home, Path::new(&relative)).map_err(|_| SprigError::Configure {
        path: PathBuf::from(&rendered),
        reason: "path must stay inside the home directory".to_string(),
    })
}

fn configure_error(path: &Path, err: SprigError) -> SprigError {
    SprigError::Configure {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
