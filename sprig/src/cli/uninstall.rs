// sprig/src/cli/uninstall.rs
use clap::Args;
use colored::Colorize;
use sprig_common::config::Config;
use sprig_common::error::{Result, SprigError};
use sprig_core::uninstall as core_uninstall;
use tracing::{debug, warn};

#[derive(Args, Debug)]
pub struct Uninstall {
    /// The names of the recipes to uninstall
    #[arg(required = true)]
    pub names: Vec<String>,
}

impl Uninstall {
    pub async fn run(&self, config: &Config) -> Result<()> {
        let mut errors: Vec<(String, SprigError)> = Vec::new();

        for name in &self.names {
            if name.contains('/') || name.contains("..") {
                let msg = format!("Invalid recipe name '{name}' contains disallowed characters");
                errors.push((name.clone(), SprigError::NotFound(msg)));
                continue;
            }

            println!("Uninstalling {name}...");
            match core_uninstall(name, config).await {
                Ok(report) => {
                    debug!("Uninstall report for {}: {:?}", name, report);
                    for missing in &report.missing {
                        warn!("{} was already gone", missing.display());
                    }
                    for kept in &report.kept_dirs {
                        println!(
                            "    {} {} (not empty)",
                            "kept".dimmed(),
                            kept.display()
                        );
                    }
                    println!(
                        "✓ Uninstalled {} ({} files, {} directories)",
                        name.green(),
                        report.removed_files.len(),
                        report.removed_dirs.len()
                    );
                }
                Err(e) => {
                    eprintln!("✖ Failed to uninstall '{}': {}", name.cyan(), e);
                    errors.push((name.clone(), e));
                }
            }
        }

        if errors.is_empty() {
            return Ok(());
        }
        if errors.len() == 1 {
            return Err(errors.remove(0).1);
        }
        Err(SprigError::Generic(format!(
            "Failed to uninstall {}",
            errors
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}
