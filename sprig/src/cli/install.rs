// sprig/src/cli/install.rs
use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use sprig_common::cache::Cache;
use sprig_common::config::Config;
use sprig_common::error::{Result, SprigError};
use sprig_common::formulary::Formulary;
use sprig_core::configure::ConfigureAction;
use sprig_core::{run_install, InstallOptions, InstallationRun};
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::cli::status;
use crate::cli::test::print_test_report;
use crate::report_error;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Args)]
pub struct InstallArgs {
    #[arg(required = true)]
    names: Vec<String>,

    /// Skip the acceptance checks after installing
    #[arg(long)]
    skip_tests: bool,
}

impl InstallArgs {
    #[instrument(skip(self, config, cache), fields(targets = ?self.names))]
    pub async fn run(&self, config: &Config, cache: Arc<Cache>) -> Result<()> {
        let formulary = Formulary::new(config);
        // With a single target the final error line is printed by main.
        let many = self.names.len() > 1;
        let mut errors: Vec<(String, SprigError)> = Vec::new();
        let mut recipes = Vec::new();
        for name in &self.names {
            match formulary.load_recipe(name) {
                Ok(recipe) => recipes.push(recipe),
                Err(e) => {
                    if many {
                        report_error(&e);
                    }
                    errors.push((name.clone(), e));
                }
            }
        }

        let options = InstallOptions {
            run_tests: !self.skip_tests,
            ..InstallOptions::default()
        };
        let (event_tx, event_rx) = broadcast::channel(EVENT_CAPACITY);
        let status_handle = tokio::spawn(status::handle_events(event_rx));

        // Independent recipes install concurrently, each as its own task.
        let handles: Vec<_> = recipes
            .into_iter()
            .map(|recipe| {
                let config = config.clone();
                let cache = Arc::clone(&cache);
                let options = options.clone();
                let event_tx = event_tx.clone();
                tokio::spawn(async move {
                    run_install(recipe, &config, &cache, &options, &event_tx).await
                })
            })
            .collect();
        drop(event_tx);

        let mut runs = Vec::with_capacity(handles.len());
        for joined in futures::future::join_all(handles).await {
            match joined {
                Ok(run) => runs.push(run),
                Err(e) => errors.push((
                    "<task>".to_string(),
                    SprigError::Generic(format!("install task panicked: {e}")),
                )),
            }
        }
        if let Err(e) = status_handle.await {
            debug!("Status display task ended abnormally: {}", e);
        }

        for run in &runs {
            print_run_summary(run);
            if let Some(outcome) = run.first_failure() {
                if let Some(err) = outcome.status.error() {
                    if many {
                        report_error(err);
                    }
                    errors.push((run.recipe.name.clone(), err.clone()));
                }
            }
        }

        if errors.is_empty() {
            return Ok(());
        }
        if !many {
            return Err(errors.remove(0).1);
        }
        Err(SprigError::Generic(format!(
            "{} of {} recipes did not install cleanly: {}",
            errors.len(),
            self.names.len(),
            errors
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

fn print_run_summary(run: &InstallationRun) {
    let name = &run.recipe.name;
    for outcome in &run.configure_outcomes {
        let action = match outcome.action {
            ConfigureAction::Created => outcome.action.to_string().green(),
            ConfigureAction::Preserved => outcome.action.to_string().dimmed(),
        };
        println!("    {:<9} {}", action, outcome.path.display());
    }
    if let Some(report) = &run.test_report {
        print_test_report(report);
    }
    if let Some(caveats) = &run.caveats {
        println!("{}{}", "==> ".bold().blue(), "Caveats".bold());
        println!("{caveats}");
    }
    if run.succeeded() {
        if let Some(layout) = &run.layout {
            println!(
                "{} {} {} installed at {}",
                "✓".green().bold(),
                name.green(),
                run.recipe.version(),
                layout.program_path().display()
            );
        }
    } else if run.halted() {
        println!("{} {} was not installed", "✗".red().bold(), name.red());
    } else {
        println!(
            "{} {} {} installed with problems",
            "!".yellow().bold(),
            name.yellow(),
            run.recipe.version()
        );
    }
}
