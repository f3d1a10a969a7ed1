// sprig/src/cli/status.rs
//! Live stage lines for running installs, fed by pipeline events.

use std::time::Duration;

use colored::*;
use sprig_common::pipeline::{PipelineEvent, StageOutcome, StageStatus};
use tokio::sync::broadcast;
use tracing::debug;

fn status_label(status: &StageStatus) -> ColoredString {
    match status {
        StageStatus::Succeeded => "ok".green().bold(),
        StageStatus::Degraded(_) => "degraded".yellow().bold(),
        StageStatus::Failed(_) => "failed".red().bold(),
    }
}

fn elapsed_str(elapsed: Duration) -> String {
    if elapsed.as_millis() < 1000 {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

fn print_stage(recipe: &str, outcome: &StageOutcome) {
    let detail = match &outcome.status {
        StageStatus::Succeeded => outcome.detail.normal(),
        StageStatus::Degraded(e) => format!("{} ({})", outcome.detail, e.classification()).yellow(),
        StageStatus::Failed(e) => format!("{} ({})", outcome.detail, e.classification()).red(),
    };
    println!(
        "{}{}: {:<9} {} {} {}",
        "==> ".bold().blue(),
        recipe.cyan(),
        outcome.stage.to_string(),
        status_label(&outcome.status),
        detail,
        format!("[{}]", elapsed_str(outcome.elapsed)).dimmed()
    );
}

/// Prints events until every sender is gone.
pub async fn handle_events(mut rx: broadcast::Receiver<PipelineEvent>) {
    loop {
        match rx.recv().await {
            Ok(PipelineEvent::RunStarted { recipe, version }) => {
                println!(
                    "{}{}",
                    "==> ".bold().blue(),
                    format!("Installing {recipe} {version}").bold()
                );
            }
            Ok(PipelineEvent::StageFinished { recipe, outcome }) => print_stage(&recipe, &outcome),
            Ok(PipelineEvent::CacheHit { recipe, path }) => {
                debug!("[{}] using cached artifact {}", recipe, path.display());
            }
            Ok(PipelineEvent::RunFinished {
                recipe,
                success,
                elapsed,
            }) => {
                let label = if success {
                    "done".green().bold()
                } else {
                    "finished with problems".red().bold()
                };
                println!(
                    "{}{}: {} in {}",
                    "==> ".bold().blue(),
                    recipe.cyan(),
                    label,
                    elapsed_str(elapsed)
                );
            }
            Ok(PipelineEvent::LogWarn { message }) => {
                eprintln!("{} {}", "Warning:".yellow().bold(), message)
            }
            Ok(PipelineEvent::StageStarted { recipe, stage }) => {
                debug!("[{}] {} started", recipe, stage);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                debug!("Status display skipped {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
