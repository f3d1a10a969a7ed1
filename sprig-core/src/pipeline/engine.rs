// sprig-core/src/pipeline/engine.rs
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sprig_common::cache::Cache;
use sprig_common::config::Config;
use sprig_common::error::{Result, SprigError};
use sprig_common::formulary::Formulary;
use sprig_common::model::{InstalledArtifact, Recipe};
use sprig_common::pipeline::{PipelineEvent, Stage, StageOutcome, StageStatus};
use sprig_common::receipt::ReceiptRegistry;
use sprig_net::fetch_artifact;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use super::{InstallOptions, InstallationRun};
use crate::caveats::render_caveats;
use crate::configure::{configure, ConfigureAction};
use crate::docs::write_manpage;
use crate::harness::{run_tests, HarnessEnv, TestReport};
use crate::install::{check_preconditions, install, stage_artifact, InstalledLayout};
use crate::lock::InstallLock;
use crate::receipt::{prune_stale, write_receipt};
use crate::template::TemplateVars;
use crate::verify::verify_artifact;

/// Sends stage events and appends outcomes to the run log.
struct StageReporter<'a> {
    recipe: String,
    events: &'a broadcast::Sender<PipelineEvent>,
}

impl StageReporter<'_> {
    fn send(&self, event: PipelineEvent) {
        // No subscribers is fine; the run log is authoritative.
        let _ = self.events.send(event);
    }

    fn start(&self, stage: Stage) -> Instant {
        debug!("[{}] {} started", self.recipe, stage);
        self.send(PipelineEvent::StageStarted {
            recipe: self.recipe.clone(),
            stage,
        });
        Instant::now()
    }

    fn finish(
        &self,
        run: &mut InstallationRun,
        stage: Stage,
        started: Instant,
        status: StageStatus,
        detail: impl Into<String>,
    ) {
        let outcome = StageOutcome {
            stage,
            status,
            detail: detail.into(),
            elapsed: started.elapsed(),
        };
        match &outcome.status {
            StageStatus::Succeeded => debug!("[{}] {} ok: {}", self.recipe, stage, outcome.detail),
            StageStatus::Degraded(e) => warn!("[{}] {} degraded: {}", self.recipe, stage, e),
            StageStatus::Failed(e) => error!("[{}] {} failed: {}", self.recipe, stage, e),
        }
        self.send(PipelineEvent::stage_finished(&self.recipe, &outcome));
        run.outcomes.push(outcome);
    }

    fn warn(&self, message: String) {
        warn!("[{}] {}", self.recipe, message);
        self.send(PipelineEvent::LogWarn {
            message: format!("{}: {message}", self.recipe),
        });
    }

    /// Records a failed stage; the caller stops the run.
    fn fail(&self, run: &mut InstallationRun, stage: Stage, started: Instant, err: SprigError) {
        let detail = err.to_string();
        self.finish(run, stage, started, StageStatus::Failed(Arc::new(err)), detail);
    }
}

/// Runs every stage for `recipe`, halting at the first failed required stage.
///
/// Never returns an error: the outcome of each stage, including the one that
/// stopped the run, is in the returned [`InstallationRun`].
#[instrument(skip_all, fields(recipe = %recipe.name))]
pub async fn run_install(
    recipe: Arc<Recipe>,
    config: &Config,
    cache: &Cache,
    options: &InstallOptions,
    events: &broadcast::Sender<PipelineEvent>,
) -> InstallationRun {
    let run_started = Instant::now();
    let reporter = StageReporter {
        recipe: recipe.name.clone(),
        events,
    };
    let mut run = InstallationRun::new(Arc::clone(&recipe));
    reporter.send(PipelineEvent::RunStarted {
        recipe: recipe.name.clone(),
        version: recipe.version().to_string(),
    });

    let lock_started = Instant::now();
    match InstallLock::acquire(config, &recipe.name).await {
        Ok(_lock) => {
            drive(&mut run, &reporter, config, cache, options).await;
        }
        Err(e) => reporter.fail(&mut run, Stage::Engine, lock_started, e),
    }

    let success = run.succeeded();
    let elapsed = run_started.elapsed();
    info!(
        "{} {} {} in {:.1}s",
        recipe.name,
        recipe.version(),
        if success {
            "installed"
        } else if run.halted() {
            "failed"
        } else {
            "installed with problems"
        },
        elapsed.as_secs_f64()
    );
    reporter.send(PipelineEvent::RunFinished {
        recipe: recipe.name.clone(),
        success,
        elapsed,
    });
    run
}

/// The stage sequence proper, run while the install lock is held.
async fn drive(
    run: &mut InstallationRun,
    reporter: &StageReporter<'_>,
    config: &Config,
    cache: &Cache,
    options: &InstallOptions,
) {
    let recipe = Arc::clone(&run.recipe);
    let vars = TemplateVars::for_recipe(&recipe, options.render_time).with_locations(config);

    // Fetch
    let started = reporter.start(Stage::Fetch);
    let fetched = match fetch_artifact(
        &recipe.name,
        &recipe.source,
        &recipe.integrity_digest,
        cache,
        config,
    )
    .await
    {
        Ok(f) => f,
        Err(e) => return reporter.fail(run, Stage::Fetch, started, e),
    };
    if fetched.cache_hit {
        reporter.send(PipelineEvent::CacheHit {
            recipe: recipe.name.clone(),
            path: fetched.path.clone(),
        });
    }
    let detail = format!(
        "{} {}",
        if fetched.cache_hit { "cached" } else { "downloaded" },
        fetched.path.display()
    );
    run.artifact_path = Some(fetched.path.clone());
    reporter.finish(run, Stage::Fetch, started, StageStatus::Succeeded, detail);

    // Verify
    let started = reporter.start(Stage::Verify);
    if let Err(e) = verify_artifact(&fetched.path, &recipe.integrity_digest, cache).await {
        run.artifact_path = None;
        return reporter.fail(run, Stage::Verify, started, e);
    }
    reporter.finish(
        run,
        Stage::Verify,
        started,
        StageStatus::Succeeded,
        format!("sha256 {}", short_digest(&recipe.integrity_digest)),
    );

    // Install
    let started = reporter.start(Stage::Install);
    let registry = ReceiptRegistry::new(config.clone());
    if let Err(e) = check_preconditions(&recipe, options.platform, &registry) {
        return reporter.fail(run, Stage::Install, started, e);
    }
    let previous = match registry.get_receipt(&recipe.name) {
        Ok(r) => r,
        Err(e) => {
            reporter.warn(format!("ignoring unreadable receipt: {e}"));
            None
        }
    };
    let staged = match stage_artifact(&fetched.path, &recipe, config).await {
        Ok(s) => s,
        Err(e) => return reporter.fail(run, Stage::Install, started, e),
    };
    let mut layout = match install(&staged.root, &recipe, config, &vars) {
        Ok(l) => l,
        Err(e) => return reporter.fail(run, Stage::Install, started, e),
    };
    drop(staged);
    let detail = format!(
        "{} steps, {} artifacts under {}",
        recipe.install_steps.len(),
        layout.artifacts.len(),
        layout.prefix.display()
    );
    reporter.finish(run, Stage::Install, started, StageStatus::Succeeded, detail);

    // Configure: a failure leaves a usable install, so the run goes on.
    let started = reporter.start(Stage::Configure);
    match configure(&recipe, config.home_dir(), &vars) {
        Ok(outcomes) => {
            let created = outcomes
                .iter()
                .filter(|o| o.action == ConfigureAction::Created)
                .count();
            let detail = if outcomes.is_empty() {
                "nothing to configure".to_string()
            } else {
                format!("{created} created, {} preserved", outcomes.len() - created)
            };
            run.configure_outcomes = outcomes;
            reporter.finish(run, Stage::Configure, started, StageStatus::Succeeded, detail);
        }
        Err(e) => {
            let detail = e.to_string();
            reporter.finish(
                run,
                Stage::Configure,
                started,
                StageStatus::Degraded(Arc::new(e)),
                detail,
            );
        }
    }

    // Document
    let started = reporter.start(Stage::Document);
    match recipe.manpage.as_ref() {
        Some(page) => match write_manpage(page, &recipe, config, options.render_time) {
            Ok(path) => {
                layout.record(InstalledArtifact::Manpage { path: path.clone() });
                let detail = path.display().to_string();
                run.manpage_path = Some(path);
                reporter.finish(run, Stage::Document, started, StageStatus::Succeeded, detail);
            }
            Err(e) => {
                run.layout = Some(layout);
                return reporter.fail(run, Stage::Document, started, e);
            }
        },
        None => reporter.finish(
            run,
            Stage::Document,
            started,
            StageStatus::Succeeded,
            "no manual page declared",
        ),
    }

    // Receipt
    let started = Instant::now();
    if let Some(previous) = &previous {
        if let Err(e) = prune_stale(previous, &layout.artifacts, config.prefix()) {
            reporter.warn(format!(
                "could not remove files left by {} {}: {e}",
                previous.name, previous.version
            ));
        }
    }
    match write_receipt(&recipe, &layout, config, Utc::now()) {
        Ok(path) => run.receipt_path = Some(path),
        Err(e) => {
            run.layout = Some(layout);
            return reporter.fail(run, Stage::Engine, started, e);
        }
    }

    // Test
    if options.run_tests {
        let started = reporter.start(Stage::Test);
        if recipe.test_spec.is_empty() {
            reporter.finish(
                run,
                Stage::Test,
                started,
                StageStatus::Succeeded,
                "no checks declared",
            );
        } else {
            let report = run_tests(
                &recipe.name,
                &recipe.test_spec,
                &layout,
                &vars,
                &HarnessEnv::from_config(config),
            )
            .await;
            let detail = format!(
                "{} of {} checks passed",
                report.results.len() - report.failed_count(),
                report.results.len()
            );
            let status = match report.to_error() {
                None => StageStatus::Succeeded,
                Some(e) => StageStatus::Degraded(Arc::new(e)),
            };
            run.test_report = Some(report);
            reporter.finish(run, Stage::Test, started, status, detail);
        }
    } else {
        debug!("[{}] Skipping acceptance checks", recipe.name);
    }
    run.layout = Some(layout);

    // Caveats
    let started = reporter.start(Stage::Caveats);
    run.caveats = render_caveats(&recipe, &vars);
    let detail = match &run.caveats {
        Some(text) => format!("{} lines", text.lines().count()),
        None => "none".to_string(),
    };
    reporter.finish(run, Stage::Caveats, started, StageStatus::Succeeded, detail);
}

/// Re-runs the acceptance checks of an installed recipe.
///
/// The recipe must have a receipt; checks run against what the receipt
/// recorded, with the recipe's current `test_spec`.
pub async fn run_installed_tests(
    name: &str,
    config: &Config,
    formulary: &Formulary,
    render_time: DateTime<Utc>,
) -> Result<TestReport> {
    let receipt = ReceiptRegistry::new(config.clone())
        .get_receipt(name)?
        .ok_or_else(|| SprigError::NotFound(format!("'{name}' is not installed")))?;
    let recipe = formulary.load_recipe(name)?;
    if recipe.version() != receipt.version {
        warn!(
            "'{}' is installed at {} but the recipe declares {}",
            name,
            receipt.version,
            recipe.version()
        );
    }
    let layout = InstalledLayout::from_receipt(&receipt, config);
    let vars = TemplateVars::for_recipe(&recipe, render_time).with_locations(config);
    Ok(run_tests(
        name,
        &recipe.test_spec,
        &layout,
        &vars,
        &HarnessEnv::from_config(config),
    )
    .await)
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
