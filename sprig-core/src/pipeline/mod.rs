// sprig-core/src/pipeline/mod.rs
//! One installation run: stage sequencing, the result log and run options.

pub mod engine;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sprig_common::model::{Platform, Recipe};
use sprig_common::pipeline::{StageOutcome, StageStatus};

pub use engine::{run_install, run_installed_tests};

use crate::configure::ConfigureOutcome;
use crate::harness::TestReport;
use crate::install::InstalledLayout;

#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Feeds `{{date}}`, `{{year}}` and `{{timestamp}}`; fixed per run so
    /// everything rendered in it agrees.
    pub render_time: DateTime<Utc>,
    /// `None` when the host OS is not one recipes can name.
    pub platform: Option<Platform>,
    pub run_tests: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            render_time: Utc::now(),
            platform: Platform::current(),
            run_tests: true,
        }
    }
}

/// Everything one `install` of one recipe produced, in stage order.
#[derive(Debug, Clone)]
pub struct InstallationRun {
    pub recipe: Arc<Recipe>,
    pub artifact_path: Option<PathBuf>,
    pub layout: Option<InstalledLayout>,
    pub configure_outcomes: Vec<ConfigureOutcome>,
    pub manpage_path: Option<PathBuf>,
    pub receipt_path: Option<PathBuf>,
    pub test_report: Option<TestReport>,
    pub caveats: Option<String>,
    pub outcomes: Vec<StageOutcome>,
}

impl InstallationRun {
    pub fn new(recipe: Arc<Recipe>) -> Self {
        Self {
            recipe,
            artifact_path: None,
            layout: None,
            configure_outcomes: Vec::new(),
            manpage_path: None,
            receipt_path: None,
            test_report: None,
            caveats: None,
            outcomes: Vec::new(),
        }
    }

    /// True only when every stage that ran succeeded outright.
    pub fn succeeded(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.status.is_success())
    }

    /// A required stage failed and later stages were skipped.
    pub fn halted(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o.status, StageStatus::Failed(_)))
    }

    /// The first stage that did not succeed, failed or degraded.
    pub fn first_failure(&self) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| !o.status.is_success())
    }
}
