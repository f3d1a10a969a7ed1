// sprig-common/src/pipeline.rs
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SprigError;

// --- Shared Enums / Structs ---

/// Ordered stages of an installation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Fetch,
    Verify,
    Install,
    Configure,
    Document,
    Test,
    Caveats,
    /// Failures outside any recipe stage (config, bookkeeping).
    Engine,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Fetch => "fetch",
            Stage::Verify => "verify",
            Stage::Install => "install",
            Stage::Configure => "configure",
            Stage::Document => "document",
            Stage::Test => "test",
            Stage::Caveats => "caveats",
            Stage::Engine => "engine",
        }
    }

    /// A failed required stage halts the run; the others only degrade it.
    pub fn is_required(&self) -> bool {
        !matches!(self, Stage::Configure | Stage::Test | Stage::Caveats)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum StageStatus {
    Succeeded,
    /// Completed, but the operator should look at the detail.
    Degraded(Arc<SprigError>),
    Failed(Arc<SprigError>),
}

impl StageStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StageStatus::Succeeded)
    }

    pub fn error(&self) -> Option<&SprigError> {
        match self {
            StageStatus::Succeeded => None,
            StageStatus::Degraded(e) | StageStatus::Failed(e) => Some(e),
        }
    }
}

/// One entry of a run's result log.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
    /// Human-readable summary, e.g. the cache path or the number of steps run.
    pub detail: String,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted {
        recipe: String,
        version: String,
    },
    StageStarted {
        recipe: String,
        stage: Stage,
    },
    StageFinished {
        recipe: String,
        outcome: StageOutcome,
    },
    /// The fetcher reused a cached artifact.
    CacheHit {
        recipe: String,
        path: PathBuf,
    },
    RunFinished {
        recipe: String,
        success: bool,
        elapsed: Duration,
    },
    /// A non-fatal problem the operator should see.
    LogWarn {
        message: String,
    },
}

impl PipelineEvent {
    pub fn stage_finished(recipe: &str, outcome: &StageOutcome) -> Self {
        PipelineEvent::StageFinished {
            recipe: recipe.to_string(),
            outcome: outcome.clone(),
        }
    }
}
