use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::pipeline::Stage;

/// Why a fetch failed. Timeouts and refused connections are kept apart so the
/// operator can tell a slow mirror from a dead one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The server answered with a non-2xx status.
    Status(u16),
    TimedOut,
    /// DNS failure, refused connection or reset before a response arrived.
    Unreachable,
    InvalidUrl,
    /// A `file://` source that does not exist.
    MissingLocal,
    Transport,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Status(code) => write!(f, "HTTP {code}"),
            FetchErrorKind::TimedOut => write!(f, "timed out"),
            FetchErrorKind::Unreachable => write!(f, "host unreachable"),
            FetchErrorKind::InvalidUrl => write!(f, "invalid url"),
            FetchErrorKind::MissingLocal => write!(f, "local file missing"),
            FetchErrorKind::Transport => write!(f, "transport error"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum SprigError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Recipe Error in {0}: {1}")]
    RecipeLoad(String, String),

    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("Fetch failed for '{url}' ({kind}): {detail}")]
    Fetch {
        url: String,
        kind: FetchErrorKind,
        detail: String,
    },

    #[error("Digest mismatch for {}: expected {expected}, got {actual}", path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("'{recipe}' cannot be installed on {current} (allowed: {allowed})")]
    PlatformUnsupported {
        recipe: String,
        current: String,
        allowed: String,
    },

    #[error("'{recipe}' requires '{dependency}', which is not installed")]
    DependencyMissing { recipe: String, dependency: String },

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    #[error("Install step {index} ({step}) failed: {reason}")]
    Install {
        index: usize,
        step: String,
        reason: String,
    },

    #[error("Post-install action on {} failed: {reason}", path.display())]
    Configure { path: PathBuf, reason: String },

    #[error("{failed} of {total} acceptance checks failed")]
    TestAssertionFailed { failed: usize, total: usize },

    #[error("Lock Error: {0}")]
    Lock(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl SprigError {
    /// The pipeline stage an error is attributed to when reported.
    pub fn stage(&self) -> Stage {
        match self {
            SprigError::RecipeLoad(..) | SprigError::NotFound(_) | SprigError::Toml(_) => {
                Stage::Load
            }
            SprigError::Fetch { .. } | SprigError::Http(_) => Stage::Fetch,
            SprigError::DigestMismatch { .. } => Stage::Verify,
            SprigError::PlatformUnsupported { .. }
            | SprigError::DependencyMissing { .. }
            | SprigError::Extract(_)
            | SprigError::Install { .. }
            | SprigError::Lock(_) => Stage::Install,
            SprigError::Configure { .. } => Stage::Configure,
            SprigError::TestAssertionFailed { .. } => Stage::Test,
            SprigError::Io(_)
            | SprigError::Json(_)
            | SprigError::Config(_)
            | SprigError::Generic(_) => Stage::Engine,
        }
    }

    /// Short machine-friendly classification printed ahead of the message.
    pub fn classification(&self) -> &'static str {
        match self {
            SprigError::Io(_) => "io",
            SprigError::Http(_) | SprigError::Fetch { .. } => "fetch",
            SprigError::Json(_) | SprigError::Toml(_) | SprigError::RecipeLoad(..) => "recipe",
            SprigError::Config(_) => "config",
            SprigError::NotFound(_) => "not-found",
            SprigError::DigestMismatch { .. } => "digest-mismatch",
            SprigError::PlatformUnsupported { .. } => "platform-unsupported",
            SprigError::DependencyMissing { .. } => "dependency-missing",
            SprigError::Extract(_) | SprigError::Install { .. } => "install",
            SprigError::Configure { .. } => "configure",
            SprigError::TestAssertionFailed { .. } => "test",
            SprigError::Lock(_) => "lock",
            SprigError::Generic(_) => "error",
        }
    }
}

impl From<std::io::Error> for SprigError {
    fn from(err: std::io::Error) -> Self {
        SprigError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for SprigError {
    fn from(err: reqwest::Error) -> Self {
        SprigError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for SprigError {
    fn from(err: serde_json::Error) -> Self {
        SprigError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for SprigError {
    fn from(err: toml::de::Error) -> Self {
        SprigError::Toml(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, SprigError>;
