// sprig-common/src/lib.rs
pub mod cache;
pub mod config;
pub mod error;
pub mod formulary;
pub mod model;
pub mod pipeline;
pub mod receipt;

// Re-export key types
pub use cache::Cache;
pub use config::Config;
pub use error::{Result, SprigError};
pub use formulary::Formulary;
pub use model::{InstallReceipt, InstalledArtifact, Platform, Recipe};
pub use pipeline::{PipelineEvent, Stage, StageOutcome, StageStatus};
pub use receipt::ReceiptRegistry;
