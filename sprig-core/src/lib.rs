// sprig-core/src/lib.rs

// Stages of an installation run, leaf-first.
pub mod caveats;
pub mod configure;
pub mod docs;
pub mod harness;
pub mod install;
pub mod lock;
pub mod pipeline;
pub mod receipt;
pub mod template;
pub mod uninstall;
pub mod verify;

// Re-export key types for the CLI crate
pub use harness::{AssertionResult, FailureKind, OverallStatus, TestReport};
pub use install::InstalledLayout;
pub use pipeline::{run_install, run_installed_tests, InstallOptions, InstallationRun};
pub use template::TemplateVars;
pub use uninstall::{uninstall, UninstallReport};
