// sprig-common/src/model/mod.rs
// Declares the modules within the model directory.

pub mod artifact;
pub mod manpage;
pub mod recipe;
pub mod step;

// Re-export
pub use artifact::{InstallReceipt, InstalledArtifact};
pub use manpage::{ExitStatusEntry, ManEntry, ManPage, ManSection, SectionAnchor};
pub use recipe::{Platform, Recipe, SourceLocation};
pub use step::{AssertionKind, InstallStep, PostInstallStep, TestAssertion};
