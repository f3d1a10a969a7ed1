// sprig-aio/src/lib.rs
//! IO primitives for sprig (filesystem, json, checksums, archives, processes)

// Declare modules
pub mod checksum;
pub mod extract;
pub mod fs;
pub mod json_io;
pub mod process;

// Re-export the primary functions
pub use checksum::{digests_match, sha256_file, sha256_file_async, verify_checksum_async};
pub use extract::{extract_artifact, extract_artifact_async, ArchiveKind};
pub use fs::{atomic_write_file, ensure_dir, install_file, seed_file, SeedOutcome};
pub use json_io::{read_json, write_json_atomic};
pub use process::{run_command_with_timeout, CommandOutcome};
