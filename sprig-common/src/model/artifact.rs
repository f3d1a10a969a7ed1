// sprig-common/src/model/artifact.rs
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents an engine-owned item placed under the prefix, recorded in the receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstalledArtifact {
    /// An executable in `bin/`.
    Binary { path: PathBuf },
    /// A generated manual page.
    Manpage { path: PathBuf },
    /// Auxiliary documentation copied verbatim into `share/`.
    SharedFile { path: PathBuf },
    /// A file written by a `write` install step.
    GeneratedFile { path: PathBuf },
    /// A directory created by the engine; removed on uninstall only when empty.
    Directory { path: PathBuf },
}

impl InstalledArtifact {
    pub fn path(&self) -> &Path {
        match self {
            InstalledArtifact::Binary { path }
            | InstalledArtifact::Manpage { path }
            | InstalledArtifact::SharedFile { path }
            | InstalledArtifact::GeneratedFile { path }
            | InstalledArtifact::Directory { path } => path,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, InstalledArtifact::Directory { .. })
    }
}

/// What a completed install left behind, persisted as
/// `var/sprig/receipts/<name>.json` under the prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub program: String,
    pub source_url: String,
    pub integrity_digest: String,
    pub installed_at: DateTime<Utc>,
    #[serde(default)]
    pub artifacts: Vec<InstalledArtifact>,
}

impl InstallReceipt {
    pub fn files(&self) -> impl Iterator<Item = &InstalledArtifact> {
        self.artifacts.iter().filter(|a| !a.is_directory())
    }

    pub fn directories(&self) -> impl Iterator<Item = &InstalledArtifact> {
        self.artifacts.iter().filter(|a| a.is_directory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_json_uses_tagged_artifacts() {
        let receipt = InstallReceipt {
            name: "netty".into(),
            version: "1.0.0".into(),
            program: "netty".into(),
            source_url: "https://example.com/netty-1.0.0.tar.gz".into(),
            integrity_digest: "ab".into(),
            installed_at: DateTime::parse_from_rfc3339("2025-06-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            artifacts: vec![
                InstalledArtifact::Binary {
                    path: PathBuf::from("/p/bin/netty"),
                },
                InstalledArtifact::Directory {
                    path: PathBuf::from("/p/share/netty"),
                },
            ],
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["artifacts"][0]["type"], "binary");
        assert_eq!(json["artifacts"][1]["type"], "directory");
        assert_eq!(receipt.files().count(), 1);
        assert_eq!(receipt.directories().count(), 1);
    }
}
