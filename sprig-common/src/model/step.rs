// sprig-common/src/model/step.rs
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One entry of a recipe's `install_steps`, executed against the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InstallStep {
    /// Copies a file from the artifact into `bin/` and marks it executable.
    Bin {
        source: PathBuf,
        /// Installed command name; defaults to the source's file name.
        #[serde(default)]
        target: Option<String>,
    },
    /// Copies a file verbatim into `share/<dir>/`.
    Share {
        source: PathBuf,
        #[serde(default)]
        dir: Option<String>,
    },
    /// Creates a directory under the prefix.
    Mkdir { path: PathBuf },
    /// Writes a generated (templated) file under the prefix.
    Write { path: PathBuf, content: String },
}

impl InstallStep {
    /// Installed name of a `bin` step.
    pub fn bin_target(&self) -> Option<String> {
        match self {
            InstallStep::Bin { source, target } => target.clone().or_else(|| {
                source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            }),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InstallStep::Bin { source, .. } => format!(
                "bin {} => {}",
                source.display(),
                self.bin_target().unwrap_or_default()
            ),
            InstallStep::Share { source, dir } => match dir {
                Some(dir) => format!("share {} => share/{dir}", source.display()),
                None => format!("share {}", source.display()),
            },
            InstallStep::Mkdir { path } => format!("mkdir {}", path.display()),
            InstallStep::Write { path, .. } => format!("write {}", path.display()),
        }
    }
}

/// Home-relative state initialization run after a fresh install.
///
/// Paths may be written as `~/.tool/config` or `.tool/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostInstallStep {
    EnsureDir { path: PathBuf },
    /// Writes `content` only when nothing exists at `path` yet.
    SeedFile { path: PathBuf, content: String },
}

impl PostInstallStep {
    pub fn path(&self) -> &PathBuf {
        match self {
            PostInstallStep::EnsureDir { path } | PostInstallStep::SeedFile { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    PathExists,
    PathExecutable,
    OutputContains,
    ExitCode,
    FileContains,
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssertionKind::PathExists => "path-exists",
            AssertionKind::PathExecutable => "path-executable",
            AssertionKind::OutputContains => "output-contains",
            AssertionKind::ExitCode => "exit-code",
            AssertionKind::FileContains => "file-contains",
        };
        f.write_str(s)
    }
}

/// One acceptance check of a recipe's `test_spec`.
///
/// `path` values are relative to the prefix; `command` is looked up in
/// `prefix/bin` unless it contains a path separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    PathExists {
        path: PathBuf,
    },
    PathExecutable {
        path: PathBuf,
    },
    OutputContains {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        pattern: String,
    },
    ExitCode {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        code: i32,
    },
    FileContains {
        path: PathBuf,
        pattern: String,
    },
}

impl TestAssertion {
    pub fn kind(&self) -> AssertionKind {
        match self {
            TestAssertion::PathExists { .. } => AssertionKind::PathExists,
            TestAssertion::PathExecutable { .. } => AssertionKind::PathExecutable,
            TestAssertion::OutputContains { .. } => AssertionKind::OutputContains,
            TestAssertion::ExitCode { .. } => AssertionKind::ExitCode,
            TestAssertion::FileContains { .. } => AssertionKind::FileContains,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Steps {
        install_steps: Vec<InstallStep>,
        test_spec: Vec<TestAssertion>,
    }

    #[test]
    fn steps_deserialize_from_tagged_tables() {
        let steps: Steps = toml::from_str(
            r#"
            [[install_steps]]
            type = "bin"
            source = "pomodoro.sh"
            target = "pomodoro"

            [[install_steps]]
            type = "share"
            source = "README.md"

            [[test_spec]]
            type = "exit_code"
            command = "pomodoro"
            args = ["--help"]
            code = 0

            [[test_spec]]
            type = "path_exists"
            path = "bin/pomodoro"
            "#,
        )
        .unwrap();

        assert_eq!(steps.install_steps[0].bin_target().as_deref(), Some("pomodoro"));
        assert_eq!(steps.install_steps[1].bin_target(), None);
        assert_eq!(steps.test_spec[0].kind(), AssertionKind::ExitCode);
        assert_eq!(steps.test_spec[1].kind(), AssertionKind::PathExists);
    }

    #[test]
    fn bin_target_defaults_to_source_file_name() {
        let step = InstallStep::Bin {
            source: PathBuf::from("scripts/netty.sh"),
            target: None,
        };
        assert_eq!(step.bin_target().as_deref(), Some("netty.sh"));
        assert_eq!(step.describe(), "bin scripts/netty.sh => netty.sh");
    }
}
