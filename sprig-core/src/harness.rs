// sprig-core/src/harness.rs
//! Acceptance checks against an installed recipe.
//!
//! Every assertion runs, whatever happened to the ones before it, and the
//! report says which failed and why. A failing report never undoes the install.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use sprig_aio::fs::{contained_join, is_executable};
use sprig_aio::process::{run_command_with_timeout, CommandOutcome};
use sprig_common::config::Config;
use sprig_common::error::SprigError;
use sprig_common::model::{AssertionKind, TestAssertion};
use tracing::{debug, info, warn};

use crate::install::InstalledLayout;
use crate::template::TemplateVars;

const SNIPPET_LEN: usize = 60;

/// Why an assertion did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The check ran and the observed value was wrong.
    Mismatch,
    TimedOut,
    SpawnFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Mismatch => f.write_str("mismatch"),
            FailureKind::TimedOut => f.write_str("timed_out"),
            FailureKind::SpawnFailed => f.write_str("spawn_failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssertionResult {
    pub kind: AssertionKind,
    /// What was checked, e.g. `pomodoro --help` or `bin/pomodoro`.
    pub subject: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
    pub failure: Option<FailureKind>,
}

impl AssertionResult {
    fn pass(kind: AssertionKind, subject: String, expected: String, actual: String) -> Self {
        Self {
            kind,
            subject,
            expected,
            actual,
            passed: true,
            failure: None,
        }
    }

    fn fail(
        kind: AssertionKind,
        subject: String,
        expected: String,
        actual: String,
        failure: FailureKind,
    ) -> Self {
        Self {
            kind,
            subject,
            expected,
            actual,
            passed: false,
            failure: Some(failure),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Pass,
    Fail,
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Pass => f.write_str("pass"),
            OverallStatus::Fail => f.write_str("fail"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestReport {
    pub recipe: String,
    pub results: Vec<AssertionResult>,
    pub overall_status: OverallStatus,
}

impl TestReport {
    fn new(recipe: &str, results: Vec<AssertionResult>) -> Self {
        let overall_status = if results.iter().all(|r| r.passed) {
            OverallStatus::Pass
        } else {
            OverallStatus::Fail
        };
        Self {
            recipe: recipe.to_string(),
            results,
            overall_status,
        }
    }

    pub fn passed(&self) -> bool {
        self.overall_status == OverallStatus::Pass
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Summary error for a failing report; `None` when everything passed.
    pub fn to_error(&self) -> Option<SprigError> {
        (!self.passed()).then(|| SprigError::TestAssertionFailed {
            failed: self.failed_count(),
            total: self.results.len(),
        })
    }
}

/// Environment the checks run in.
#[derive(Debug, Clone)]
pub struct HarnessEnv {
    /// Exported as `HOME` to every subprocess.
    pub home: PathBuf,
    pub timeout: Duration,
}

impl HarnessEnv {
    pub fn from_config(config: &Config) -> Self {
        Self {
            home: config.home_dir().to_path_buf(),
            timeout: config.test_timeout,
        }
    }
}

/// Runs every assertion of `test_spec` against `layout`.
pub async fn run_tests(
    recipe_name: &str,
    test_spec: &[TestAssertion],
    layout: &InstalledLayout,
    vars: &TemplateVars,
    env: &HarnessEnv,
) -> TestReport {
    let mut results = Vec::with_capacity(test_spec.len());
    for assertion in test_spec {
        let result = run_assertion(assertion, layout, vars, env).await;
        if result.passed {
            debug!("[{}] {} {}: ok", recipe_name, result.kind, result.subject);
        } else {
            warn!(
                "[{}] {} {} failed: expected {}, got {}",
                recipe_name, result.kind, result.subject, result.expected, result.actual
            );
        }
        results.push(result);
    }
    let report = TestReport::new(recipe_name, results);
    info!(
        "[{}] {} of {} checks passed",
        recipe_name,
        report.results.len() - report.failed_count(),
        report.results.len()
    );
    report
}

async fn run_assertion(
    assertion: &TestAssertion,
    layout: &InstalledLayout,
    vars: &TemplateVars,
    env: &HarnessEnv,
) -> AssertionResult {
    let kind = assertion.kind();
    match assertion {
        TestAssertion::PathExists { path } => {
            let subject = vars.render(&path.to_string_lossy());
            let expected = "exists".to_string();
            match prefix_path(layout, &subject) {
                Ok(p) if p.symlink_metadata().is_ok() => {
                    AssertionResult::pass(kind, subject, expected.clone(), expected)
                }
                Ok(_) => AssertionResult::fail(
                    kind,
                    subject,
                    expected,
                    "missing".into(),
                    FailureKind::Mismatch,
                ),
                Err(reason) => {
                    AssertionResult::fail(kind, subject, expected, reason, FailureKind::Mismatch)
                }
            }
        }
        TestAssertion::PathExecutable { path } => {
            let subject = vars.render(&path.to_string_lossy());
            let expected = "executable".to_string();
            let actual = match prefix_path(layout, &subject) {
                Ok(p) if is_executable(&p) => {
                    return AssertionResult::pass(kind, subject, expected.clone(), expected)
                }
                Ok(p) if p.exists() => "not executable".to_string(),
                Ok(_) => "missing".to_string(),
                Err(reason) => reason,
            };
            AssertionResult::fail(kind, subject, expected, actual, FailureKind::Mismatch)
        }
        TestAssertion::FileContains { path, pattern } => {
            let subject = vars.render(&path.to_string_lossy());
            let pattern = vars.render(pattern);
            let expected = format!("contains \"{pattern}\"");
            let content = match prefix_path(layout, &subject) {
                Ok(p) => tokio::fs::read(&p).await.map_err(|e| e.to_string()),
                Err(reason) => Err(reason),
            };
            match content {
                Ok(bytes) if String::from_utf8_lossy(&bytes).contains(&pattern) => {
                    AssertionResult::pass(kind, subject, expected, "found".into())
                }
                Ok(_) => AssertionResult::fail(
                    kind,
                    subject,
                    expected,
                    "not found".into(),
                    FailureKind::Mismatch,
                ),
                Err(reason) => AssertionResult::fail(
                    kind,
                    subject,
                    expected,
                    format!("unreadable: {reason}"),
                    FailureKind::Mismatch,
                ),
            }
        }
        TestAssertion::OutputContains {
            command,
            args,
            pattern,
        } => {
            let pattern = vars.render(pattern);
            let expected = format!("contains \"{pattern}\"");
            let (subject, outcome) = run_check_command(command, args, layout, vars, env).await;
            match outcome {
                Ok(output) => {
                    let combined = combined_output(&output);
                    if combined.contains(&pattern) {
                        AssertionResult::pass(kind, subject, expected, "found".into())
                    } else {
                        let actual = format!("output: {}", snippet(&combined));
                        AssertionResult::fail(kind, subject, expected, actual, FailureKind::Mismatch)
                    }
                }
                Err((actual, failure)) => {
                    AssertionResult::fail(kind, subject, expected, actual, failure)
                }
            }
        }
        TestAssertion::ExitCode {
            command,
            args,
            code,
        } => {
            let expected = format!("exit {code}");
            let (subject, outcome) = run_check_command(command, args, layout, vars, env).await;
            match outcome {
                Ok(output) => match output.status.code() {
                    Some(actual) if actual == *code => {
                        AssertionResult::pass(kind, subject, expected, format!("exit {actual}"))
                    }
                    Some(actual) => AssertionResult::fail(
                        kind,
                        subject,
                        expected,
                        format!("exit {actual}"),
                        FailureKind::Mismatch,
                    ),
                    None => AssertionResult::fail(
                        kind,
                        subject,
                        expected,
                        "terminated by signal".into(),
                        FailureKind::Mismatch,
                    ),
                },
                Err((actual, failure)) => {
                    AssertionResult::fail(kind, subject, expected, actual, failure)
                }
            }
        }
    }
}

type CheckOutput = std::result::Result<std::process::Output, (String, FailureKind)>;

async fn run_check_command(
    command: &str,
    args: &[String],
    layout: &InstalledLayout,
    vars: &TemplateVars,
    env: &HarnessEnv,
) -> (String, CheckOutput) {
    let command = vars.render(command);
    let args: Vec<String> = args.iter().map(|a| vars.render(a)).collect();
    let subject = if args.is_empty() {
        command.clone()
    } else {
        format!("{command} {}", args.join(" "))
    };

    let program = match resolve_command(layout, &command) {
        Ok(p) => p,
        Err(reason) => return (subject, Err((reason, FailureKind::SpawnFailed))),
    };

    let mut envs = HashMap::new();
    envs.insert("HOME".to_string(), env.home.display().to_string());
    let path = std::env::var("PATH").unwrap_or_default();
    envs.insert(
        "PATH".to_string(),
        format!("{}:{}", layout.bin_dir.display(), path),
    );

    let outcome =
        match run_command_with_timeout(&program, &args, &envs, Some(&layout.prefix), env.timeout)
            .await
        {
            Ok(CommandOutcome::Completed(output)) => Ok(output),
            Ok(CommandOutcome::TimedOut) => Err((
                format!("timed out after {}", humanize(env.timeout)),
                FailureKind::TimedOut,
            )),
            Err(e) => Err((format!("could not run: {e}"), FailureKind::SpawnFailed)),
        };
    (subject, outcome)
}

/// Bare names are looked up in `prefix/bin`; relative paths are
/// prefix-relative; absolute paths are used as-is.
fn resolve_command(layout: &InstalledLayout, command: &str) -> std::result::Result<PathBuf, String> {
    let path = Path::new(command);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else if command.contains('/') {
        prefix_path(layout, command)
    } else if command.is_empty() {
        Err("empty command".to_string())
    } else {
        Ok(layout.bin_dir.join(command))
    }
}

fn prefix_path(layout: &InstalledLayout, relative: &str) -> std::result::Result<PathBuf, String> {
    contained_join(&layout.prefix, Path::new(relative)).map_err(|e| e.to_string())
}

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn snippet(text: &str) -> String {
    let first = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if first.is_empty() {
        return "(empty)".to_string();
    }
    let mut s: String = first.chars().take(SNIPPET_LEN).collect();
    if first.chars().count() > SNIPPET_LEN {
        s.push('…');
    }
    s
}

fn humanize(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use chrono::{TimeZone, Utc};
    use sprig_common::model::Recipe;

    use super::*;

    const SCRIPT: &str = r#"#!/bin/sh
case "$1" in
  --help) echo "Usage: tool [OPTIONS]"; echo "Tool v1.0.0"; exit 0 ;;
  --home) echo "home=$HOME"; exit 0 ;;
  --warn) echo "warning on stderr" >&2; exit 0 ;;
  --sleep) sleep 5; exit 0 ;;
  --bad-flag) echo "Unknown option: $1" >&2; exit 1 ;;
  *) exit 0 ;;
esac
"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: InstalledLayout,
        vars: TemplateVars,
        env: HarnessEnv,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_paths(
            dir.path().join("prefix"),
            dir.path().join("cache"),
            dir.path().join("recipes"),
            dir.path().join("home"),
        );
        fs::create_dir_all(config.bin_dir()).unwrap();
        fs::create_dir_all(config.home_dir()).unwrap();
        let bin = config.bin_dir().join("tool");
        fs::write(&bin, SCRIPT).unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(config.bin_dir().join("plain"), "data").unwrap();
        fs::create_dir_all(config.man_dir(1)).unwrap();
        fs::write(config.man_dir(1).join("tool.1"), ".TH TOOL 1\nTool manual\n").unwrap();

        let recipe = Recipe::from_toml_str(
            "t",
            r#"
            name = "tool"
            sha256 = "ab"
            [source]
            url = "https://example.com/tool-1.0.0.tar.gz"
            "#,
        )
        .unwrap();
        let vars = TemplateVars::for_recipe(&recipe, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        Fixture {
            env: HarnessEnv {
                home: config.home_dir().to_path_buf(),
                timeout: Duration::from_secs(10),
            },
            layout: InstalledLayout::for_recipe(&recipe, &config),
            vars,
            _dir: dir,
        }
    }

    fn checks_from(toml_text: &str) -> Vec<TestAssertion> {
        #[derive(serde::Deserialize)]
        struct Spec {
            test: Vec<TestAssertion>,
        }
        toml::from_str::<Spec>(toml_text).unwrap().test
    }

    #[tokio::test]
    async fn passing_suite_reports_pass() {
        let fx = fixture();
        let checks = checks_from(
            r#"
            [[test]]
            type = "path_exists"
            path = "bin/{{program}}"
            [[test]]
            type = "path_executable"
            path = "bin/tool"
            [[test]]
            type = "output_contains"
            command = "tool"
            args = ["--help"]
            pattern = "Usage"
            [[test]]
            type = "output_contains"
            command = "tool"
            args = ["--help"]
            pattern = "Tool v{{version}}"
            [[test]]
            type = "exit_code"
            command = "tool"
            args = ["--help"]
            code = 0
            [[test]]
            type = "file_contains"
            path = "share/man/man1/tool.1"
            pattern = "Tool manual"
            "#,
        );
        let report = run_tests("tool", &checks, &fx.layout, &fx.vars, &fx.env).await;
        assert_eq!(report.overall_status, OverallStatus::Pass, "{report:#?}");
        assert_eq!(report.results.len(), 6);
        assert!(report.to_error().is_none());
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let fx = fixture();
        let checks = checks_from(
            r#"
            [[test]]
            type = "exit_code"
            command = "tool"
            args = ["--help"]
            code = 0
            [[test]]
            type = "exit_code"
            command = "tool"
            args = ["--version"]
            code = 1
            [[test]]
            type = "output_contains"
            command = "tool"
            args = ["--help"]
            pattern = "Usage"
            "#,
        );
        let report = run_tests("tool", &checks, &fx.layout, &fx.vars, &fx.env).await;
        assert_eq!(report.overall_status, OverallStatus::Fail);
        assert_eq!(report.failed_count(), 1);
        let failed = &report.results[1];
        assert!(!failed.passed);
        assert_eq!(failed.expected, "exit 1");
        assert_eq!(failed.actual, "exit 0");
        assert_eq!(failed.failure, Some(FailureKind::Mismatch));
        assert!(report.results[2].passed);
        assert!(matches!(
            report.to_error(),
            Some(SprigError::TestAssertionFailed { failed: 1, total: 3 })
        ));
    }

    #[tokio::test]
    async fn stderr_counts_and_home_is_exported() {
        let fx = fixture();
        let checks = checks_from(
            r#"
            [[test]]
            type = "output_contains"
            command = "tool"
            args = ["--warn"]
            pattern = "warning on stderr"
            [[test]]
            type = "output_contains"
            command = "tool"
            args = ["--bad-flag"]
            pattern = "Unknown option"
            [[test]]
            type = "exit_code"
            command = "tool"
            args = ["--bad-flag"]
            code = 1
            "#,
        );
        let mut checks = checks;
        checks.push(TestAssertion::OutputContains {
            command: "tool".into(),
            args: vec!["--home".into()],
            pattern: format!("home={}", fx.env.home.display()),
        });
        let report = run_tests("tool", &checks, &fx.layout, &fx.vars, &fx.env).await;
        assert!(report.passed(), "{report:#?}");
    }

    #[tokio::test]
    async fn failure_kinds_are_distinguished() {
        let mut fx = fixture();
        fx.env.timeout = Duration::from_millis(300);
        let checks = checks_from(
            r#"
            [[test]]
            type = "exit_code"
            command = "tool"
            args = ["--sleep"]
            code = 0
            [[test]]
            type = "exit_code"
            command = "missing-tool"
            code = 0
            [[test]]
            type = "path_executable"
            path = "bin/plain"
            [[test]]
            type = "path_exists"
            path = "../escape"
            [[test]]
            type = "file_contains"
            path = "share/man/man1/tool.1"
            pattern = "absent text"
            "#,
        );
        let report = run_tests("tool", &checks, &fx.layout, &fx.vars, &fx.env).await;
        let failures: Vec<_> = report.results.iter().map(|r| r.failure).collect();
        assert_eq!(
            failures,
            vec![
                Some(FailureKind::TimedOut),
                Some(FailureKind::SpawnFailed),
                Some(FailureKind::Mismatch),
                Some(FailureKind::Mismatch),
                Some(FailureKind::Mismatch),
            ]
        );
        assert_eq!(report.results[0].actual, "timed out after 300ms");
        assert_eq!(report.results[2].actual, "not executable");
        assert_eq!(report.failed_count(), 5);
    }

    #[test]
    fn snippets_are_short() {
        assert_eq!(snippet("\n\n  hello world \nsecond"), "hello world");
        assert_eq!(snippet(""), "(empty)");
        assert_eq!(snippet(&"x".repeat(100)).chars().count(), SNIPPET_LEN + 1);
    }
}
