// End-to-end installation runs against throwaway prefixes, with artifacts
// built on the fly and fetched through file:// URLs.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use sprig_common::model::Recipe;
use sprig_common::pipeline::{PipelineEvent, Stage, StageStatus};
use sprig_common::{Cache, Config, Formulary, Platform, ReceiptRegistry, SprigError};
use sprig_core::{
    run_install, run_installed_tests, uninstall, FailureKind, InstallOptions, InstallationRun,
    OverallStatus,
};
use tokio::sync::broadcast;

const POMO_SCRIPT: &str = r#"#!/bin/sh
case "$1" in
  --help|-h) echo "Usage: pomo [OPTIONS] [COMMAND]"; exit 0 ;;
  --version) echo "pomo 1.0.0"; exit 0 ;;
  *) exit 0 ;;
esac
"#;

const RECIPE: &str = r##"
name = "pomo"
program = "pomo"
description = "Focus timer"
homepage = "https://example.com/pomo"
license = "MIT"
sha256 = "@DIGEST@"
platform_constraint = ["macos"]
caveats = """
Configuration: ~/.{{program}}/config
Start a session with: {{program}} start
"""

[source]
url = "@URL@"

[[install_steps]]
type = "bin"
source = "pomo.sh"
target = "pomo"

[[install_steps]]
type = "share"
source = "README.md"

[[post_install_steps]]
type = "ensure_dir"
path = "~/.{{program}}"

[[post_install_steps]]
type = "seed_file"
path = "~/.{{program}}/config"
content = "WORK_TIME=25\nBREAK_TIME=5\n"

[[post_install_steps]]
type = "seed_file"
path = "~/.{{program}}/{{program}}.log"
content = "# Log started {{timestamp}}\n"

[manpage]
summary = "focus timer for the terminal"
synopsis = "[OPTIONS] [COMMAND]"
description = ["Runs focus sessions."]
options = [{ term = "-h, --help", description = "Show help" }]

[[test_spec]]
type = "path_executable"
path = "bin/pomo"

[[test_spec]]
type = "output_contains"
command = "pomo"
args = ["--help"]
pattern = "Usage"

[[test_spec]]
type = "exit_code"
command = "pomo"
args = ["--help"]
code = 0

[[test_spec]]
type = "file_contains"
path = "share/man/man1/pomo.1"
pattern = "pomo {{version}}"
"##;

struct Sandbox {
    _dir: tempfile::TempDir,
    root: PathBuf,
    config: Config,
    cache: Cache,
}

fn sandbox() -> Sandbox {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let config = Config::with_paths(
        root.join("prefix"),
        root.join("cache"),
        root.join("recipes"),
        root.join("home"),
    );
    let cache = Cache::new(&config).unwrap();
    Sandbox {
        _dir: dir,
        root,
        config,
        cache,
    }
}

/// Writes `pomo-1.0.0.tar.gz` with a single top-level directory and returns
/// its path and SHA-256.
fn build_artifact(dir: &Path) -> (PathBuf, String) {
    let path = dir.join("pomo-1.0.0.tar.gz");
    let file = fs::File::create(&path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, body, mode) in [
        ("pomo-1.0.0/pomo.sh", POMO_SCRIPT.as_bytes(), 0o755),
        ("pomo-1.0.0/README.md", b"# pomo\n".as_slice(), 0o644),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(mode);
        header.set_cksum();
        builder.append_data(&mut header, name, body).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
    let digest = hex::encode(Sha256::digest(fs::read(&path).unwrap()));
    (path, digest)
}

fn recipe_text(artifact: &Path, digest: &str) -> String {
    RECIPE
        .replace("@URL@", &format!("file://{}", artifact.display()))
        .replace("@DIGEST@", digest)
}

fn recipe_with(artifact: &Path, digest: &str, edit: impl FnOnce(String) -> String) -> Arc<Recipe> {
    let text = edit(recipe_text(artifact, digest));
    Arc::new(Recipe::from_toml_str("pomo.toml", &text).unwrap())
}

fn options() -> InstallOptions {
    InstallOptions {
        render_time: Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap(),
        platform: Some(Platform::Macos),
        run_tests: true,
    }
}

async fn install(sb: &Sandbox, recipe: Arc<Recipe>, options: &InstallOptions) -> InstallationRun {
    let (tx, _rx) = broadcast::channel(64);
    run_install(recipe, &sb.config, &sb.cache, options, &tx).await
}

fn failure_of(run: &InstallationRun) -> (Stage, SprigError) {
    let outcome = run.first_failure().expect("run should have failed");
    let err = outcome.status.error().expect("failure carries an error").clone();
    (outcome.stage, err)
}

#[tokio::test]
async fn full_install_passes_and_reports_every_stage() {
    let sb = sandbox();
    let (artifact, digest) = build_artifact(&sb.root);
    let (tx, mut rx) = broadcast::channel(64);

    let run = run_install(
        recipe_with(&artifact, &digest, |t| t),
        &sb.config,
        &sb.cache,
        &options(),
        &tx,
    )
    .await;

    assert!(run.succeeded(), "{:#?}", run.outcomes);
    let stages: Vec<Stage> = run.outcomes.iter().map(|o| o.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Fetch,
            Stage::Verify,
            Stage::Install,
            Stage::Configure,
            Stage::Document,
            Stage::Test,
            Stage::Caveats
        ]
    );

    let prefix = sb.config.prefix();
    assert!(prefix.join("bin/pomo").is_file());
    assert_eq!(
        fs::read_to_string(prefix.join("share/pomo/README.md")).unwrap(),
        "# pomo\n"
    );
    let man = fs::read_to_string(prefix.join("share/man/man1/pomo.1")).unwrap();
    assert!(man.starts_with(".TH POMO 1 \"June 2025\" \"pomo 1.0.0\""));
    assert_eq!(
        fs::read_to_string(sb.config.home_dir().join(".pomo/pomo.log")).unwrap(),
        "# Log started 2025-06-01 09:30:00 UTC\n"
    );

    let report = run.test_report.as_ref().unwrap();
    assert_eq!(report.overall_status, OverallStatus::Pass);
    assert_eq!(report.results.len(), 4);
    assert_eq!(
        run.caveats.as_deref(),
        Some("Configuration: ~/.pomo/config\nStart a session with: pomo start")
    );

    let receipt = ReceiptRegistry::new(sb.config.clone())
        .get_receipt("pomo")
        .unwrap()
        .unwrap();
    assert_eq!(receipt.version, "1.0.0");
    assert_eq!(receipt.integrity_digest, digest);
    assert!(receipt
        .files()
        .any(|a| a.path() == prefix.join("share/man/man1/pomo.1")));

    let mut started = Vec::new();
    let mut finished = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            PipelineEvent::StageStarted { stage, .. } => started.push(stage),
            PipelineEvent::RunFinished { success, .. } => finished = success,
            _ => {}
        }
    }
    assert_eq!(started, stages);
    assert!(finished);
}

#[tokio::test]
async fn digest_mismatch_leaves_prefix_untouched() {
    let sb = sandbox();
    let (artifact, _) = build_artifact(&sb.root);
    let wrong = "0".repeat(64);

    let run = install(&sb, recipe_with(&artifact, &wrong, |t| t), &options()).await;

    let (stage, err) = failure_of(&run);
    assert_eq!(stage, Stage::Verify);
    assert!(matches!(err, SprigError::DigestMismatch { ref expected, .. } if *expected == wrong));
    assert!(run.halted());
    assert_eq!(run.outcomes.len(), 2);
    assert!(!sb.config.prefix().exists());
    assert!(!sb.config.home_dir().exists());
    let cached = sb.cache.artifact_path(&format!("file://{}", artifact.display()));
    assert!(!cached.exists(), "mismatching artifact stays evicted");
}

#[tokio::test]
async fn operator_edits_survive_reinstall() {
    let sb = sandbox();
    let (artifact, digest) = build_artifact(&sb.root);
    let recipe = recipe_with(&artifact, &digest, |t| t);

    assert!(install(&sb, Arc::clone(&recipe), &options()).await.succeeded());
    let config_file = sb.config.home_dir().join(".pomo/config");
    fs::write(&config_file, "WORK_TIME=50\nBREAK_TIME=10\n").unwrap();
    let log = fs::read(sb.config.home_dir().join(".pomo/pomo.log")).unwrap();

    let mut later = options();
    later.render_time = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
    let second = install(&sb, recipe, &later).await;

    assert!(second.succeeded(), "{:#?}", second.outcomes);
    assert!(second.outcomes[0].detail.starts_with("cached"));
    assert_eq!(
        fs::read_to_string(&config_file).unwrap(),
        "WORK_TIME=50\nBREAK_TIME=10\n"
    );
    assert_eq!(
        fs::read(sb.config.home_dir().join(".pomo/pomo.log")).unwrap(),
        log
    );
    let man = fs::read_to_string(sb.config.man_dir(1).join("pomo.1")).unwrap();
    assert!(man.contains("February 2026"), "man page is regenerated");
}

#[tokio::test]
async fn extra_failing_assertion_is_reported_alone() {
    let sb = sandbox();
    let (artifact, digest) = build_artifact(&sb.root);
    let recipe = recipe_with(&artifact, &digest, |t| {
        t + r#"
[[test_spec]]
type = "exit_code"
command = "pomo"
args = ["--bad-flag"]
code = 1

[[test_spec]]
type = "path_exists"
path = "share/pomo/README.md"
"#
    });

    let run = install(&sb, recipe, &options()).await;

    let report = run.test_report.as_ref().unwrap();
    assert_eq!(report.overall_status, OverallStatus::Fail);
    assert_eq!(report.results.len(), 6);
    assert_eq!(report.failed_count(), 1);
    assert!(!report.results[4].passed);
    assert!(report.results[5].passed);

    assert!(!run.succeeded());
    assert!(!run.halted());
    let (stage, err) = failure_of(&run);
    assert_eq!(stage, Stage::Test);
    assert!(matches!(err, SprigError::TestAssertionFailed { failed: 1, total: 6 }));
    assert!(sb.config.bin_dir().join("pomo").exists(), "no rollback");
    assert!(run.caveats.is_some());
}

#[tokio::test]
async fn unsupported_platform_runs_no_install_step() {
    let sb = sandbox();
    let (artifact, digest) = build_artifact(&sb.root);
    let mut linux = options();
    linux.platform = Some(Platform::Linux);

    let run = install(&sb, recipe_with(&artifact, &digest, |t| t), &linux).await;

    let (stage, err) = failure_of(&run);
    assert_eq!(stage, Stage::Install);
    assert!(matches!(err, SprigError::PlatformUnsupported { .. }));
    assert!(!sb.config.bin_dir().exists());
    assert!(!sb.config.receipt_path("pomo").exists());
}

#[tokio::test]
async fn missing_dependency_is_refused() {
    let sb = sandbox();
    let (artifact, digest) = build_artifact(&sb.root);
    let recipe = recipe_with(&artifact, &digest, |t| {
        t.replacen("program = \"pomo\"", "program = \"pomo\"\ndependencies = [\"terminal-notifier\"]", 1)
    });

    let run = install(&sb, recipe, &options()).await;

    let (_, err) = failure_of(&run);
    assert!(matches!(
        err,
        SprigError::DependencyMissing { ref dependency, .. } if dependency == "terminal-notifier"
    ));
    assert!(!sb.config.bin_dir().exists());
}

#[tokio::test]
async fn configure_failure_degrades_but_later_stages_run() {
    let sb = sandbox();
    let (artifact, digest) = build_artifact(&sb.root);
    // A regular file where the home directory should be.
    fs::write(sb.config.home_dir(), "not a directory").unwrap();

    let run = install(&sb, recipe_with(&artifact, &digest, |t| t), &options()).await;

    let (stage, err) = failure_of(&run);
    assert_eq!(stage, Stage::Configure);
    assert!(matches!(err, SprigError::Configure { .. }));
    assert!(!run.halted());
    let configure = &run.outcomes[3];
    assert!(matches!(configure.status, StageStatus::Degraded(_)));
    assert_eq!(run.outcomes.last().map(|o| o.stage), Some(Stage::Caveats));
    assert!(run.test_report.as_ref().unwrap().passed());
}

#[tokio::test]
async fn reinstall_drops_files_the_new_recipe_no_longer_places() {
    let sb = sandbox();
    let (artifact, digest) = build_artifact(&sb.root);
    assert!(install(&sb, recipe_with(&artifact, &digest, |t| t), &options())
        .await
        .succeeded());
    let readme = sb.config.share_dir().join("pomo/README.md");
    assert!(readme.exists());

    let slim = recipe_with(&artifact, &digest, |t| {
        t.replace(
            "[[install_steps]]\ntype = \"share\"\nsource = \"README.md\"\n",
            "",
        )
    });
    assert!(slim.install_steps.len() == 1);
    assert!(install(&sb, slim, &options()).await.succeeded());

    assert!(!readme.exists());
    assert!(!sb.config.share_dir().join("pomo").exists());
    let receipt = ReceiptRegistry::new(sb.config.clone())
        .get_receipt("pomo")
        .unwrap()
        .unwrap();
    assert!(receipt.artifacts.iter().all(|a| a.path() != readme));
}

#[tokio::test]
async fn uninstall_removes_engine_files_and_keeps_operator_state() {
    let sb = sandbox();
    let (artifact, digest) = build_artifact(&sb.root);
    assert!(install(&sb, recipe_with(&artifact, &digest, |t| t), &options())
        .await
        .succeeded());

    let report = uninstall("pomo", &sb.config).await.unwrap();

    assert!(report.missing.is_empty());
    assert!(!sb.config.bin_dir().join("pomo").exists());
    assert!(!sb.config.man_dir(1).join("pomo.1").exists());
    assert!(!sb.config.share_dir().join("pomo").exists());
    assert!(!sb.config.receipt_path("pomo").exists());
    assert!(sb.config.home_dir().join(".pomo/config").is_file());
    assert!(matches!(
        uninstall("pomo", &sb.config).await,
        Err(SprigError::NotFound(_))
    ));
}

#[tokio::test]
async fn installed_checks_rerun_against_the_receipt() {
    let sb = sandbox();
    let (artifact, digest) = build_artifact(&sb.root);
    fs::create_dir_all(&sb.config.recipes_dir).unwrap();
    fs::write(
        sb.config.recipes_dir.join("pomo.toml"),
        recipe_text(&artifact, &digest),
    )
    .unwrap();
    let formulary = Formulary::new(&sb.config);
    let when = Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap();

    let err = run_installed_tests("pomo", &sb.config, &formulary, when)
        .await
        .unwrap_err();
    assert!(matches!(err, SprigError::NotFound(_)));

    let mut quick = options();
    quick.run_tests = false;
    let run = install(&sb, formulary.load_recipe("pomo").unwrap(), &quick).await;
    assert!(run.succeeded(), "{:#?}", run.outcomes);
    assert!(run.test_report.is_none());

    let report = run_installed_tests("pomo", &sb.config, &formulary, when)
        .await
        .unwrap();
    assert_eq!(report.overall_status, OverallStatus::Pass);
    assert_eq!(report.results.len(), 4);

    fs::remove_file(sb.config.bin_dir().join("pomo")).unwrap();
    let report = run_installed_tests("pomo", &sb.config, &formulary, when)
        .await
        .unwrap();
    assert_eq!(report.overall_status, OverallStatus::Fail);
    // path_executable, output_contains and exit_code all need the binary.
    assert_eq!(report.failed_count(), 3);
    assert!(report.results[3].passed, "man page check still passes");
    assert_eq!(report.results[0].failure, Some(FailureKind::Mismatch));
    assert!(report.to_error().is_some());
}
