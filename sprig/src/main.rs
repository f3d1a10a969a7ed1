// sprig/src/main.rs
use std::fs;
use std::process;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use sprig_common::cache::Cache;
use sprig_common::config::Config;
use sprig_common::error::{Result as SprigResult, SprigError};
use tracing::level_filters::LevelFilter;
use tracing::debug;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::CliArgs;

fn init_logging(config: &Config, verbose: u8) {
    let level_filter = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let max_log_level = level_filter.into_level().unwrap_or(tracing::Level::WARN);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("SPRIG_LOG")
        .from_env_lossy();

    let log_dir = config.logs_dir();
    if verbose == 0 {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
        return;
    }
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!(
            "{} Failed to create log directory {}: {}",
            "Warning:".yellow().bold(),
            log_dir.display(),
            e
        );
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .without_time()
            .try_init();
        return;
    }

    let file_appender = tracing_appender::rolling::daily(&log_dir, "sprig.log");
    let (non_blocking_appender, guard) = tracing_appender::non_blocking(file_appender);
    let stderr_writer = std::io::stderr.with_max_level(max_log_level);
    let file_writer = non_blocking_appender.with_max_level(max_log_level);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(stderr_writer.and(file_writer))
        .with_ansi(true)
        .without_time()
        .try_init();

    // Flushes on exit only if it outlives main.
    Box::leak(Box::new(guard));

    debug!(
        "Verbose logging enabled. Writing logs to: {}/sprig.log",
        log_dir.display()
    );
}

/// One line naming the failing stage, e.g. `Error [verify]: Digest mismatch ...`.
pub(crate) fn report_error(err: &SprigError) {
    eprintln!(
        "{} {}: {}",
        "Error".red().bold(),
        format!("[{}]", err.stage()).red(),
        err
    );
}

#[tokio::main]
async fn main() -> SprigResult<()> {
    let cli_args = CliArgs::parse();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            report_error(&e);
            process::exit(2);
        }
    };
    init_logging(&config, cli_args.verbose);
    debug!("Effective configuration: {:?}", config);

    let cache = match Cache::new(&config) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            report_error(&SprigError::Config(format!(
                "Could not initialize cache at {}: {e}",
                config.cache_dir.display()
            )));
            process::exit(2);
        }
    };

    if let Err(e) = cli_args.command.run(&config, cache).await {
        debug!("Command failed: {:?}", e);
        report_error(&e);
        process::exit(1);
    }

    debug!("Command completed successfully.");
    Ok(())
}
