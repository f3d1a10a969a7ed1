// sprig-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, UserDirs};
use tracing::debug;

use super::error::{Result, SprigError};

// Used when SPRIG_PREFIX is not set or is empty.
const DEFAULT_FALLBACK_PREFIX: &str = "/opt/sprig";
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    pub prefix: PathBuf,
    pub cache_dir: PathBuf,
    pub recipes_dir: PathBuf,
    /// Home directory that receives operator-owned state.
    pub home_dir: PathBuf,
    pub fetch_timeout: Duration,
    pub test_timeout: Duration,
    pub allow_http: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading sprig configuration");

        let prefix = env_path("SPRIG_PREFIX").unwrap_or_else(|| {
            debug!(
                "SPRIG_PREFIX not set or empty, falling back to default: {}",
                DEFAULT_FALLBACK_PREFIX
            );
            PathBuf::from(DEFAULT_FALLBACK_PREFIX)
        });
        debug!("Effective prefix set to: {}", prefix.display());

        let cache_dir = env_path("SPRIG_CACHE").unwrap_or_else(|| {
            BaseDirs::new()
                .map(|dirs| dirs.cache_dir().join("sprig"))
                .unwrap_or_else(|| prefix.join("var/sprig/cache"))
        });

        let recipes_dir =
            env_path("SPRIG_RECIPES").unwrap_or_else(|| prefix.join("share/sprig/recipes"));

        let home_dir = match env_path("SPRIG_HOME") {
            Some(home) => home,
            None => UserDirs::new()
                .map(|ud| ud.home_dir().to_path_buf())
                .ok_or_else(|| {
                    SprigError::Config("could not determine the user's home directory".into())
                })?,
        };

        let fetch_timeout = env_duration("SPRIG_FETCH_TIMEOUT")?.unwrap_or(DEFAULT_FETCH_TIMEOUT);
        let test_timeout = env_duration("SPRIG_TEST_TIMEOUT")?.unwrap_or(DEFAULT_TEST_TIMEOUT);
        let allow_http = env::var("SPRIG_ALLOW_HTTP").is_ok_and(|v| v == "1");

        debug!("Configuration loaded successfully.");
        Ok(Self {
            prefix,
            cache_dir,
            recipes_dir,
            home_dir,
            fetch_timeout,
            test_timeout,
            allow_http,
        })
    }

    /// Builds a configuration from explicit locations, with default timeouts.
    pub fn with_paths(
        prefix: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        recipes_dir: impl Into<PathBuf>,
        home_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            cache_dir: cache_dir.into(),
            recipes_dir: recipes_dir.into(),
            home_dir: home_dir.into(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            allow_http: false,
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn share_dir(&self) -> PathBuf {
        self.prefix.join("share")
    }

    pub fn man_base_dir(&self) -> PathBuf {
        self.share_dir().join("man")
    }

    pub fn man_dir(&self, section: u8) -> PathBuf {
        self.man_base_dir().join(format!("man{section}"))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.prefix.join("var").join("sprig")
    }

    pub fn receipts_dir(&self) -> PathBuf {
        self.state_dir().join("receipts")
    }

    pub fn receipt_path(&self, recipe_name: &str) -> PathBuf {
        self.receipts_dir().join(format!("{recipe_name}.json"))
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.cache_dir.join("logs")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.cache_dir.join("downloads")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.cache_dir.join("locks")
    }

    /// Staging area for extracted artifacts; kept out of the prefix.
    pub fn tmp_dir(&self) -> PathBuf {
        self.cache_dir.join("tmp")
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn env_duration(key: &str) -> Result<Option<Duration>> {
    match env::var(key).ok().filter(|s| !s.is_empty()) {
        Some(raw) => humantime::parse_duration(&raw)
            .map(Some)
            .map_err(|e| SprigError::Config(format!("{key}='{raw}' is not a duration: {e}"))),
        None => Ok(None),
    }
}
