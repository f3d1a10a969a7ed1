// sprig-common/src/cache.rs
// Content-addressed fetch cache: artifacts are keyed by the URL they came from.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::error::Result;
use crate::Config;

/// Length of the hex URL key prefixed to cached file names.
const URL_KEY_LEN: usize = 16;

/// Cache struct to manage the downloads cache
#[derive(Debug, Clone)]
pub struct Cache {
    downloads_dir: PathBuf,
}

impl Cache {
    /// Create a new Cache rooted at the config's downloads dir
    pub fn new(config: &Config) -> Result<Self> {
        let downloads_dir = config.downloads_dir();
        if !downloads_dir.exists() {
            fs::create_dir_all(&downloads_dir)?;
        }
        Ok(Self { downloads_dir })
    }

    /// Gets the cache directory path
    pub fn get_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Cache location for the artifact behind `url`.
    ///
    /// The name is `<sha256(url) prefix>--<last path segment>`, so two URLs
    /// ending in the same file name (`v1.0.0.tar.gz`) never collide.
    pub fn artifact_path(&self, url: &str) -> PathBuf {
        self.downloads_dir.join(cache_file_name(url))
    }

    /// Removes a cached artifact, ignoring entries that are already gone.
    pub fn evict(&self, path: &Path) -> Result<()> {
        if !path.starts_with(&self.downloads_dir) {
            tracing::warn!(
                "Refusing to evict {} outside of cache {}",
                path.display(),
                self.downloads_dir.display()
            );
            return Ok(());
        }
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!("Evicted cached artifact {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn cache_file_name(url: &str) -> String {
    let key = hex::encode(Sha256::digest(url.as_bytes()));
    let trimmed = url.split(['?', '#']).next().unwrap_or(url);
    let base = trimmed
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && !s.contains(':'))
        .unwrap_or("artifact");
    format!("{}--{}", &key[..URL_KEY_LEN], base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_file_name_from_different_urls_does_not_collide() {
        let a = cache_file_name("https://github.com/a/tool/archive/v1.0.0.tar.gz");
        let b = cache_file_name("https://github.com/b/other/archive/v1.0.0.tar.gz");
        assert_ne!(a, b);
        assert!(a.ends_with("--v1.0.0.tar.gz"));
        assert!(b.ends_with("--v1.0.0.tar.gz"));
    }

    #[test]
    fn query_strings_are_not_part_of_the_file_name() {
        let name = cache_file_name("https://example.com/dl/tool-2.1.zip?token=abc");
        assert!(name.ends_with("--tool-2.1.zip"));
    }

    #[test]
    fn evict_only_touches_cache_entries() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_paths(
            dir.path().join("prefix"),
            dir.path().join("cache"),
            dir.path().join("recipes"),
            dir.path().join("home"),
        );
        let cache = Cache::new(&config).unwrap();
        let cached = cache.artifact_path("https://example.com/x.tar.gz");
        fs::write(&cached, b"data").unwrap();
        let outside = dir.path().join("keep.txt");
        fs::write(&outside, b"keep").unwrap();

        cache.evict(&cached).unwrap();
        cache.evict(&cached).unwrap();
        cache.evict(&outside).unwrap();

        assert!(!cached.exists());
        assert!(outside.exists());
    }
}
