use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use tempfile::TempPath;
use sprig_aio::checksum::{digests_match, sha256_file_async};
use sprig_common::cache::Cache;
use sprig_common::config::Config;
use sprig_common::error::{FetchErrorKind, Result, SprigError};
use sprig_common::model::SourceLocation;
use tokio::fs::{self, File as TokioFile};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use crate::validation::{validate_url, SourceScheme};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = concat!("sprig/", env!("CARGO_PKG_VERSION"), " (Rust)");

/// A fetched artifact sitting in the download cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    /// The cached copy already matched the expected digest; nothing was transferred.
    pub cache_hit: bool,
}

/// Retrieves `source` into the download cache.
///
/// A cached artifact whose digest equals `expected_digest` is reused without
/// touching the network. A stale or corrupt one is evicted and fetched again.
/// No retries: any failure is returned as a `Fetch` error of a distinct kind.
pub async fn fetch_artifact(
    recipe_name: &str,
    source: &SourceLocation,
    expected_digest: &str,
    cache: &Cache,
    config: &Config,
) -> Result<FetchedArtifact> {
    let url = source.url.as_str();
    let cache_path = cache.artifact_path(url);
    debug!(
        "Preparing to fetch '{}' {} from URL: {}",
        recipe_name, source.version, url
    );
    debug!("Target cache path: {}", cache_path.display());

    let scheme = validate_url(url, config.allow_http)?;

    if cache_path.is_file() {
        debug!("File exists in cache: {}", cache_path.display());
        let actual = sha256_file_async(&cache_path).await?;
        if digests_match(expected_digest, &actual) {
            debug!("Using valid cached file: {}", cache_path.display());
            return Ok(FetchedArtifact {
                path: cache_path,
                cache_hit: true,
            });
        }
        debug!(
            "Cached file digest mismatch ({}): got {}. Refetching.",
            cache_path.display(),
            actual
        );
        cache.evict(&cache_path)?;
    } else {
        debug!("File not found in cache.");
    }

    fs::create_dir_all(cache.get_dir()).await?;
    let temp_path = temp_path_for(cache.get_dir(), &cache_path)?;
    let result = match scheme {
        SourceScheme::Local(local) => copy_local(url, &local, &temp_path).await,
        SourceScheme::Remote(_) => {
            let client = build_http_client(config.fetch_timeout)?;
            download(&client, url, &temp_path).await
        }
    };
    if let Err(e) = result {
        error!("Fetch of '{}' failed from {}: {}", recipe_name, url, e);
        if let Err(rm) = temp_path.close() {
            warn!("Could not remove temporary download: {}", rm);
        }
        return Err(e);
    }

    temp_path
        .persist(&cache_path)
        .map_err(|e| SprigError::from(e.error))?;
    debug!("Moved download to cache location: {}", cache_path.display());
    Ok(FetchedArtifact {
        path: cache_path,
        cache_hit: false,
    })
}

/// A uniquely named scratch file in `dir`, removed on drop unless persisted.
fn temp_path_for(dir: &Path, final_path: &Path) -> Result<TempPath> {
    let file_name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = tempfile::Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".download")
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

fn fetch_error(url: &str, kind: FetchErrorKind, detail: impl Into<String>) -> SprigError {
    SprigError::Fetch {
        url: url.to_string(),
        kind,
        detail: detail.into(),
    }
}

fn classify(err: &reqwest::Error) -> FetchErrorKind {
    if err.is_timeout() {
        FetchErrorKind::TimedOut
    } else if err.is_connect() {
        FetchErrorKind::Unreachable
    } else if let Some(status) = err.status() {
        FetchErrorKind::Status(status.as_u16())
    } else {
        FetchErrorKind::Transport
    }
}

async fn copy_local(url: &str, local: &Path, temp_path: &Path) -> Result<()> {
    if !local.is_file() {
        return Err(fetch_error(
            url,
            FetchErrorKind::MissingLocal,
            format!("{} does not exist", local.display()),
        ));
    }
    let bytes = fs::copy(local, temp_path).await?;
    debug!("Copied {} bytes from {}", bytes, local.display());
    Ok(())
}

fn build_http_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(SprigError::from)
}

async fn download(client: &Client, url: &str, temp_path: &Path) -> Result<()> {
    debug!("Downloading to temporary path: {}", temp_path.display());
    let response = client.get(url).send().await.map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        fetch_error(url, classify(&e), e.to_string())
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);
    if !status.is_success() {
        return Err(fetch_error(
            url,
            FetchErrorKind::Status(status.as_u16()),
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        ));
    }

    let mut temp_file = TokioFile::create(temp_path).await?;
    let mut stream = response.bytes_stream();
    let mut total: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| fetch_error(url, classify(&e), e.to_string()))?;
        temp_file.write_all(&chunk).await?;
        total += chunk.len() as u64;
    }
    temp_file.flush().await?;
    temp_file.sync_all().await?;
    debug!("Finished writing {} bytes to temp file.", total);
    Ok(())
}
