// sprig-net/src/validation.rs
use std::path::PathBuf;

use sprig_common::error::{FetchErrorKind, Result, SprigError};
use url::Url;

/// Where an accepted source URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceScheme {
    Remote(Url),
    Local(PathBuf),
}

/// Validates a source URL: `https` always, `http` only when allowed, and
/// `file` for local artifacts.
pub fn validate_url(url_str: &str, allow_http: bool) -> Result<SourceScheme> {
    let invalid = |detail: String| SprigError::Fetch {
        url: url_str.to_string(),
        kind: FetchErrorKind::InvalidUrl,
        detail,
    };
    let url = Url::parse(url_str).map_err(|e| invalid(format!("failed to parse: {e}")))?;
    match url.scheme() {
        "https" => Ok(SourceScheme::Remote(url)),
        "http" if allow_http => {
            tracing::warn!("Fetching over plain http: {}", url_str);
            Ok(SourceScheme::Remote(url))
        }
        "http" => Err(invalid(
            "plain http is disabled (set SPRIG_ALLOW_HTTP=1 to permit it)".to_string(),
        )),
        "file" => url
            .to_file_path()
            .map(SourceScheme::Local)
            .map_err(|_| invalid("not a local file path".to_string())),
        other => Err(invalid(format!(
            "unsupported scheme '{other}': must be https, http or file"
        ))),
    }
}
