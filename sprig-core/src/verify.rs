// sprig-core/src/verify.rs
use std::path::Path;

use sprig_aio::checksum::verify_checksum_async;
use sprig_common::cache::Cache;
use sprig_common::error::{Result, SprigError};
use tracing::{debug, warn};

/// Checks the fetched artifact against the recipe's digest.
///
/// On mismatch the cache entry is evicted, so the next run fetches again
/// instead of failing on the same bytes.
pub async fn verify_artifact(path: &Path, expected: &str, cache: &Cache) -> Result<()> {
    match verify_checksum_async(path, expected).await {
        Ok(()) => {
            debug!("Digest verified for {}", path.display());
            Ok(())
        }
        Err(err @ SprigError::DigestMismatch { .. }) => {
            warn!("{}", err);
            if let Err(evict_err) = cache.evict(path) {
                warn!(
                    "Could not evict mismatching artifact {}: {}",
                    path.display(),
                    evict_err
                );
            }
            Err(err)
        }
        Err(other) => Err(other),
    }
}
