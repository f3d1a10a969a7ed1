// sprig-aio/src/json_io.rs
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sprig_common::error::Result;
use tracing::debug;

/// Serializes `data` as pretty JSON and writes it atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Writing JSON to: {}", path.display());
    let mut json_bytes = serde_json::to_vec_pretty(data)?;
    json_bytes.push(b'\n');
    crate::fs::atomic_write_file(path, &json_bytes, 0o644)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Reading JSON from: {}", path.display());
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
