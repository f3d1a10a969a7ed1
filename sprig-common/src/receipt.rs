// sprig-common/src/receipt.rs
use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::config::Config;
use super::error::{Result, SprigError};
use super::model::InstallReceipt;

/// Queries install receipts under the prefix.
#[derive(Debug)]
pub struct ReceiptRegistry {
    config: Config,
}

impl ReceiptRegistry {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn receipt_path(&self, name: &str) -> PathBuf {
        self.config.receipt_path(name)
    }

    pub fn get_receipt(&self, name: &str) -> Result<Option<InstallReceipt>> {
        let path = self.receipt_path(name);
        debug!(
            "[RECEIPTS:{}] get_receipt: checking {}",
            name,
            path.display()
        );
        if !path.is_file() {
            debug!("[RECEIPTS:{}] get_receipt: not installed", name);
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        let receipt: InstallReceipt = serde_json::from_str(&raw).map_err(|e| {
            SprigError::Generic(format!("Corrupt receipt {}: {e}", path.display()))
        })?;
        Ok(Some(receipt))
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.receipt_path(name).is_file()
    }

    /// All readable receipts, sorted by name. Unreadable ones are skipped with a warning.
    pub fn list_receipts(&self) -> Result<Vec<InstallReceipt>> {
        let dir = self.config.receipts_dir();
        let mut receipts = Vec::new();
        if !dir.is_dir() {
            debug!("[RECEIPTS] list_receipts: {} not found", dir.display());
            return Ok(receipts);
        }
        for entry in fs::read_dir(&dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("[RECEIPTS] Error reading entry in {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.get_receipt(name) {
                Ok(Some(receipt)) => receipts.push(receipt),
                Ok(None) => {}
                Err(e) => warn!("[RECEIPTS:{}] Skipping unreadable receipt: {}", name, e),
            }
        }
        receipts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(receipts)
    }
}
