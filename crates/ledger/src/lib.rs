//! Durable, ordered, append-only storage for submitted orders.
//!
//! The backing store is a flat CSV file with a header row matching the
//! [`OrderRecord`] field names. The full field tuple is the composite key:
//! two rows are distinct unless every field coincides, so `append` never
//! deduplicates. Appends are read-all, concatenate, atomically rewrite.

use ibridge_core::{BridgeError, OrderRecord};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// The trade audit ledger.
///
/// Not designed for concurrent writers across processes; within a process
/// a single writer lock serializes every read-modify-write so back-to-back
/// submissions cannot lose updates.
pub struct TradeLedger {
    path: PathBuf,
    lock: Mutex<()>,
}

impl TradeLedger {
    /// Open a ledger at `path`. The file need not exist yet; a missing
    /// file is an empty ledger (first-ever trade).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in insertion order.
    pub fn load(&self) -> Result<Vec<OrderRecord>, BridgeError> {
        let _guard = self.guard()?;
        self.read_all()
    }

    /// Append one record and return the updated full ledger.
    ///
    /// The store is rewritten through a temp file and renamed into place,
    /// so a failed write leaves the existing ledger untouched.
    pub fn append(&self, record: &OrderRecord) -> Result<Vec<OrderRecord>, BridgeError> {
        let _guard = self.guard()?;

        let mut records = self.read_all()?;
        records.push(record.clone());

        let tmp = self.path.with_extension("csv.tmp");
        let mut writer = csv::Writer::from_path(&tmp).map_err(|e| {
            BridgeError::ledger(
                "unwritable ledger",
                format!("failed to create {}: {}", tmp.display(), e),
            )
        })?;
        for row in &records {
            writer.serialize(row).map_err(|e| {
                BridgeError::ledger("unwritable ledger", format!("failed to encode row: {}", e))
            })?;
        }
        writer.flush().map_err(|e| {
            BridgeError::ledger("unwritable ledger", format!("failed to flush: {}", e))
        })?;
        drop(writer);

        fs::rename(&tmp, &self.path).map_err(|e| {
            BridgeError::ledger(
                "unwritable ledger",
                format!("failed to replace {}: {}", self.path.display(), e),
            )
        })?;

        info!(
            order_id = record.order_id,
            symbol = %record.symbol,
            rows = records.len(),
            "order appended to trade ledger"
        );
        Ok(records)
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, BridgeError> {
        self.lock.lock().map_err(|_| {
            BridgeError::ledger(
                "ledger lock poisoned",
                "a previous ledger writer panicked; the store was not modified",
            )
        })
    }

    fn read_all(&self) -> Result<Vec<OrderRecord>, BridgeError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "ledger file absent, treating as empty");
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| {
            BridgeError::ledger(
                "unreadable ledger",
                format!("failed to open {}: {}", self.path.display(), e),
            )
        })?;

        let mut records = Vec::new();
        for result in reader.deserialize() {
            let record: OrderRecord = result.map_err(|e| {
                BridgeError::ledger("malformed ledger row", format!("{}", e))
            })?;
            records.push(record);
        }
        Ok(records)
    }
}
