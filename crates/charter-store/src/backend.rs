//! Storage backend abstraction and the in-memory backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::record::StoreRecord;

/// Durable storage for the store's records.
///
/// Backends only ever append. `replay` returns every record written so far,
/// in write order, so the store can rebuild its in-memory arena on open.
pub trait StoreBackend: Send {
    /// Returns all persisted records in write order.
    fn replay(&mut self) -> Result<Vec<StoreRecord>, StoreError>;

    /// Durably appends one record. On error nothing may be observable on replay.
    fn persist(&mut self, record: &StoreRecord) -> Result<(), StoreError>;
}

/// Ephemeral backend.
///
/// Clones share the same record list, so a test can drop a store and reopen
/// another over the same "disk".
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    records: Arc<Mutex<Vec<StoreRecord>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `persist` fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of records written so far.
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Mutates stored records in place; used to simulate on-disk tampering.
    pub fn tamper<F: FnOnce(&mut Vec<StoreRecord>)>(&self, f: F) {
        f(&mut self.records.lock());
    }
}

impl StoreBackend for MemoryBackend {
    fn replay(&mut self) -> Result<Vec<StoreRecord>, StoreError> {
        Ok(self.records.lock().clone())
    }

    fn persist(&mut self, record: &StoreRecord) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory backend set to fail".into()));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}
