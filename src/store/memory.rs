//! In-process round-trip store.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{RoundTripRecord, RoundTripStore};
use crate::error::O11yError;

/// Keeps every record in memory, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<RoundTripRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored records.
    pub fn records(&self) -> Vec<RoundTripRecord> {
        self.records.lock().expect("mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RoundTripStore for MemoryStore {
    async fn insert_round_trip(&self, record: &RoundTripRecord) -> Result<(), O11yError> {
        let mut stored = record.clone();
        stored.created_at.get_or_insert_with(Utc::now);
        self.records.lock().expect("mutex poisoned").push(stored);
        Ok(())
    }

    async fn last_round_trip(&self) -> Result<Option<RoundTripRecord>, O11yError> {
        Ok(self.records.lock().expect("mutex poisoned").last().cloned())
    }
}
