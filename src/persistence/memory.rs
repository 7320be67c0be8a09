use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{PitchPersistence, PitchRecord};
use crate::error::PersistenceError;

/// In-process row store keyed by user id.
#[derive(Default)]
pub struct MemoryPersistence {
    rows: Mutex<HashMap<String, PitchRecord>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the row for `user_id`.
    pub fn row(&self, user_id: &str) -> Option<PitchRecord> {
        self.rows.lock().get(user_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PitchPersistence for MemoryPersistence {
    async fn get_record(&self, user_id: &str) -> Result<Option<PitchRecord>, PersistenceError> {
        Ok(self.row(user_id))
    }

    async fn upsert(&self, record: PitchRecord) -> Result<(), PersistenceError> {
        let mut rows = self.rows.lock();
        let existing = rows.get(&record.user_id).cloned();
        let stamped = record.stamped(existing.as_ref());
        rows.insert(stamped.user_id.clone(), stamped);
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), PersistenceError> {
        self.rows.lock().remove(user_id);
        Ok(())
    }
}
