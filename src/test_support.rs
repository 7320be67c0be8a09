//! Fake collaborators for store, editor and draft tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::drafts::{DraftGenerator, DraftRequest};
use crate::error::{DraftError, PersistenceError};
use crate::persistence::{PitchPersistence, PitchRecord};
use crate::store::PitchStore;
use crate::types::{Config, Identity};

/// Row store that records every call and can be told to stall or fail.
#[derive(Default)]
pub struct RecordingPersistence {
    rows: Mutex<HashMap<String, PitchRecord>>,
    gets: Mutex<Vec<String>>,
    upserts: Mutex<Vec<PitchRecord>>,
    deletes: Mutex<Vec<String>>,
    get_delay: Mutex<Duration>,
    fail_get: Mutex<bool>,
    /// Number of upcoming upserts that fail.
    fail_upserts: Mutex<u32>,
    fail_delete: Mutex<bool>,
}

impl RecordingPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, record: PitchRecord) {
        self.rows.lock().insert(record.user_id.clone(), record);
    }

    pub fn row(&self, user_id: &str) -> Option<PitchRecord> {
        self.rows.lock().get(user_id).cloned()
    }

    pub fn get_count(&self) -> usize {
        self.gets.lock().len()
    }

    /// Every upsert attempt, failed ones included.
    pub fn upserts(&self) -> Vec<PitchRecord> {
        self.upserts.lock().clone()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().len()
    }

    pub fn last_upsert(&self) -> Option<PitchRecord> {
        self.upserts.lock().last().cloned()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().clone()
    }

    pub fn set_get_delay(&self, delay: Duration) {
        *self.get_delay.lock() = delay;
    }

    pub fn set_fail_get(&self, fail: bool) {
        *self.fail_get.lock() = fail;
    }

    pub fn fail_next_upserts(&self, count: u32) {
        *self.fail_upserts.lock() = count;
    }

    pub fn set_fail_delete(&self, fail: bool) {
        *self.fail_delete.lock() = fail;
    }
}

#[async_trait]
impl PitchPersistence for RecordingPersistence {
    async fn get_record(&self, user_id: &str) -> Result<Option<PitchRecord>, PersistenceError> {
        self.gets.lock().push(user_id.to_string());
        let delay = *self.get_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_get.lock() {
            return Err(PersistenceError::Backend("select failed".into()));
        }
        Ok(self.row(user_id))
    }

    async fn upsert(&self, record: PitchRecord) -> Result<(), PersistenceError> {
        self.upserts.lock().push(record.clone());
        {
            let mut failures = self.fail_upserts.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(PersistenceError::Backend("upsert failed".into()));
            }
        }
        let mut rows = self.rows.lock();
        let existing = rows.get(&record.user_id).cloned();
        let stamped = record.stamped(existing.as_ref());
        rows.insert(stamped.user_id.clone(), stamped);
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<(), PersistenceError> {
        self.deletes.lock().push(user_id.to_string());
        if *self.fail_delete.lock() {
            return Err(PersistenceError::Backend("delete failed".into()));
        }
        self.rows.lock().remove(user_id);
        Ok(())
    }
}

/// Generator that replays queued outcomes and records the requests it saw.
#[derive(Default)]
pub struct ScriptedGenerator {
    outcomes: Mutex<VecDeque<Result<String, DraftError>>>,
    requests: Mutex<Vec<DraftRequest>>,
    delay: Mutex<Duration>,
}

impl ScriptedGenerator {
    pub fn new(outcomes: Vec<Result<String, DraftError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Make every `generate` call take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn requests(&self) -> Vec<DraftRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DraftGenerator for ScriptedGenerator {
    async fn generate(&self, request: &DraftRequest) -> Result<String, DraftError> {
        self.requests.lock().push(request.clone());
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(Err(DraftError::EmptyDraft))
    }
}

/// Default timings: 500ms store debounce, 3s editor debounce, 30s autosave.
pub fn test_config() -> Config {
    Config::default()
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// A string of exactly `n` words.
pub fn words(n: usize) -> String {
    vec!["palabra"; n].join(" ")
}

/// A store whose identity has loaded against `remote`.
pub async fn store_with(
    user_id: &str,
    remote: RecordingPersistence,
    config: Config,
) -> (PitchStore, Arc<RecordingPersistence>) {
    let remote = Arc::new(remote);
    let store = PitchStore::new(config, remote.clone());
    store
        .set_identity(&Identity::signed_in(user_id))
        .await
        .unwrap();
    (store, remote)
}

/// A loaded store for a user with no saved row.
pub async fn ready_store(user_id: &str) -> (PitchStore, Arc<RecordingPersistence>) {
    store_with(user_id, RecordingPersistence::new(), test_config()).await
}
