//! Remote persistence collaborators.
//!
//! The store keeps exactly one row per user. A collaborator reads that row,
//! upserts it whole, and deletes it on reset. Row timestamps belong to the
//! collaborator: `created_at` is kept from the first write and `updated_at`
//! is bumped on every upsert.

mod file;
mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::types::{is_valid_block, PitchData, PitchKitBlock, SectionData};

pub use file::JsonFilePersistence;
pub use memory::MemoryPersistence;

/// The persisted row shape: the whole store for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchRecord {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub startup_name: String,
    #[serde(default)]
    pub blocks: BTreeMap<u8, String>,
    #[serde(default)]
    pub sections: BTreeMap<u8, SectionData>,
    #[serde(default)]
    pub pitch_kit: BTreeMap<u8, PitchKitBlock>,
    #[serde(default)]
    pub current_block: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl PitchRecord {
    /// Build the upsert payload for `user_id` from a full in-memory snapshot.
    ///
    /// Timestamps are left to the collaborator.
    pub fn from_data(user_id: &str, data: &PitchData) -> Self {
        Self {
            user_id: user_id.to_string(),
            user_name: data.user_name.clone(),
            startup_name: data.startup_name.clone(),
            blocks: data.blocks.clone(),
            sections: data.sections.clone(),
            pitch_kit: data.pitch_kit.clone(),
            current_block: Some(data.current_block),
            created_at: None,
            updated_at: None,
        }
    }

    /// Convert a loaded row into store data. Entries keyed outside 1..=9 are dropped.
    pub fn into_data(self) -> PitchData {
        let now = Utc::now();
        PitchData {
            user_name: self.user_name,
            startup_name: self.startup_name,
            blocks: valid_blocks_only(self.blocks),
            sections: valid_blocks_only(self.sections),
            pitch_kit: valid_blocks_only(self.pitch_kit),
            current_block: self.current_block.filter(|n| is_valid_block(*n)).unwrap_or(1),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }

    /// Stamp timestamps the way a row-per-user table would on upsert.
    pub(crate) fn stamped(mut self, existing: Option<&PitchRecord>) -> Self {
        let now = Utc::now();
        self.created_at = existing.and_then(|r| r.created_at).or(Some(now));
        self.updated_at = Some(now);
        self
    }
}

fn valid_blocks_only<V>(entries: BTreeMap<u8, V>) -> BTreeMap<u8, V> {
    let before = entries.len();
    let kept: BTreeMap<u8, V> = entries
        .into_iter()
        .filter(|(number, _)| is_valid_block(*number))
        .collect();
    if kept.len() < before {
        log::warn!(
            "PitchRecord: dropped {} entries keyed outside blocks 1..=9",
            before - kept.len()
        );
    }
    kept
}

/// A row-per-user remote store.
#[async_trait]
pub trait PitchPersistence: Send + Sync {
    /// Fetch the row for `user_id`, or `None` if the user has never saved.
    async fn get_record(&self, user_id: &str) -> Result<Option<PitchRecord>, PersistenceError>;

    /// Insert or replace the row keyed by `record.user_id`.
    async fn upsert(&self, record: PitchRecord) -> Result<(), PersistenceError>;

    /// Delete the row for `user_id`. Deleting a missing row succeeds.
    async fn delete(&self, user_id: &str) -> Result<(), PersistenceError>;
}
