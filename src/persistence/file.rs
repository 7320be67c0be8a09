use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{PitchPersistence, PitchRecord};
use crate::error::PersistenceError;

/// One pretty-printed JSON file per user under a data directory.
pub struct JsonFilePersistence {
    dir: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the row file for `user_id`.
    ///
    /// Anything outside `[A-Za-z0-9-]` is escaped as `_xx` so distinct ids
    /// never share a file and ids cannot climb out of the directory.
    pub fn path_for(&self, user_id: &str) -> PathBuf {
        let mut name = String::with_capacity(user_id.len());
        for b in user_id.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' {
                name.push(b as char);
            } else {
                name.push_str(&format!("_{:02x}", b));
            }
        }
        self.dir.join(format!("{}.json", name))
    }

    fn read_row(path: &Path) -> Result<Option<PitchRecord>, PersistenceError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write_row(dir: &Path, path: &Path, record: &PitchRecord) -> Result<(), PersistenceError> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(record)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(path).map_err(|e| PersistenceError::Io(e.error.to_string()))?;
        Ok(())
    }

    async fn blocking<T, F>(f: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, PersistenceError> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| PersistenceError::Backend(format!("File task failed: {}", e)))?
    }
}

#[async_trait]
impl PitchPersistence for JsonFilePersistence {
    async fn get_record(&self, user_id: &str) -> Result<Option<PitchRecord>, PersistenceError> {
        let path = self.path_for(user_id);
        Self::blocking(move || Self::read_row(&path)).await
    }

    async fn upsert(&self, record: PitchRecord) -> Result<(), PersistenceError> {
        let dir = self.dir.clone();
        let path = self.path_for(&record.user_id);
        Self::blocking(move || {
            let existing = Self::read_row(&path).unwrap_or_else(|e| {
                log::warn!("FilePersistence: unreadable row {}: {}", path.display(), e);
                None
            });
            let stamped = record.stamped(existing.as_ref());
            Self::write_row(&dir, &path, &stamped)
        })
        .await
    }

    async fn delete(&self, user_id: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(user_id);
        Self::blocking(move || {
            if path.exists() {
                fs::remove_file(&path)?;
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PitchData;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_missing_row_is_none() {
        let temp = TempDir::new().unwrap();
        let store = JsonFilePersistence::new(temp.path());
        assert!(store.get_record("ana").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_upsert_creates_dir_and_row() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("data");
        let store = JsonFilePersistence::new(&dir);

        let mut data = PitchData::default();
        data.blocks.insert(1, "Carlos tiene 24 años".into());
        store.upsert(PitchRecord::from_data("ana", &data)).await.unwrap();

        assert!(dir.join("ana.json").exists());
        let row = store.get_record("ana").await.unwrap().unwrap();
        assert_eq!(row.blocks.get(&1).unwrap(), "Carlos tiene 24 años");
        assert!(row.created_at.is_some());
    }

    #[tokio::test]
    async fn test_file_upsert_preserves_created_at() {
        let temp = TempDir::new().unwrap();
        let store = JsonFilePersistence::new(temp.path());
        let data = PitchData::default();

        store.upsert(PitchRecord::from_data("ana", &data)).await.unwrap();
        let first = store.get_record("ana").await.unwrap().unwrap();
        store.upsert(PitchRecord::from_data("ana", &data)).await.unwrap();
        let second = store.get_record("ana").await.unwrap().unwrap();

        assert_eq!(first.created_at, second.created_at);
    }

    #[tokio::test]
    async fn test_file_delete() {
        let temp = TempDir::new().unwrap();
        let store = JsonFilePersistence::new(temp.path());
        store
            .upsert(PitchRecord::from_data("ana", &PitchData::default()))
            .await
            .unwrap();

        store.delete("ana").await.unwrap();
        assert!(store.get_record("ana").await.unwrap().is_none());
        // Second delete of a missing row still succeeds
        store.delete("ana").await.unwrap();
    }

    #[test]
    fn test_path_for_escapes_ids() {
        let store = JsonFilePersistence::new("/tmp/pitch");
        assert_eq!(store.path_for("user-1"), PathBuf::from("/tmp/pitch/user-1.json"));
        assert_eq!(
            store.path_for("../etc"),
            PathBuf::from("/tmp/pitch/_2e_2e_2fetc.json")
        );
        assert_ne!(store.path_for("a.b"), store.path_for("a_b"));
    }
}
