//! Pitch Data Store: the nine-block pitch, its exercises and the Pitch Kit,
//! kept in memory and written back to a per-user row after a quiet period.

pub mod blocks;
pub mod drafts;
pub mod editor;
pub mod error;
pub mod export;
pub mod persistence;
pub mod state;
pub mod store;
pub mod types;
pub mod util;

#[cfg(test)]
mod test_support;

pub use editor::EditorSession;
pub use error::{DraftError, PersistenceError, StoreError};
pub use persistence::{JsonFilePersistence, MemoryPersistence, PitchPersistence, PitchRecord};
pub use store::PitchStore;
pub use types::{Config, Identity, PitchData, SaveStatus};
