//! The pitch data store.
//!
//! Single source of truth for one user's pitch-building progress. Mutators
//! apply to the in-memory [`PitchData`] synchronously, then feed a pending
//! patch that a debounce task upserts to the persistence collaborator as a
//! full row. Derivations are pure reads over the in-memory state.
//!
//! Writes are gated on the identity load: until the user's row has been
//! fetched, mutations are applied locally and queued, then replayed over the
//! loaded row so that defaults never overwrite saved data.

mod mutation;
mod sync;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::drafts::{DraftGenerator, DraftRequest};
use crate::error::{DraftError, StoreError};
use crate::persistence::PitchPersistence;
use crate::types::{
    is_valid_block, Config, ExerciseData, PitchData, ProtagonistData, SaveStatus,
};

use mutation::Mutation;
pub use mutation::Touched;

/// Where the store is in the identity/load lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    /// No identity reported yet, or the auth layer is still resolving.
    AwaitingIdentity,
    Loading,
    Ready,
    /// The row fetch failed; writes stay suppressed until a reload succeeds.
    Failed,
    SignedOut,
}

struct StoreState {
    data: PitchData,
    user_id: Option<String>,
    load_state: LoadState,
    /// Fields written since the last successful upsert.
    pending: Touched,
    /// Mutations made before the row was loaded, replayed on top of it.
    deferred: Vec<Mutation>,
    /// Bumped on every identity change; stale tasks compare and bail.
    epoch: u64,
    /// Bumped when one account's data is discarded (switch or sign-out).
    /// Work started for that account compares and drops its result.
    identity_generation: u64,
    debounce: Option<JoinHandle<()>>,
    status_generation: u64,
    status_reset: Option<JoinHandle<()>>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            data: PitchData::default(),
            user_id: None,
            load_state: LoadState::AwaitingIdentity,
            pending: Touched::default(),
            deferred: Vec::new(),
            epoch: 0,
            identity_generation: 0,
            debounce: None,
            status_generation: 0,
            status_reset: None,
        }
    }
}

impl StoreState {
    fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }
}

struct StoreInner {
    config: Config,
    persistence: Arc<dyn PitchPersistence>,
    state: Mutex<StoreState>,
    status_tx: watch::Sender<SaveStatus>,
    /// Serializes upserts and deletes against the remote row.
    write_lock: tokio::sync::Mutex<()>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.pending.is_empty() {
            log::warn!(
                "PitchStore: dropped with unsynced {}",
                state.pending.describe()
            );
        }
        state.cancel_debounce();
        if let Some(handle) = state.status_reset.take() {
            handle.abort();
        }
    }
}

/// Cheaply cloneable handle to one user's pitch state.
///
/// Mutators schedule timers on the ambient Tokio runtime.
#[derive(Clone)]
pub struct PitchStore {
    inner: Arc<StoreInner>,
}

impl PitchStore {
    pub fn new(config: Config, persistence: Arc<dyn PitchPersistence>) -> Self {
        let (status_tx, _) = watch::channel(SaveStatus::Idle);
        Self {
            inner: Arc::new(StoreInner {
                config,
                persistence,
                state: Mutex::new(StoreState::default()),
                status_tx,
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn status(&self) -> SaveStatus {
        *self.inner.status_tx.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status_tx.subscribe()
    }

    /// User whose data is (being) loaded.
    pub fn user_id(&self) -> Option<String> {
        self.inner.state.lock().user_id.clone()
    }

    /// True until the current identity's row has been fetched.
    pub fn is_loading(&self) -> bool {
        matches!(
            self.inner.state.lock().load_state,
            LoadState::AwaitingIdentity | LoadState::Loading
        )
    }

    pub fn load_failed(&self) -> bool {
        self.inner.state.lock().load_state == LoadState::Failed
    }

    /// Local edits not yet acknowledged by the persistence collaborator.
    pub fn has_unsynced_changes(&self) -> bool {
        let state = self.inner.state.lock();
        !state.pending.is_empty() || !state.deferred.is_empty()
    }

    /// Run `f` against the current in-memory data.
    pub fn read<R>(&self, f: impl FnOnce(&PitchData) -> R) -> R {
        f(&self.inner.state.lock().data)
    }

    pub fn snapshot(&self) -> PitchData {
        self.read(PitchData::clone)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Token for work that outlives a call, such as an open editor or a
    /// draft request. Compare with [`Self::mutate_for`] before writing back.
    pub(crate) fn identity_generation(&self) -> u64 {
        self.inner.state.lock().identity_generation
    }

    fn mutate(&self, mutation: Mutation) {
        let mut state = self.inner.state.lock();
        self.mutate_locked(&mut state, mutation);
    }

    /// Apply `mutation` only if no identity change happened since `generation`.
    fn mutate_for(&self, generation: u64, mutation: Mutation) -> Result<(), StoreError> {
        let mut state = self.inner.state.lock();
        if state.identity_generation != generation {
            return Err(StoreError::IdentityChanged);
        }
        self.mutate_locked(&mut state, mutation);
        Ok(())
    }

    fn mutate_locked(&self, state: &mut StoreState, mutation: Mutation) {
        let touched = mutation.apply(&mut state.data);
        match state.load_state {
            LoadState::Ready => {
                state.pending.merge(touched);
                self.schedule_save(state);
            }
            LoadState::AwaitingIdentity | LoadState::Loading | LoadState::Failed => {
                log::debug!(
                    "PitchStore: deferring {} until the row is loaded",
                    touched.describe()
                );
                state.deferred.push(mutation);
            }
            LoadState::SignedOut => {
                log::debug!(
                    "PitchStore: no identity, {} kept in memory only",
                    touched.describe()
                );
            }
        }
    }

    fn check_block(number: u8) -> Result<(), StoreError> {
        if is_valid_block(number) {
            Ok(())
        } else {
            Err(StoreError::InvalidBlock(number))
        }
    }

    pub fn set_user_info(&self, user_name: impl Into<String>, startup_name: impl Into<String>) {
        self.mutate(Mutation::UserInfo {
            user_name: user_name.into(),
            startup_name: startup_name.into(),
        });
    }

    /// Store a block's text. Non-empty text also marks its section completed.
    pub fn set_block_content(&self, block: u8, content: impl Into<String>) -> Result<(), StoreError> {
        Self::check_block(block)?;
        self.mutate(Mutation::BlockContent {
            block,
            content: content.into(),
        });
        Ok(())
    }

    /// [`Self::set_block_content`] for a caller holding an identity generation.
    pub(crate) fn set_block_content_for(
        &self,
        generation: u64,
        block: u8,
        content: impl Into<String>,
    ) -> Result<(), StoreError> {
        Self::check_block(block)?;
        self.mutate_for(
            generation,
            Mutation::BlockContent {
                block,
                content: content.into(),
            },
        )
    }

    pub fn set_current_block(&self, block: u8) -> Result<(), StoreError> {
        Self::check_block(block)?;
        self.mutate(Mutation::CurrentBlock(block));
        Ok(())
    }

    /// Merge `patch` into the exercise's fields; keys not in `patch` are kept.
    pub fn set_exercise_data(
        &self,
        section: u8,
        exercise_id: impl Into<String>,
        patch: ExerciseData,
    ) -> Result<(), StoreError> {
        Self::check_block(section)?;
        self.mutate(Mutation::ExercisePatch {
            section,
            exercise_id: exercise_id.into(),
            patch,
        });
        Ok(())
    }

    /// Move the section's wizard cursor. The step is not bounds-checked.
    pub fn set_section_step(&self, section: u8, step: u32) -> Result<(), StoreError> {
        Self::check_block(section)?;
        self.mutate(Mutation::SectionStep { section, step });
        Ok(())
    }

    /// Snapshot `content` into the Pitch Kit, replacing any earlier entry.
    pub fn save_to_pitch_kit(&self, block: u8, content: impl Into<String>) -> Result<(), StoreError> {
        Self::check_block(block)?;
        self.mutate(Mutation::SaveToPitchKit {
            block,
            content: content.into(),
            saved_at: Utc::now(),
        });
        Ok(())
    }

    /// [`Self::save_to_pitch_kit`] for a caller holding an identity generation.
    pub(crate) fn save_to_pitch_kit_for(
        &self,
        generation: u64,
        block: u8,
        content: impl Into<String>,
    ) -> Result<(), StoreError> {
        Self::check_block(block)?;
        self.mutate_for(
            generation,
            Mutation::SaveToPitchKit {
                block,
                content: content.into(),
                saved_at: Utc::now(),
            },
        )
    }

    /// Ask `generator` for a draft of `block` and store it as the block's text.
    ///
    /// On failure the store is left untouched and the categorized error is
    /// returned for the caller to present. A draft that arrives after the
    /// identity changed is discarded with [`DraftError::Cancelled`].
    pub async fn generate_draft(
        &self,
        block: u8,
        generator: &dyn DraftGenerator,
    ) -> Result<String, DraftError> {
        let (request, generation) = {
            let state = self.inner.state.lock();
            (
                DraftRequest::from_data(block, &state.data)?,
                state.identity_generation,
            )
        };

        let draft = match generator.generate(&request).await {
            Ok(draft) => draft.trim().to_string(),
            Err(e) => {
                log::warn!("PitchStore: draft for block {} failed: {}", block, e);
                return Err(e);
            }
        };
        if draft.is_empty() {
            log::warn!("PitchStore: draft for block {} came back empty", block);
            return Err(DraftError::EmptyDraft);
        }

        match self.set_block_content_for(generation, block, draft.clone()) {
            Ok(()) => Ok(draft),
            Err(StoreError::IdentityChanged) => {
                log::warn!(
                    "PitchStore: identity changed while drafting block {}, discarding draft",
                    block
                );
                Err(DraftError::Cancelled)
            }
            Err(_) => Err(DraftError::UnknownBlock(block)),
        }
    }

    // =========================================================================
    // Derivations
    // =========================================================================

    pub fn has_started(&self) -> bool {
        self.read(PitchData::has_started)
    }

    pub fn block_content(&self, block: u8) -> String {
        self.read(|d| d.block_content(block).to_string())
    }

    pub fn current_block(&self) -> u8 {
        self.read(|d| d.current_block)
    }

    pub fn completed_blocks(&self) -> Vec<u8> {
        self.read(PitchData::completed_blocks)
    }

    pub fn is_block_completed(&self, block: u8) -> bool {
        self.read(|d| d.is_block_completed(block))
    }

    pub fn next_incomplete_block(&self) -> Option<u8> {
        self.read(PitchData::next_incomplete_block)
    }

    pub fn total_words(&self) -> usize {
        self.read(PitchData::total_words)
    }

    pub fn protagonist(&self) -> ProtagonistData {
        self.read(PitchData::protagonist)
    }

    pub fn section_exercises(&self, section: u8) -> BTreeMap<String, ExerciseData> {
        self.read(|d| d.section_exercises(section))
    }

    pub fn section_step(&self, section: u8) -> u32 {
        self.read(|d| d.section_step(section))
    }

    pub fn is_section_marked_completed(&self, section: u8) -> bool {
        self.read(|d| d.is_section_marked_completed(section))
    }

    pub fn pitch_kit_completed_count(&self) -> usize {
        self.read(PitchData::pitch_kit_completed_count)
    }

    pub fn pitch_kit_total_words(&self) -> usize {
        self.read(PitchData::pitch_kit_total_words)
    }
}
