//! Block editor session.
//!
//! Holds the working text of one block between keystrokes and the store.
//! Two timers commit it: a debounce that fires after a quiet period, and a
//! periodic autosave that only acts when there is something new and
//! non-empty to save. Leaving the editor commits and flushes synchronously.
//!
//! A session belongs to the identity that was active when it opened. Once the
//! store switches or signs out, its buffer is discarded instead of committed.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::blocks::{self, WordCountStatus};
use crate::error::StoreError;
use crate::store::PitchStore;
use crate::types::is_valid_block;
use crate::util::count_words;

struct EditorState {
    text: String,
    dirty: bool,
    debounce: Option<JoinHandle<()>>,
    autosave: Option<JoinHandle<()>>,
}

impl EditorState {
    fn cancel_timers(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
        if let Some(handle) = self.autosave.take() {
            handle.abort();
        }
    }
}

struct SessionInner {
    store: PitchStore,
    block: u8,
    identity_generation: u64,
    debounce_delay: Duration,
    state: Mutex<EditorState>,
}

impl SessionInner {
    /// Push the working text into the store if it changed since the last commit.
    fn commit_locked(&self, state: &mut EditorState) -> Result<(), StoreError> {
        if !state.dirty {
            return Ok(());
        }
        let result =
            self.store
                .set_block_content_for(self.identity_generation, self.block, state.text.clone());
        match result {
            Ok(()) => {
                state.dirty = false;
                Ok(())
            }
            Err(StoreError::IdentityChanged) => {
                log::warn!(
                    "EditorSession: identity changed, discarding unsaved text of block {}",
                    self.block
                );
                state.dirty = false;
                state.cancel_timers();
                Err(StoreError::IdentityChanged)
            }
            Err(e) => Err(e),
        }
    }

    fn autosave_tick(&self) {
        let mut state = self.state.lock();
        if !state.dirty || state.text.trim().is_empty() {
            return;
        }
        log::debug!("EditorSession: autosaving block {}", self.block);
        if let Err(e) = self.commit_locked(&mut state) {
            log::warn!("EditorSession: autosave of block {} failed: {}", self.block, e);
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let mut state = std::mem::replace(
            self.state.get_mut(),
            EditorState {
                text: String::new(),
                dirty: false,
                debounce: None,
                autosave: None,
            },
        );
        state.cancel_timers();
        if state.dirty {
            log::debug!("EditorSession: committing block {} on teardown", self.block);
            if let Err(e) = self.commit_locked(&mut state) {
                log::warn!("EditorSession: teardown commit failed: {}", e);
            }
        }
    }
}

/// Editing session for one block.
///
/// [`close`](Self::close) is the exit path that persists: it commits and
/// flushes the store. Dropping a session only commits unsaved text into the
/// store, which then writes it on its own debounce; that write needs a live
/// Tokio runtime, and without one it waits for the next store flush.
pub struct EditorSession {
    inner: Arc<SessionInner>,
}

impl EditorSession {
    /// Open `block` with its current text from the store.
    pub fn open(store: &PitchStore, block: u8) -> Result<Self, StoreError> {
        if !is_valid_block(block) {
            return Err(StoreError::InvalidBlock(block));
        }
        let config = store.config();
        let inner = Arc::new(SessionInner {
            store: store.clone(),
            block,
            identity_generation: store.identity_generation(),
            debounce_delay: Duration::from_millis(config.editor_debounce_ms),
            state: Mutex::new(EditorState {
                text: store.block_content(block),
                dirty: false,
                debounce: None,
                autosave: None,
            }),
        });

        let period = Duration::from_secs(config.autosave_interval_secs);
        if let Ok(runtime) = Handle::try_current() {
            if !period.is_zero() {
                let weak = Arc::downgrade(&inner);
                let handle = runtime.spawn(autosave_loop(weak, period));
                inner.state.lock().autosave = Some(handle);
            }
        }

        Ok(Self { inner })
    }

    pub fn block(&self) -> u8 {
        self.inner.block
    }

    pub fn text(&self) -> String {
        self.inner.state.lock().text.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().dirty
    }

    pub fn word_count(&self) -> usize {
        count_words(&self.inner.state.lock().text)
    }

    pub fn word_count_status(&self) -> Option<WordCountStatus> {
        let text = self.text();
        blocks::block(self.inner.block).map(|def| def.word_count_status(&text))
    }

    /// Replace the working text and restart the save-on-edit timer.
    pub fn edit(&self, text: impl Into<String>) {
        let mut state = self.inner.state.lock();
        state.text = text.into();
        state.dirty = true;

        if let Some(handle) = state.debounce.take() {
            handle.abort();
        }
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let delay = self.inner.debounce_delay;
        state.debounce = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut state = inner.state.lock();
            state.debounce = None;
            if let Err(e) = inner.commit_locked(&mut state) {
                log::warn!("EditorSession: save-on-edit failed: {}", e);
            }
        }));
    }

    /// Cancel the pending save-on-edit and commit the text to the store now.
    pub fn commit(&self) -> Result<(), StoreError> {
        let mut state = self.inner.state.lock();
        if let Some(handle) = state.debounce.take() {
            handle.abort();
        }
        self.inner.commit_locked(&mut state)
    }

    /// Commit, then flush the store so nothing waits on a timer.
    ///
    /// Call on navigation away from the block.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.commit()?;
        self.inner.store.flush().await
    }

    /// Commit the working text and snapshot it into the Pitch Kit.
    pub fn save_to_pitch_kit(&self) -> Result<(), StoreError> {
        self.commit()?;
        let text = self.text();
        self.inner
            .store
            .save_to_pitch_kit_for(self.inner.identity_generation, self.inner.block, text)
    }

    /// Stop both timers, commit and flush.
    pub async fn close(self) -> Result<(), StoreError> {
        self.inner.state.lock().cancel_timers();
        self.flush().await
    }
}

async fn autosave_loop(session: Weak<SessionInner>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        let Some(inner) = session.upgrade() else {
            break;
        };
        inner.autosave_tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ms, ready_store, store_with, test_config, words, RecordingPersistence};
    use crate::types::{Config, Identity};

    fn autosave_only() -> Config {
        Config {
            editor_debounce_ms: 600_000,
            ..test_config()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_commit_after_quiet_period() {
        let (store, _remote) = ready_store("ana").await;
        let session = EditorSession::open(&store, 1).unwrap();

        session.edit("Carlos");
        tokio::time::sleep(ms(1000)).await;
        session.edit("Carlos tiene");
        tokio::time::sleep(ms(1000)).await;
        session.edit("Carlos tiene 24 años");
        tokio::time::sleep(ms(2900)).await;
        assert_eq!(store.block_content(1), "");
        assert!(session.is_dirty());

        tokio::time::sleep(ms(200)).await;
        assert_eq!(store.block_content(1), "Carlos tiene 24 años");
        assert!(!session.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_only_when_dirty() {
        let (store, remote) = store_with("ana", RecordingPersistence::new(), autosave_only()).await;
        let session = EditorSession::open(&store, 2).unwrap();

        session.edit("la solución");
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.block_content(2), "la solución");
        assert!(!session.is_dirty());
        assert_eq!(remote.upsert_count(), 1);

        // Nothing new: the next tick writes nothing
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(remote.upsert_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_skips_blank_text() {
        let (store, _remote) =
            store_with("ana", RecordingPersistence::new(), autosave_only()).await;
        store.set_block_content(3, "previo").unwrap();
        let session = EditorSession::open(&store, 3).unwrap();
        assert_eq!(session.text(), "previo");

        session.edit("   ");
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(store.block_content(3), "previo");
        assert!(session.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_without_waiting() {
        let (store, remote) = ready_store("ana").await;
        let session = EditorSession::open(&store, 1).unwrap();

        session.edit("última frase");
        session.close().await.unwrap();

        assert_eq!(remote.upsert_count(), 1);
        assert_eq!(remote.row("ana").unwrap().blocks[&1], "última frase");
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_commits_dirty_text() {
        let (store, remote) = ready_store("ana").await;
        let session = EditorSession::open(&store, 5).unwrap();
        session.edit("mercado");
        drop(session);

        assert_eq!(store.block_content(5), "mercado");
        tokio::time::sleep(ms(600)).await;
        assert_eq!(remote.upsert_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_text_is_committed_by_debounce() {
        let (store, _remote) = ready_store("ana").await;
        store.set_block_content(1, "texto").unwrap();
        let session = EditorSession::open(&store, 1).unwrap();

        session.edit("");
        tokio::time::sleep(ms(3100)).await;
        assert_eq!(store.block_content(1), "");
        assert!(store.is_section_marked_completed(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_switch_discards_dirty_buffer() {
        let (store, remote) = ready_store("ana").await;
        let session = EditorSession::open(&store, 1).unwrap();
        session.edit("texto privado de ana");

        store.set_identity(&Identity::signed_in("leo")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;

        assert_eq!(store.user_id().as_deref(), Some("leo"));
        assert_eq!(store.block_content(1), "");
        assert!(!session.is_dirty());
        assert!(remote.upserts().iter().all(|row| row.user_id != "leo"));
        assert!(remote.row("leo").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_after_sign_out_and_back_in_writes_nothing() {
        let (store, remote) = ready_store("ana").await;
        let session = EditorSession::open(&store, 2).unwrap();
        session.edit("buffer de la sesión anterior");

        store.set_identity(&Identity::signed_out()).await.unwrap();
        store.set_identity(&Identity::signed_in("ana")).await.unwrap();

        assert!(matches!(session.close().await, Err(StoreError::IdentityChanged)));
        assert_eq!(store.block_content(2), "");
        assert_eq!(remote.upsert_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_after_identity_switch_commits_nothing() {
        let (store, remote) = ready_store("ana").await;
        let session = EditorSession::open(&store, 5).unwrap();
        session.edit("mercado de ana");

        store.set_identity(&Identity::signed_in("leo")).await.unwrap();
        drop(session);

        assert_eq!(store.block_content(5), "");
        tokio::time::sleep(ms(600)).await;
        assert_eq!(remote.upsert_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_after_identity_switch_commits_nothing() {
        let (store, remote) =
            store_with("ana", RecordingPersistence::new(), autosave_only()).await;
        let session = EditorSession::open(&store, 3).unwrap();
        session.edit("superpoder de ana");

        store.set_identity(&Identity::signed_in("leo")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(store.block_content(3), "");
        assert_eq!(remote.upsert_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_opened_before_identity_resolves_keeps_its_text() {
        let remote = Arc::new(RecordingPersistence::new());
        let store = PitchStore::new(test_config(), remote.clone());
        let session = EditorSession::open(&store, 1).unwrap();
        session.edit("escrito mientras carga");

        store.set_identity(&Identity::signed_in("ana")).await.unwrap();
        session.close().await.unwrap();

        assert_eq!(remote.row("ana").unwrap().blocks[&1], "escrito mientras carga");
    }

    #[tokio::test]
    async fn test_word_count_and_kit() {
        let (store, _remote) = ready_store("ana").await;
        assert!(matches!(
            EditorSession::open(&store, 0),
            Err(StoreError::InvalidBlock(0))
        ));

        let session = EditorSession::open(&store, 7).unwrap();
        session.edit("muy corto");
        assert_eq!(session.word_count(), 2);
        assert_eq!(session.word_count_status(), Some(WordCountStatus::Under));

        session.edit(words(80));
        assert_eq!(session.word_count_status(), Some(WordCountStatus::InRange));
        session.save_to_pitch_kit().unwrap();
        assert_eq!(store.block_content(7), words(80));
        assert_eq!(store.pitch_kit_total_words(), 80);
    }
}
