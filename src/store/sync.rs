//! Identity, load and write-back for [`PitchStore`].

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{LoadState, PitchStore, StoreState, Touched};
use crate::error::{PersistenceError, StoreError};
use crate::persistence::PitchRecord;
use crate::types::{Identity, PitchData, SaveStatus};

impl PitchStore {
    // =========================================================================
    // Identity and load
    // =========================================================================

    /// React to the auth layer's current view of the user.
    ///
    /// - `loading`: nothing happens; mutations keep queueing.
    /// - signed out: pending timers are cancelled and state resets to defaults.
    /// - the already loaded (or loading) user: no refetch.
    /// - any other user: timers are cancelled, state is replaced by that
    ///   user's row (or defaults if they have none).
    pub async fn set_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        if identity.loading {
            log::debug!("PitchStore: identity still resolving");
            return Ok(());
        }
        match identity.user_id.as_deref() {
            Some(user_id) => self.load_user(user_id).await,
            None => {
                self.sign_out();
                Ok(())
            }
        }
    }

    /// Drive [`set_identity`](Self::set_identity) from an identity channel
    /// until the sender is dropped.
    pub fn watch_identity(&self, mut identity: watch::Receiver<Identity>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                let current = identity.borrow_and_update().clone();
                // Failures are logged and reflected in load state
                let _ = store.set_identity(&current).await;
                if identity.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Fetch the current user's row again after a failed load.
    pub async fn retry_load(&self) -> Result<(), StoreError> {
        let user_id = {
            let state = self.inner.state.lock();
            match (&state.user_id, state.load_state) {
                (Some(user_id), LoadState::Failed) => user_id.clone(),
                (Some(_), _) => return Ok(()),
                (None, _) => return Err(StoreError::NoIdentity),
            }
        };
        self.load_user(&user_id).await
    }

    fn sign_out(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.load_state == LoadState::SignedOut {
                return;
            }
            state.cancel_debounce();
            if !state.pending.is_empty() {
                log::warn!(
                    "PitchStore: discarding unsynced {} on sign-out",
                    state.pending.describe()
                );
            }
            state.epoch += 1;
            state.identity_generation += 1;
            state.data = PitchData::default();
            state.user_id = None;
            state.pending = Touched::default();
            state.deferred.clear();
            state.load_state = LoadState::SignedOut;
        }
        self.set_status(SaveStatus::Idle);
        log::info!("PitchStore: signed out, state reset");
    }

    async fn load_user(&self, user_id: &str) -> Result<(), StoreError> {
        let epoch = {
            let mut state = self.inner.state.lock();
            let same_user = state.user_id.as_deref() == Some(user_id);
            if same_user && matches!(state.load_state, LoadState::Loading | LoadState::Ready) {
                log::debug!("PitchStore: {} already loaded, skipping refetch", user_id);
                return Ok(());
            }

            state.cancel_debounce();
            if !same_user && state.user_id.is_some() {
                // Nothing from the previous account may reach this one
                if !state.pending.is_empty() || !state.deferred.is_empty() {
                    log::warn!("PitchStore: discarding unsynced changes on identity switch");
                }
                state.data = PitchData::default();
                state.deferred.clear();
                state.identity_generation += 1;
            }
            state.pending = Touched::default();
            state.epoch += 1;
            state.user_id = Some(user_id.to_string());
            state.load_state = LoadState::Loading;
            state.epoch
        };

        log::info!("PitchStore: loading pitch data for {}", user_id);
        let result = self.inner.persistence.get_record(user_id).await;

        let mut state = self.inner.state.lock();
        if state.epoch != epoch {
            log::debug!("PitchStore: discarding stale load for {}", user_id);
            return Ok(());
        }

        match result {
            Ok(row) => {
                let found = row.is_some();
                let mut data = row.map(PitchRecord::into_data).unwrap_or_default();
                let mut pending = Touched::default();
                for mutation in state.deferred.drain(..) {
                    pending.merge(mutation.apply(&mut data));
                }
                state.data = data;
                state.pending = pending;
                state.load_state = LoadState::Ready;
                log::info!(
                    "PitchStore: loaded {} ({})",
                    user_id,
                    if found { "existing row" } else { "new user" }
                );
                if !pending.is_empty() {
                    log::info!("PitchStore: replaying {} made during load", pending.describe());
                    self.schedule_save(&mut state);
                }
                Ok(())
            }
            Err(e) => {
                log::error!("PitchStore: failed to load pitch data for {}: {}", user_id, e);
                state.load_state = LoadState::Failed;
                Err(StoreError::Load(e.to_string()))
            }
        }
    }

    // =========================================================================
    // Write-back
    // =========================================================================

    /// Restart the debounce timer for the pending patch.
    pub(super) fn schedule_save(&self, state: &mut StoreState) {
        state.cancel_debounce();
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("PitchStore: no async runtime, save waits for the next flush");
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let epoch = state.epoch;
        let delay = Duration::from_millis(self.inner.config.save_debounce_ms);
        state.debounce = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let store = PitchStore { inner };
            if store.claim_debounce(epoch) {
                // Failures are logged and surfaced through the status channel
                let _ = store.write_pending().await;
            }
        }));
    }

    /// Detach the firing debounce so later mutations schedule a new one
    /// instead of aborting this write mid-flight.
    fn claim_debounce(&self, epoch: u64) -> bool {
        let mut state = self.inner.state.lock();
        if state.epoch != epoch {
            return false;
        }
        state.debounce = None;
        true
    }

    /// Cancel the debounce and write the pending patch now.
    ///
    /// Used on navigation and teardown so the last edits are never lost.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let handle = self.inner.state.lock().debounce.take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.write_pending().await
    }

    /// Upsert the full row if anything is pending.
    async fn write_pending(&self) -> Result<(), StoreError> {
        let _guard = self.inner.write_lock.lock().await;

        let (record, touched, epoch) = {
            let mut state = self.inner.state.lock();
            if state.load_state != LoadState::Ready || state.pending.is_empty() {
                return Ok(());
            }
            let Some(user_id) = state.user_id.clone() else {
                return Ok(());
            };
            let touched = std::mem::take(&mut state.pending);
            (PitchRecord::from_data(&user_id, &state.data), touched, state.epoch)
        };

        self.set_status(SaveStatus::Saving);
        log::debug!(
            "PitchStore: saving {} for {}",
            touched.describe(),
            record.user_id
        );

        match self.upsert_with_retry(record).await {
            Ok(()) => {
                self.set_status(SaveStatus::Saved);
                Ok(())
            }
            Err(e) => {
                log::error!("PitchStore: save failed ({}): {}", touched.describe(), e);
                {
                    let mut state = self.inner.state.lock();
                    if state.epoch == epoch {
                        state.pending.merge(touched);
                    }
                }
                self.set_status(SaveStatus::Error);
                Err(StoreError::Save(e.to_string()))
            }
        }
    }

    async fn upsert_with_retry(&self, record: PitchRecord) -> Result<(), PersistenceError> {
        let policy = self.inner.config.retry;
        let attempts = policy.attempts();
        let mut attempt = 1;
        loop {
            match self.inner.persistence.upsert(record.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    log::warn!(
                        "PitchStore: save attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        e
                    );
                    let delay = policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Publish `status`; `Saved` and `Error` revert to `Idle` after the reset delay.
    fn set_status(&self, status: SaveStatus) {
        let mut state = self.inner.state.lock();
        state.status_generation += 1;
        if let Some(handle) = state.status_reset.take() {
            handle.abort();
        }
        self.inner.status_tx.send_replace(status);

        if !matches!(status, SaveStatus::Saved | SaveStatus::Error) {
            return;
        }
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let weak = Arc::downgrade(&self.inner);
        let generation = state.status_generation;
        let delay = Duration::from_millis(self.inner.config.status_reset_ms);
        state.status_reset = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                let state = inner.state.lock();
                if state.status_generation == generation {
                    inner.status_tx.send_replace(SaveStatus::Idle);
                }
            }
        }));
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Delete the remote row, then reset local state to defaults.
    ///
    /// All or nothing: if the delete fails, local state is left as it was and
    /// any pending edits are rescheduled.
    pub async fn reset_data(&self) -> Result<(), StoreError> {
        let (user_id, epoch) = {
            let mut state = self.inner.state.lock();
            let Some(user_id) = state.user_id.clone() else {
                log::warn!("PitchStore: reset requested without an identity");
                return Err(StoreError::NoIdentity);
            };
            if state.load_state == LoadState::Loading {
                log::warn!("PitchStore: reset requested while {} is loading", user_id);
                return Err(StoreError::Reset("pitch data is still loading".into()));
            }
            state.cancel_debounce();
            (user_id, state.epoch)
        };

        let _guard = self.inner.write_lock.lock().await;
        let result = self.inner.persistence.delete(&user_id).await;

        let mut state = self.inner.state.lock();
        if state.epoch != epoch {
            log::warn!("PitchStore: identity changed while resetting {}", user_id);
            return Err(StoreError::Reset("identity changed during reset".into()));
        }

        match result {
            Ok(()) => {
                state.data = PitchData::default();
                state.pending = Touched::default();
                state.deferred.clear();
                state.load_state = LoadState::Ready;
                log::info!("PitchStore: reset pitch data for {}", user_id);
                Ok(())
            }
            Err(e) => {
                log::error!("PitchStore: failed to reset pitch data for {}: {}", user_id, e);
                if !state.pending.is_empty() {
                    self.schedule_save(&mut state);
                }
                Err(StoreError::Reset(e.to_string()))
            }
        }
    }
}
