mod error;
mod journal;
mod mutations;
mod queries;
mod store;
pub mod validator;

pub use error::EngineError;
pub use journal::{Journal, MemoryJournal, WalJournal};
pub use store::{CameraLocks, InMemoryStore, SharedCameraState};

use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;

/// The reservation engine: camera catalog, rentals, conflict decisions.
///
/// Every mutation locks the cameras it touches (ascending id order), decides
/// against that locked state, appends the event to the journal, then applies
/// it. Readers never see a decision that was not journaled.
pub struct Engine {
    pub(super) store: InMemoryStore,
    pub(super) journal: Arc<dyn Journal>,
    pub notify: Arc<NotifyHub>,
    /// Held across camera create/update/delete so name uniqueness checks see a stable catalog.
    pub(super) catalog: Mutex<()>,
}

impl Engine {
    /// Open a file-backed engine, replaying the journal at `wal_path`.
    pub fn open(wal_path: &Path, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let (journal, history) = WalJournal::open(wal_path)?;
        let engine = Self::with_journal(Arc::new(journal), &history, notify);
        info!(
            events = history.len(),
            cameras = engine.store.camera_count(),
            rentals = engine.store.rental_count(),
            "journal replayed"
        );
        Ok(engine)
    }

    /// Engine that keeps nothing across restarts.
    pub fn in_memory(notify: Arc<NotifyHub>) -> Self {
        Self::with_journal(Arc::new(MemoryJournal::new()), &[], notify)
    }

    /// Rebuild state from `history`, then commit future events to `journal`.
    pub fn with_journal(journal: Arc<dyn Journal>, history: &[Event], notify: Arc<NotifyHub>) -> Self {
        let engine = Self {
            store: InMemoryStore::new(),
            journal,
            notify,
            catalog: Mutex::new(()),
        };
        for event in history {
            // Sole owner of every lock here, so try_write_owned cannot contend.
            // Never block: this may run inside the runtime.
            let mut locks = CameraLocks::default();
            for id in event.camera_ids() {
                if let Some(cs) = engine.store.get_camera(&id)
                    && let Ok(guard) = cs.try_write_owned()
                {
                    locks.push(guard);
                }
            }
            engine.store.apply_event(&mut locks, event);
        }
        engine
    }

    /// Journal, apply, notify. The caller holds `locks` for every camera the event touches.
    pub(super) async fn commit(&self, locks: &mut CameraLocks, event: Event) -> Result<(), EngineError> {
        self.journal.append(&event).await?;
        self.store.apply_event(locks, &event);
        for camera_id in event.camera_ids() {
            self.notify.send(camera_id, &event);
        }
        Ok(())
    }

    /// Write-lock `ids` in ascending order. `Err(id)` names the first camera that
    /// does not exist, or was deleted while we waited for its lock.
    pub(super) async fn lock_cameras(&self, ids: &[Ulid]) -> Result<CameraLocks, Ulid> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        let mut locks = CameraLocks::default();
        for id in ids {
            let cs = self.store.get_camera(&id).ok_or(id)?;
            locks.push(cs.write_owned().await);
            if !self.store.contains_camera(&id) {
                return Err(id);
            }
        }
        Ok(locks)
    }

    /// Lock the camera currently holding `rental_id` plus `target`, and return the
    /// rental as it is under those locks. Retries when the rental moved between
    /// the index lookup and the lock.
    pub(super) async fn lock_rental(
        &self,
        rental_id: Ulid,
        target: Option<Ulid>,
    ) -> Result<(Rental, CameraLocks), EngineError> {
        loop {
            let home = self
                .store
                .camera_for_rental(&rental_id)
                .ok_or(EngineError::NotFound(rental_id))?;
            let target = target.unwrap_or(home);
            let locks = match self.lock_cameras(&[home, target]).await {
                Ok(locks) => locks,
                Err(missing) if missing == target && missing != home => {
                    return Err(EngineError::UnknownResource(missing));
                }
                // Home camera deleted under us; the index no longer lists the rental.
                Err(_) => continue,
            };
            if let Some(rental) = locks.get(home).and_then(|cs| cs.rental(rental_id)) {
                return Ok((rental.clone(), locks));
            }
        }
    }

    /// Lock the whole catalog and every camera, snapshot, and compact the journal.
    /// Returns the number of events written.
    pub async fn compact_journal(&self) -> Result<usize, EngineError> {
        let _catalog = self.catalog.lock().await;
        let locks = self
            .lock_cameras(&self.store.camera_ids())
            .await
            .map_err(EngineError::NotFound)?;
        let mut events = Vec::new();
        for id in self.store.camera_ids() {
            if let Some(cs) = locks.get(id) {
                camera_events(cs, &mut events);
            }
        }
        let count = events.len();
        self.journal.compact(events).await?;
        Ok(count)
    }

    pub async fn journal_appends_since_compact(&self) -> u64 {
        self.journal.appends_since_compact().await
    }
}

/// Append the events that recreate `cs`: the camera, then each of its rentals.
pub(super) fn camera_events(cs: &CameraState, out: &mut Vec<Event>) {
    out.push(Event::CameraCreated {
        camera: cs.camera.clone(),
    });
    out.extend(cs.rentals.iter().map(|r| Event::RentalCreated { rental: r.clone() }));
}
