use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;

use super::validator::name_key;

pub type SharedCameraState = Arc<RwLock<CameraState>>;

/// In-memory state: every camera with its rentals, plus the lookup indexes.
/// Mutated only through `apply_event`, by a caller holding the write locks
/// of every camera the event touches.
pub struct InMemoryStore {
    cameras: DashMap<Ulid, SharedCameraState>,
    rental_to_camera: DashMap<Ulid, Ulid>,
    /// Lowercased, trimmed name → camera id.
    names: DashMap<String, Ulid>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            cameras: DashMap::new(),
            rental_to_camera: DashMap::new(),
            names: DashMap::new(),
        }
    }

    // ── Cameras ──────────────────────────────────────────────

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    pub fn contains_camera(&self, id: &Ulid) -> bool {
        self.cameras.contains_key(id)
    }

    pub fn get_camera(&self, id: &Ulid) -> Option<SharedCameraState> {
        self.cameras.get(id).map(|e| e.value().clone())
    }

    pub fn camera_ids(&self) -> Vec<Ulid> {
        self.cameras.iter().map(|e| *e.key()).collect()
    }

    pub fn camera_by_name(&self, name: &str) -> Option<Ulid> {
        self.names.get(&name_key(name)).map(|e| *e.value())
    }

    // ── Rentals ──────────────────────────────────────────────

    pub fn camera_for_rental(&self, rental_id: &Ulid) -> Option<Ulid> {
        self.rental_to_camera.get(rental_id).map(|e| *e.value())
    }

    pub fn rental_count(&self) -> usize {
        self.rental_to_camera.len()
    }

    // ── Event application ────────────────────────────────────

    /// Apply a committed event. Cameras the event touches must be held in `locks`,
    /// except the camera a `CameraCreated` brings into existence.
    pub fn apply_event(&self, locks: &mut CameraLocks, event: &Event) {
        match event {
            Event::CameraCreated { camera } => {
                self.names.insert(name_key(&camera.name), camera.id);
                self.cameras.insert(
                    camera.id,
                    Arc::new(RwLock::new(CameraState::new(camera.clone()))),
                );
            }
            Event::CameraUpdated { camera } => {
                if let Some(cs) = locks.get_mut(camera.id) {
                    let old_key = name_key(&cs.camera.name);
                    let new_key = name_key(&camera.name);
                    if old_key != new_key {
                        self.names.remove(&old_key);
                    }
                    self.names.insert(new_key, camera.id);
                    cs.camera = camera.clone();
                }
            }
            Event::CameraDeleted { id } => {
                if let Some(cs) = locks.get_mut(*id) {
                    for rental in cs.rentals.drain(..) {
                        self.rental_to_camera.remove(&rental.id);
                    }
                    self.names.remove(&name_key(&cs.camera.name));
                }
                self.cameras.remove(id);
            }
            Event::RentalCreated { rental } => {
                if let Some(cs) = locks.get_mut(rental.camera_id) {
                    cs.insert_rental(rental.clone());
                    self.rental_to_camera.insert(rental.id, rental.camera_id);
                }
            }
            Event::RentalUpdated {
                rental,
                previous_camera,
            } => {
                if let Some(cs) = locks.get_mut(*previous_camera) {
                    cs.remove_rental(rental.id);
                }
                if let Some(cs) = locks.get_mut(rental.camera_id) {
                    cs.insert_rental(rental.clone());
                    self.rental_to_camera.insert(rental.id, rental.camera_id);
                }
            }
            Event::RentalCancelled { id, camera_id } => {
                if let Some(rental) = locks
                    .get_mut(*camera_id)
                    .and_then(|cs| cs.rentals.iter_mut().find(|r| r.id == *id))
                {
                    rental.status = RentalStatus::Cancelled;
                }
            }
        }
    }
}

/// Write guards over a set of cameras, held for the whole decide-and-commit step.
#[derive(Default)]
pub struct CameraLocks {
    guards: Vec<OwnedRwLockWriteGuard<CameraState>>,
}

impl CameraLocks {
    pub fn push(&mut self, guard: OwnedRwLockWriteGuard<CameraState>) {
        self.guards.push(guard);
    }

    pub fn get(&self, id: Ulid) -> Option<&CameraState> {
        self.guards.iter().find(|g| g.id() == id).map(|g| &**g)
    }

    pub fn get_mut(&mut self, id: Ulid) -> Option<&mut CameraState> {
        self.guards
            .iter_mut()
            .find(|g| g.id() == id)
            .map(|g| &mut **g)
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}
