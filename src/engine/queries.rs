use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::*;

use super::{camera_events, Engine, EngineError};

impl Engine {
    pub async fn get_camera(&self, id: Ulid) -> Option<Camera> {
        let cs = self.store.get_camera(&id)?;
        let guard = cs.read().await;
        Some(guard.camera.clone())
    }

    /// All cameras, ordered by name (case-insensitive).
    pub async fn list_cameras(&self) -> Vec<Camera> {
        let mut cameras = Vec::with_capacity(self.store.camera_count());
        for id in self.store.camera_ids() {
            if let Some(camera) = self.get_camera(id).await {
                cameras.push(camera);
            }
        }
        cameras.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        cameras
    }

    pub async fn get_rental(&self, id: Ulid) -> Option<RentalRow> {
        let camera_id = self.store.camera_for_rental(&id)?;
        let cs = self.store.get_camera(&camera_id)?;
        let guard = cs.read().await;
        guard.rental(id).map(|rental| RentalRow {
            rental: rental.clone(),
            camera_name: guard.camera.name.clone(),
        })
    }

    /// Rentals matching `filter`, each with its camera's name, ordered by start day.
    pub async fn list_rentals(&self, filter: &RentalFilter) -> Vec<RentalRow> {
        if let Some(id) = filter.id {
            return self
                .get_rental(id)
                .await
                .filter(|row| filter.matches(&row.rental))
                .into_iter()
                .collect();
        }
        let camera_ids = match filter.camera_id {
            Some(id) => vec![id],
            None => self.store.camera_ids(),
        };

        let mut rows = Vec::new();
        for camera_id in camera_ids {
            let Some(cs) = self.store.get_camera(&camera_id) else {
                continue;
            };
            let guard = cs.read().await;
            rows.extend(
                guard
                    .rentals
                    .iter()
                    .filter(|r| filter.matches(r))
                    .map(|r| RentalRow {
                        rental: r.clone(),
                        camera_name: guard.camera.name.clone(),
                    }),
            );
        }
        rows.sort_by(|a, b| {
            a.rental
                .range
                .start
                .cmp(&b.rental.range.start)
                .then(a.rental.id.cmp(&b.rental.id))
        });
        rows
    }

    /// Active rentals on `camera_id` overlapping `[start, end]`.
    pub async fn rentals_overlapping(&self, camera_id: Ulid, range: DateRange) -> Vec<Rental> {
        let Some(cs) = self.store.get_camera(&camera_id) else {
            return Vec::new();
        };
        let guard = cs.read().await;
        guard
            .overlapping(&range)
            .filter(|r| r.is_active())
            .cloned()
            .collect()
    }

    /// Events that rebuild the current state from nothing: each camera, then its rentals.
    pub async fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for id in self.store.camera_ids() {
            let Some(cs) = self.store.get_camera(&id) else {
                continue;
            };
            camera_events(&*cs.read().await, &mut events);
        }
        events
    }

    /// Follow every event committed against `camera_id` from now on.
    /// The stream closes when the camera is deleted.
    pub async fn subscribe(&self, camera_id: Ulid) -> Result<broadcast::Receiver<Event>, EngineError> {
        let cs = self
            .store
            .get_camera(&camera_id)
            .ok_or(EngineError::NotFound(camera_id))?;
        // Delete drops the channel under the camera's write lock, so holding the
        // read lock here means we either see the camera gone or get removed with it.
        let _guard = cs.read().await;
        if !self.store.contains_camera(&camera_id) {
            return Err(EngineError::NotFound(camera_id));
        }
        Ok(self.notify.subscribe(camera_id))
    }
}
