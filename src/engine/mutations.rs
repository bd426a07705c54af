use tracing::{debug, info};
use ulid::Ulid;

use crate::date::Day;
use crate::limits::MAX_CAMERAS;
use crate::model::*;
use crate::observability::RENTAL_DECISIONS_TOTAL;

use super::validator::{self, checked_link, name_key, normalize_name};
use super::{CameraLocks, Engine, EngineError};

/// Count the decision and log rejections. Accepted decisions are logged once committed.
fn decided<T>(op: &'static str, result: Result<T, EngineError>) -> Result<T, EngineError> {
    let outcome = match &result {
        Ok(_) => "accepted",
        Err(e) => e.kind(),
    };
    metrics::counter!(RENTAL_DECISIONS_TOTAL, "op" => op, "outcome" => outcome).increment(1);
    if let Err(e) = &result {
        debug!(op, error = %e, "rental rejected");
    }
    result
}

fn locked_camera(locks: &CameraLocks, id: Ulid) -> Result<&CameraState, EngineError> {
    locks.get(id).ok_or(EngineError::UnknownResource(id))
}

impl Engine {
    // ── Cameras ──────────────────────────────────────────────

    pub async fn create_camera(&self, name: &str, link: Option<String>) -> Result<Camera, EngineError> {
        let name = normalize_name(name)?;
        let link = checked_link(link)?;

        let _catalog = self.catalog.lock().await;
        if self.store.camera_count() >= MAX_CAMERAS {
            return Err(EngineError::LimitExceeded("too many cameras"));
        }
        if self.store.camera_by_name(&name).is_some() {
            return Err(EngineError::DuplicateName(name));
        }

        let camera = Camera {
            id: Ulid::new(),
            name,
            link,
            status: CameraStatus::Available,
        };
        self.commit(
            &mut CameraLocks::default(),
            Event::CameraCreated {
                camera: camera.clone(),
            },
        )
        .await?;
        info!(camera = %camera.id, name = %camera.name, "camera created");
        Ok(camera)
    }

    pub async fn update_camera(&self, id: Ulid, patch: CameraPatch) -> Result<Camera, EngineError> {
        let _catalog = self.catalog.lock().await;
        let mut locks = self.lock_cameras(&[id]).await.map_err(EngineError::NotFound)?;
        let current = locked_camera(&locks, id)?.camera.clone();

        let mut next = current.clone();
        if let Some(name) = patch.name {
            let name = normalize_name(&name)?;
            if let Some(other) = self.store.camera_by_name(&name)
                && other != id
            {
                return Err(EngineError::DuplicateName(name));
            }
            next.name = name;
        }
        if let Some(link) = patch.link {
            next.link = checked_link(Some(link))?;
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if next == current {
            return Ok(current);
        }

        self.commit(&mut locks, Event::CameraUpdated { camera: next.clone() })
            .await?;
        if name_key(&next.name) != name_key(&current.name) {
            info!(camera = %id, from = %current.name, to = %next.name, "camera renamed");
        }
        Ok(next)
    }

    /// Delete a camera and every rental it holds. Returns how many rentals went with it.
    pub async fn delete_camera(&self, id: Ulid) -> Result<usize, EngineError> {
        let _catalog = self.catalog.lock().await;
        let mut locks = self.lock_cameras(&[id]).await.map_err(EngineError::NotFound)?;
        let removed = locked_camera(&locks, id)?.rentals.len();

        self.commit(&mut locks, Event::CameraDeleted { id }).await?;
        self.notify.remove(&id);
        info!(camera = %id, rentals = removed, "camera deleted");
        Ok(removed)
    }

    // ── Rentals ──────────────────────────────────────────────

    pub async fn create_rental(&self, draft: RentalDraft) -> Result<Rental, EngineError> {
        let camera_id = draft.camera_id;
        let mut locks = self
            .lock_cameras(&[camera_id])
            .await
            .map_err(EngineError::UnknownResource)?;
        let camera = locked_camera(&locks, camera_id)?;
        let rental = decided("create", validator::decide_create(camera, draft, Ulid::new()))?;

        self.commit(&mut locks, Event::RentalCreated { rental: rental.clone() })
            .await?;
        info!(
            rental = %rental.id,
            camera = %camera_id,
            start = %rental.range.start,
            end = %rental.range.end,
            "rental created"
        );
        Ok(rental)
    }

    /// Partial update. Only a change of camera or dates is conflict-checked;
    /// a patch setting status to cancelled behaves as a cancel.
    pub async fn update_rental(&self, id: Ulid, patch: RentalPatch) -> Result<Rental, EngineError> {
        let (current, mut locks) = self.lock_rental(id, patch.camera_id).await?;
        let target = locked_camera(&locks, patch.camera_id.unwrap_or(current.camera_id))?;
        let next = decided("update", validator::decide_update(&current, patch, target))?;
        self.commit_rental(&mut locks, &current, next).await
    }

    /// Drag-to-move: keep the span length, recompute the end from `new_start`.
    pub async fn move_rental(
        &self,
        id: Ulid,
        new_start: Day,
        duration_days: u32,
        new_camera: Option<Ulid>,
    ) -> Result<Rental, EngineError> {
        let (current, mut locks) = self.lock_rental(id, new_camera).await?;
        let target = locked_camera(&locks, new_camera.unwrap_or(current.camera_id))?;
        let next = decided(
            "move",
            validator::decide_move(&current, new_start, duration_days, target),
        )?;
        self.commit_rental(&mut locks, &current, next).await
    }

    /// Drag-to-resize: both endpoints given explicitly.
    pub async fn resize_rental(
        &self,
        id: Ulid,
        new_start: Day,
        new_end: Day,
        new_camera: Option<Ulid>,
    ) -> Result<Rental, EngineError> {
        let (current, mut locks) = self.lock_rental(id, new_camera).await?;
        let target = locked_camera(&locks, new_camera.unwrap_or(current.camera_id))?;
        let next = decided(
            "resize",
            validator::decide_resize(&current, new_start, new_end, target),
        )?;
        self.commit_rental(&mut locks, &current, next).await
    }

    pub async fn cancel_rental(&self, id: Ulid) -> Result<Rental, EngineError> {
        let (current, mut locks) = self.lock_rental(id, None).await?;
        let next = decided("cancel", validator::decide_cancel(&current))?;
        self.commit_rental(&mut locks, &current, next).await
    }

    /// Journal the difference between `current` and `next`. No-op when unchanged.
    async fn commit_rental(
        &self,
        locks: &mut CameraLocks,
        current: &Rental,
        next: Rental,
    ) -> Result<Rental, EngineError> {
        if next == *current {
            return Ok(next);
        }
        let cancel_only = !next.is_active()
            && Rental {
                status: current.status,
                ..next.clone()
            } == *current;
        let event = if cancel_only {
            Event::RentalCancelled {
                id: next.id,
                camera_id: next.camera_id,
            }
        } else {
            Event::RentalUpdated {
                rental: next.clone(),
                previous_camera: current.camera_id,
            }
        };
        self.commit(locks, event).await?;

        if cancel_only {
            info!(rental = %next.id, camera = %next.camera_id, "rental cancelled");
        } else {
            info!(
                rental = %next.id,
                camera = %next.camera_id,
                start = %next.range.start,
                end = %next.range.end,
                "rental updated"
            );
        }
        Ok(next)
    }
}
