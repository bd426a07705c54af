//! Reservation decisions. Pure functions over a camera's current state:
//! nothing here touches storage, locks or the journal.
//!
//! Overlap policy is inclusive everywhere: a rental ending on the 5th and
//! another starting on the 5th both hold the camera that day, so they conflict.

use ulid::Ulid;

use crate::date::Day;
use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub fn validate_range(start: Day, end: Day) -> Result<DateRange, EngineError> {
    if start > end {
        return Err(EngineError::InvalidRange { start, end });
    }
    if start.day_count(end) > i64::from(MAX_RENTAL_DAYS) {
        return Err(EngineError::LimitExceeded("rental too long"));
    }
    Ok(DateRange::new(start, end))
}

/// First active rental on `camera` overlapping `range`, ignoring `exclude`.
pub fn find_conflict<'a>(
    camera: &'a CameraState,
    range: &DateRange,
    exclude: Option<Ulid>,
) -> Option<&'a Rental> {
    camera
        .overlapping(range)
        .find(|r| r.is_active() && Some(r.id) != exclude)
}

pub fn has_conflict(camera: &CameraState, range: &DateRange, exclude: Option<Ulid>) -> bool {
    find_conflict(camera, range, exclude).is_some()
}

fn check_no_conflict(
    camera: &CameraState,
    range: &DateRange,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    match find_conflict(camera, range, exclude) {
        Some(existing) => Err(EngineError::Conflict(existing.id)),
        None => Ok(()),
    }
}

/// Range covering `duration_days` days from `new_start`: one day keeps start == end.
pub fn moved_range(new_start: Day, duration_days: u32) -> Result<DateRange, EngineError> {
    if duration_days == 0 {
        let end = new_start.add_days(-1).unwrap_or(new_start);
        return Err(EngineError::InvalidRange {
            start: new_start,
            end,
        });
    }
    if duration_days > MAX_RENTAL_DAYS {
        return Err(EngineError::LimitExceeded("rental too long"));
    }
    let end = new_start
        .add_days(i64::from(duration_days) - 1)
        .ok_or(EngineError::LimitExceeded("date out of range"))?;
    Ok(DateRange::new(new_start, end))
}

pub fn decide_create(
    camera: &CameraState,
    draft: RentalDraft,
    id: Ulid,
) -> Result<Rental, EngineError> {
    debug_assert_eq!(draft.camera_id, camera.id());
    let range = validate_range(draft.start, draft.end)?;
    let notes = checked_notes(draft.notes.unwrap_or_default())?;
    let color = checked_color(draft.color)?;
    if camera.rentals.len() >= MAX_RENTALS_PER_CAMERA {
        return Err(EngineError::LimitExceeded("too many rentals on camera"));
    }
    check_no_conflict(camera, &range, None)?;
    Ok(Rental {
        id,
        camera_id: camera.id(),
        range,
        notes,
        color,
        status: RentalStatus::Active,
    })
}

/// Merge `patch` over `current`. `target` is the camera the merged rental lands on.
/// Dates and camera are re-checked only when one of them actually changed.
pub fn decide_update(
    current: &Rental,
    patch: RentalPatch,
    target: &CameraState,
) -> Result<Rental, EngineError> {
    ensure_active(current)?;
    let camera_id = patch.camera_id.unwrap_or(current.camera_id);
    debug_assert_eq!(camera_id, target.id());
    let start = patch.start.unwrap_or(current.range.start);
    let end = patch.end.unwrap_or(current.range.end);

    let mut next = current.clone();
    if let Some(notes) = patch.notes {
        next.notes = checked_notes(notes)?;
    }
    if let Some(color) = patch.color {
        next.color = checked_color(Some(color))?;
    }
    if let Some(status) = patch.status {
        next.status = status;
    }

    let rescheduled = camera_id != current.camera_id
        || start != current.range.start
        || end != current.range.end;
    if rescheduled {
        let range = validate_range(start, end)?;
        // A patch that also cancels frees the slot; nothing to collide with.
        if next.is_active() {
            check_no_conflict(target, &range, Some(current.id))?;
        }
        next.camera_id = camera_id;
        next.range = range;
    }
    Ok(next)
}

/// Drag-to-move: the caller gives a start and a span length, never an end day.
pub fn decide_move(
    current: &Rental,
    new_start: Day,
    duration_days: u32,
    target: &CameraState,
) -> Result<Rental, EngineError> {
    ensure_active(current)?;
    let range = moved_range(new_start, duration_days)?;
    reschedule(current, target, range)
}

pub fn decide_resize(
    current: &Rental,
    new_start: Day,
    new_end: Day,
    target: &CameraState,
) -> Result<Rental, EngineError> {
    ensure_active(current)?;
    let range = validate_range(new_start, new_end)?;
    reschedule(current, target, range)
}

pub fn decide_cancel(current: &Rental) -> Result<Rental, EngineError> {
    ensure_active(current)?;
    let mut next = current.clone();
    next.status = RentalStatus::Cancelled;
    Ok(next)
}

fn reschedule(
    current: &Rental,
    target: &CameraState,
    range: DateRange,
) -> Result<Rental, EngineError> {
    check_no_conflict(target, &range, Some(current.id))?;
    let mut next = current.clone();
    next.camera_id = target.id();
    next.range = range;
    Ok(next)
}

fn ensure_active(rental: &Rental) -> Result<(), EngineError> {
    if rental.is_active() {
        Ok(())
    } else {
        Err(EngineError::AlreadyCancelled(rental.id))
    }
}

fn checked_notes(notes: String) -> Result<String, EngineError> {
    if notes.len() > MAX_NOTES_LEN {
        return Err(EngineError::LimitExceeded("notes too long"));
    }
    Ok(notes)
}

fn checked_color(color: Option<String>) -> Result<String, EngineError> {
    let color = match color.as_deref().map(str::trim) {
        None | Some("") => return Ok(DEFAULT_COLOR.to_string()),
        Some(c) => c,
    };
    if color.len() > MAX_COLOR_LEN {
        return Err(EngineError::LimitExceeded("color too long"));
    }
    Ok(color.to_string())
}

// ── Cameras ──────────────────────────────────────────────────────

/// Trimmed display name, rejected when empty or oversized.
pub fn normalize_name(name: &str) -> Result<String, EngineError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("camera name too long"));
    }
    Ok(name.to_string())
}

/// Uniqueness key: names differing only in case collide.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn checked_link(link: Option<String>) -> Result<String, EngineError> {
    let link = link.map(|l| l.trim().to_string()).unwrap_or_default();
    if link.len() > MAX_LINK_LEN {
        return Err(EngineError::LimitExceeded("link too long"));
    }
    Ok(link)
}
