use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::date::Day;

/// Color given to rentals created without one.
pub const DEFAULT_COLOR: &str = "#409eff";

/// Closed interval `[start, end]` of calendar days. Both ends are rented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Day,
    pub end: Day,
}

impl DateRange {
    /// Build without checking order. Use `validator::validate_range` for caller input.
    pub fn new(start: Day, end: Day) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    /// Inclusive overlap: ranges that share even a boundary day overlap.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn days(&self) -> i64 {
        self.start.day_count(self.end)
    }

    pub fn contains(&self, day: Day) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraStatus {
    Available,
    Maintenance,
}

impl CameraStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Available => "available",
            CameraStatus::Maintenance => "maintenance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Some(CameraStatus::Available),
            "maintenance" => Some(CameraStatus::Maintenance),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RentalStatus {
    Active,
    /// Terminal. Kept for history, invisible to conflict checks.
    Cancelled,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Active => "active",
            RentalStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(RentalStatus::Active),
            "cancelled" | "canceled" => Some(RentalStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Camera {
    pub id: Ulid,
    pub name: String,
    pub link: String,
    pub status: CameraStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rental {
    pub id: Ulid,
    pub camera_id: Ulid,
    pub range: DateRange,
    pub notes: String,
    pub color: String,
    pub status: RentalStatus,
}

impl Rental {
    pub fn is_active(&self) -> bool {
        self.status == RentalStatus::Active
    }
}

/// Caller input for a new rental.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalDraft {
    pub camera_id: Ulid,
    pub start: Day,
    pub end: Day,
    pub notes: Option<String>,
    pub color: Option<String>,
}

/// Partial update of a rental. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RentalPatch {
    pub camera_id: Option<Ulid>,
    pub start: Option<Day>,
    pub end: Option<Day>,
    pub notes: Option<String>,
    pub color: Option<String>,
    pub status: Option<RentalStatus>,
}

impl RentalPatch {
    pub fn is_empty(&self) -> bool {
        *self == RentalPatch::default()
    }
}

/// Partial update of a camera.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraPatch {
    pub name: Option<String>,
    pub link: Option<String>,
    pub status: Option<CameraStatus>,
}

/// A camera and every rental ever made against it.
#[derive(Debug, Clone)]
pub struct CameraState {
    pub camera: Camera,
    /// Active and cancelled rentals, sorted by `range.start`.
    pub rentals: Vec<Rental>,
}

impl CameraState {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            rentals: Vec::new(),
        }
    }

    pub fn id(&self) -> Ulid {
        self.camera.id
    }

    /// Insert rental maintaining sort order by start day.
    pub fn insert_rental(&mut self, rental: Rental) {
        let pos = self
            .rentals
            .binary_search_by_key(&rental.range.start, |r| r.range.start)
            .unwrap_or_else(|e| e);
        self.rentals.insert(pos, rental);
    }

    pub fn remove_rental(&mut self, id: Ulid) -> Option<Rental> {
        let pos = self.rentals.iter().position(|r| r.id == id)?;
        Some(self.rentals.remove(pos))
    }

    pub fn rental(&self, id: Ulid) -> Option<&Rental> {
        self.rentals.iter().find(|r| r.id == id)
    }

    /// Rentals of any status whose range overlaps `query`.
    /// Binary search skips everything starting after `query.end`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Rental> {
        let right_bound = self.rentals.partition_point(|r| r.range.start <= query.end);
        self.rentals[..right_bound]
            .iter()
            .filter(move |r| r.range.end >= query.start)
    }

    pub fn active_count(&self) -> usize {
        self.rentals.iter().filter(|r| r.is_active()).count()
    }
}

/// Journal record. Flat, one variant per committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CameraCreated {
        camera: Camera,
    },
    CameraUpdated {
        camera: Camera,
    },
    /// Removes the camera and every rental referencing it.
    CameraDeleted {
        id: Ulid,
    },
    RentalCreated {
        rental: Rental,
    },
    /// Full replacement. `previous_camera` differs from `rental.camera_id` on a cross-camera move.
    RentalUpdated {
        rental: Rental,
        previous_camera: Ulid,
    },
    RentalCancelled {
        id: Ulid,
        camera_id: Ulid,
    },
}

impl Event {
    /// Cameras whose state this event changes.
    pub fn camera_ids(&self) -> Vec<Ulid> {
        match self {
            Event::CameraCreated { camera } | Event::CameraUpdated { camera } => vec![camera.id],
            Event::CameraDeleted { id } => vec![*id],
            Event::RentalCreated { rental } => vec![rental.camera_id],
            Event::RentalUpdated {
                rental,
                previous_camera,
            } => {
                if rental.camera_id == *previous_camera {
                    vec![rental.camera_id]
                } else {
                    vec![*previous_camera, rental.camera_id]
                }
            }
            Event::RentalCancelled { camera_id, .. } => vec![*camera_id],
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalRow {
    pub rental: Rental,
    pub camera_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RentalFilter {
    pub id: Option<Ulid>,
    pub camera_id: Option<Ulid>,
    pub status: Option<RentalStatus>,
}

impl RentalFilter {
    pub fn matches(&self, rental: &Rental) -> bool {
        self.id.is_none_or(|id| rental.id == id)
            && self.camera_id.is_none_or(|cid| rental.camera_id == cid)
            && self.status.is_none_or(|s| rental.status == s)
    }
}
