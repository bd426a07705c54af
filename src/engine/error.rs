use ulid::Ulid;

use crate::date::Day;

#[derive(Debug)]
pub enum EngineError {
    /// End day before start day, or a move with a zero-day duration.
    InvalidRange { start: Day, end: Day },
    /// Overlaps the given active rental on the same camera.
    Conflict(Ulid),
    NotFound(Ulid),
    /// Rental references a camera that does not exist.
    UnknownResource(Ulid),
    AlreadyCancelled(Ulid),
    InvalidName,
    DuplicateName(String),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid range: end {end} is before start {start}")
            }
            EngineError::Conflict(id) => {
                write!(f, "dates already booked: conflicts with rental {id}")
            }
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::UnknownResource(id) => write!(f, "unknown camera: {id}"),
            EngineError::AlreadyCancelled(id) => write!(f, "rental {id} is already cancelled"),
            EngineError::InvalidName => write!(f, "camera name must not be empty"),
            EngineError::DuplicateName(name) => write!(f, "camera name already in use: {name}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidRange { .. } => "invalid_range",
            EngineError::Conflict(_) => "conflict",
            EngineError::NotFound(_) => "not_found",
            EngineError::UnknownResource(_) => "unknown_resource",
            EngineError::AlreadyCancelled(_) => "already_cancelled",
            EngineError::InvalidName => "invalid_name",
            EngineError::DuplicateName(_) => "duplicate_name",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::WalError(_) => "wal_error",
        }
    }
}
