//! Hard limits enforced by the engine and the SQL front end.

/// Max cameras in the inventory.
pub const MAX_CAMERAS: usize = 10_000;

/// Max rentals (active + cancelled) kept per camera.
pub const MAX_RENTALS_PER_CAMERA: usize = 100_000;

/// Max camera name length in bytes, after trimming.
pub const MAX_NAME_LEN: usize = 256;

/// Max camera reference link length in bytes.
pub const MAX_LINK_LEN: usize = 2048;

/// Max rental notes length in bytes.
pub const MAX_NOTES_LEN: usize = 4096;

/// Max display color length in bytes (`#rrggbb`, `rgb(...)`, named colors).
pub const MAX_COLOR_LEN: usize = 64;

/// Longest rental, in days, inclusive of both ends.
pub const MAX_RENTAL_DAYS: u32 = 3660;
