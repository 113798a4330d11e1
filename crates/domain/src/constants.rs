//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Public slot enumeration window (department-local wall clock)
pub const SLOT_WINDOW_START_HOUR: u32 = 8;
pub const SLOT_WINDOW_END_HOUR: u32 = 18;
pub const DEFAULT_SLOT_INTERVAL_MINUTES: i64 = 30;

// Booking identity
pub const BOOKING_REFERENCE_PREFIX: &str = "BK-";
pub const BOOKING_REFERENCE_LENGTH: usize = 8;
pub const SELF_SERVICE_TOKEN_BYTES: usize = 32;

// Assignment
pub const LEAST_BUSY_WINDOW_DAYS: i64 = 7;
pub const MIN_ASSIGNMENT_PRIORITY: u8 = 1;
pub const MAX_ASSIGNMENT_PRIORITY: u8 = 10;
pub const WORKLOAD_IMBALANCE_THRESHOLD: f64 = 0.3;

// Calendar sync
pub const SYNC_HORIZON_DAYS: i64 = 60;
pub const SYNC_ERROR_LOG_MAX_CHARS: usize = 1000;
