//! Application configuration structures
//!
//! Loaded by the infrastructure layer from environment variables or a
//! TOML/JSON file; see `bookwise-infra`'s config loader.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_SLOT_INTERVAL_MINUTES, SLOT_WINDOW_END_HOUR, SLOT_WINDOW_START_HOUR, SYNC_HORIZON_DAYS,
};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookwiseConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub booking: BookingConfig,
}

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
    /// Connection pool size
    pub pool_size: u32,
}

/// Calendar sync job settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Six-field cron expression for the sync job
    pub cron_expression: String,
    /// Whether the periodic sync job runs at all
    pub enabled: bool,
    /// How far ahead external events are fetched, in days
    pub horizon_days: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cron_expression: "0 */10 * * * *".into(), // every 10 minutes
            enabled: true,
            horizon_days: SYNC_HORIZON_DAYS,
        }
    }
}

/// Public booking surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// First hour of the public slot scan window (department-local)
    pub slot_window_start_hour: u32,
    /// Last hour of the public slot scan window (department-local)
    pub slot_window_end_hour: u32,
    /// Slot granularity used when a meeting type has no duration
    pub default_slot_interval_minutes: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            slot_window_start_hour: SLOT_WINDOW_START_HOUR,
            slot_window_end_hour: SLOT_WINDOW_END_HOUR,
            default_slot_interval_minutes: DEFAULT_SLOT_INTERVAL_MINUTES,
        }
    }
}
