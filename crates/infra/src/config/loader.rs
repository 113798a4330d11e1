//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `BOOKWISE_DB_PATH`: Database file path
//! - `BOOKWISE_DB_POOL_SIZE`: Connection pool size
//! - `BOOKWISE_SYNC_CRON`: Cron expression for the calendar sync job
//! - `BOOKWISE_SYNC_ENABLED`: Whether sync is enabled (true/false)
//! - `BOOKWISE_SYNC_HORIZON_DAYS`: How far ahead external events are fetched
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./bookwise.toml` / `./bookwise.json`
//! 2. `./config.toml` / `./config.json`
//! 3. The same names in the parent directory

use std::path::{Path, PathBuf};

use bookwise_domain::{
    BookingConfig, BookwiseConfig, BookwiseError, DatabaseConfig, Result, SyncConfig,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `BookwiseError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<BookwiseConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// The database variables are required; sync and booking settings fall back
/// to their defaults when unset.
///
/// # Errors
/// Returns `BookwiseError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<BookwiseConfig> {
    let db_path = env_var("BOOKWISE_DB_PATH")?;
    let db_pool_size = env_var("BOOKWISE_DB_POOL_SIZE").and_then(|s| {
        s.parse::<u32>()
            .map_err(|e| BookwiseError::Config(format!("Invalid pool size: {e}")))
    })?;

    let mut sync = SyncConfig::default();
    if let Ok(cron) = std::env::var("BOOKWISE_SYNC_CRON") {
        sync.cron_expression = cron;
    }
    sync.enabled = env_bool("BOOKWISE_SYNC_ENABLED", sync.enabled);
    if let Ok(horizon) = std::env::var("BOOKWISE_SYNC_HORIZON_DAYS") {
        sync.horizon_days = horizon
            .parse::<i64>()
            .map_err(|e| BookwiseError::Config(format!("Invalid sync horizon: {e}")))?;
    }

    Ok(BookwiseConfig {
        database: DatabaseConfig { path: db_path, pool_size: db_pool_size },
        sync,
        booking: BookingConfig::default(),
    })
}

/// Load configuration from a file
///
/// When `path` is `None`, the conventional locations are probed in order.
pub fn load_from_file(path: Option<&Path>) -> Result<BookwiseConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => probe_config_paths().ok_or_else(|| {
            BookwiseError::Config("No configuration file found in conventional locations".into())
        })?,
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| {
        BookwiseError::Config(format!("Cannot read config file {}: {e}", path.display()))
    })?;

    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str::<BookwiseConfig>(&contents)
            .map_err(|e| BookwiseError::Config(format!("Invalid JSON config: {e}")))?,
        _ => toml::from_str::<BookwiseConfig>(&contents)
            .map_err(|e| BookwiseError::Config(format!("Invalid TOML config: {e}")))?,
    };

    tracing::info!(path = %path.display(), "Configuration loaded from file");
    Ok(config)
}

/// Return the first conventional config path that exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["bookwise.toml", "bookwise.json", "config.toml", "config.json"];

    for dir in [".", ".."] {
        for name in NAMES {
            let candidate = Path::new(dir).join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| BookwiseError::Config(format!("Missing environment variable {name}")))
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn toml_file_round_trip() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[database]\npath = \"/tmp/bookwise.db\"\npool_size = 8\n\n\
             [sync]\ncron_expression = \"0 */5 * * * *\"\nenabled = false\nhorizon_days = 30\n\n\
             [booking]\nslot_window_start_hour = 9\nslot_window_end_hour = 17\n\
             default_slot_interval_minutes = 15"
        )
        .unwrap();

        let config = load_from_file(Some(file.path())).unwrap();
        assert_eq!(config.database.path, "/tmp/bookwise.db");
        assert_eq!(config.database.pool_size, 8);
        assert!(!config.sync.enabled);
        assert_eq!(config.sync.horizon_days, 30);
        assert_eq!(config.booking.slot_window_start_hour, 9);
    }

    #[test]
    fn json_file_round_trip() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(
            file,
            "{{\"database\": {{\"path\": \"db.sqlite\", \"pool_size\": 2}}}}"
        )
        .unwrap();

        let config = load_from_file(Some(file.path())).unwrap();
        assert_eq!(config.database.path, "db.sqlite");
        // Missing sections fall back to defaults.
        assert!(config.sync.enabled);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_from_file(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, BookwiseError::Config(_)));
    }
}
