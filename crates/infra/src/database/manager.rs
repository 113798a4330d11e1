//! Connection pool management for the SQLite database.

use std::sync::Arc;

use bookwise_domain::{BookwiseError, DatabaseConfig, Result};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::errors::InfraError;

use super::schema;

/// r2d2-backed SQLite connection pool with the schema applied on open.
pub struct SqlitePool {
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl SqlitePool {
    /// Open (and migrate) the database file named in `config`.
    pub fn open(config: &DatabaseConfig) -> Result<Arc<Self>> {
        let manager = SqliteConnectionManager::file(&config.path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
        });
        let pool = r2d2::Pool::builder()
            .max_size(config.pool_size.max(1))
            .build(manager)
            .map_err(InfraError::from)?;

        let db = Arc::new(Self { pool });
        schema::apply(&*db.get()?)?;
        info!(path = %config.path, pool_size = config.pool_size, "database opened");
        Ok(db)
    }

    /// In-memory database for tests. Pool size is pinned to one connection
    /// because each SQLite `:memory:` connection is its own database.
    pub fn open_in_memory() -> Result<Arc<Self>> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(InfraError::from)?;

        let db = Arc::new(Self { pool });
        schema::apply(&*db.get()?)?;
        Ok(db)
    }

    pub(crate) fn get(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| BookwiseError::Database(format!("connection pool error: {e}")))
    }
}
