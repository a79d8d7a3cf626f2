//! # Database Connection Pool Module
//!
//! Provides the SQLite connection pool and schema management behind
//! [`SqliteOffsetStore`](crate::local::SqliteOffsetStore).
//!
//! ## Features
//!
//! - **Rollback journal**: an existing database file is opened without
//!   changing its journal mode, so databases shared with other tools keep
//!   working
//! - **Full synchronous mode**: a write is on disk when the call returns
//! - **Foreign Keys**: offsets reference known file identities
//! - **Schema check**: an existing file must already contain the offset tables
//!
//! ## Schema
//!
//! ```text
//! files(identity TEXT PRIMARY KEY, display_name TEXT, last_seen_at INTEGER)
//! offsets(video_identity, audio_identity, offset_seconds REAL, updated_at INTEGER,
//!         UNIQUE(video_identity, audio_identity))
//! ```

use crate::error::{Result, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const DROP_SCHEMA: &[&str] = &["DROP TABLE IF EXISTS offsets", "DROP TABLE IF EXISTS files"];

const CREATE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE files (
        identity TEXT PRIMARY KEY NOT NULL,
        display_name TEXT,
        last_seen_at INTEGER
    )
    "#,
    r#"
    CREATE TABLE offsets (
        video_identity TEXT NOT NULL REFERENCES files(identity),
        audio_identity TEXT NOT NULL REFERENCES files(identity),
        offset_seconds REAL NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE(video_identity, audio_identity)
    )
    "#,
];

const REQUIRED_TABLES: &[&str] = &["files", "offsets"];

/// Database configuration for the SQLite connection pool
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file, `None` for a private in-memory database
    pub path: Option<PathBuf>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Create a configuration for the database file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            max_connections: 4,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Create a configuration for an in-memory database (useful for testing)
    ///
    /// Every pooled connection to `:memory:` would see its own empty
    /// database, so the pool is pinned to a single connection.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Set the maximum number of connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = match &self.path {
            Some(path) => SqliteConnectOptions::new().filename(path),
            None => SqliteConnectOptions::from_str("sqlite::memory:")?,
        };

        Ok(options
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true)
            .create_if_missing(true))
    }
}

/// Create a configured SQLite connection pool
///
/// The schema is not touched here; see [`initialize_schema`] and
/// [`verify_schema`].
pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    info!(
        path = ?config.path,
        max_connections = config.max_connections,
        "Creating database connection pool"
    );

    let connect_options = config.connect_options()?;

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);

    if config.path.is_none() {
        // Dropping the last connection would discard the in-memory database
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create connection pool");
            StoreError::from(e)
        })?;

    debug!(connections = pool.size(), "Database connection pool created");
    Ok(pool)
}

/// Drop and recreate the offset tables, discarding any stored offsets
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing offset database schema");

    let mut tx = pool.begin().await?;
    for statement in DROP_SCHEMA.iter().chain(CREATE_SCHEMA) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    Ok(())
}

/// Check that an existing database carries the offset tables
///
/// Nothing is created or altered. A file that is not a SQLite database, or
/// that lacks either table, is reported as [`StoreError::Malformed`].
pub async fn verify_schema(pool: &SqlitePool, path: &Path) -> Result<()> {
    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(pool)
        .await
        .map_err(|e| {
            StoreError::Malformed(format!("{} is not a readable database: {}", path.display(), e))
        })?;

    let tables: Vec<String> = rows
        .iter()
        .filter_map(|row| row.try_get::<String, _>("name").ok())
        .collect();

    for required in REQUIRED_TABLES {
        if !tables.iter().any(|table| table == required) {
            warn!(path = %path.display(), table = required, "Offset database is missing a table");
            return Err(StoreError::Malformed(format!(
                "{} has no '{}' table",
                path.display(),
                required
            )));
        }
    }

    debug!("Offset database schema verified");
    Ok(())
}
