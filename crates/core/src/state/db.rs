//! # SQLite Medium
//!
//! Durable [`StorageMedium`] backed by a single SQLite file at
//! `.pinterestify/pinterestify.db`. Values live in one `kv_store` table; an
//! optional byte quota emulates the capacity ceiling of browser storage.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::medium::StorageMedium;
use crate::error::MediumError;

/// Schema version for migrations
const SCHEMA_VERSION: i32 = 1;

/// Roughly what browsers grant an origin's local storage
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Database location, honouring the `PINTERESTIFY_DB` override
pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("PINTERESTIFY_DB") {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".pinterestify")
        .join("pinterestify.db")
}

/// SQLite-backed key/value medium
pub struct SqliteMedium {
    conn: Arc<Mutex<Connection>>,
    quota: Option<u64>,
}

impl SqliteMedium {
    /// Open or create the database at the default location
    pub fn open() -> Result<Self> {
        Self::open_at(default_db_path())
    }

    /// Open database at a specific path (useful for testing)
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn =
            Connection::open(path.as_ref()).context("Failed to open pinterestify database")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            quota: Some(DEFAULT_QUOTA_BYTES),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Replace the byte quota; `None` disables the capacity check
    pub fn with_quota(mut self, quota: Option<u64>) -> Self {
        self.quota = quota;
        self
    }

    /// Get a shared connection for use by other modules
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&conn)?;
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                [1],
            )?;
        }

        Ok(())
    }

    /// Migration to version 1 - key/value table
    fn migrate_v1(conn: &Connection) -> Result<()> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
            [],
        )?;

        tracing::info!(
            "Pinterestify database initialized with schema version {}",
            SCHEMA_VERSION
        );

        Ok(())
    }
}

impl StorageMedium for SqliteMedium {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MediumError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MediumError::Lock(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), MediumError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MediumError::Lock(e.to_string()))?;

        if let Some(quota) = self.quota {
            let others: i64 = conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(value)), 0) FROM kv_store WHERE key != ?1",
                params![key],
                |row| row.get(0),
            )?;
            let requested = others.max(0) as u64 + value.len() as u64;
            if requested > quota {
                return Err(MediumError::QuotaExceeded { requested, quota });
            }
        }

        conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = ?2,
                updated_at = datetime('now')
            "#,
            params![key, value],
        )?;

        Ok(())
    }
}
