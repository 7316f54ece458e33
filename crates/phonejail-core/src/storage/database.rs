//! SQLite-based schema and settings storage.
//!
//! Provides persistent storage for:
//! - The ordered schema collection (one JSON body per row)
//! - Key-value store for settings and application state

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use tracing::debug;

use super::data_dir;
use super::settings::SettingsStore;
use crate::error::{CoreError, DatabaseError, Result};
use crate::schema::{Schema, SchemaStore};

/// SQLite database for schemas and settings.
///
/// The connection sits behind a mutex so one `Database` can be shared by
/// `Arc` between the schema registry and the settings service.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Open the database at `~/.config/phonejail/phonejail.db`.
    ///
    /// Creates the database file and tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("phonejail.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        db.migrate()?;
        debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Open an in-memory database. Used by tests.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) -> Result<()> {
        self.conn()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS schemas (
                    id       TEXT PRIMARY KEY,
                    position INTEGER NOT NULL,
                    body     TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_schemas_position ON schemas(position);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl SchemaStore for Database {
    fn load_schemas(&self) -> Result<Vec<Schema>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id, body FROM schemas ORDER BY position")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut schemas = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let schema: Schema =
                serde_json::from_str(&body).map_err(|e| DatabaseError::CorruptRecord {
                    key: id,
                    message: e.to_string(),
                })?;
            schemas.push(schema);
        }
        Ok(schemas)
    }

    fn save_schemas(&self, schemas: &[Schema]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM schemas", [])?;
        {
            let mut insert =
                tx.prepare("INSERT INTO schemas (id, position, body) VALUES (?1, ?2, ?3)")?;
            for (position, schema) in schemas.iter().enumerate() {
                let body = serde_json::to_string(schema).map_err(CoreError::Json)?;
                insert.execute(params![schema.id.to_string(), position as i64, body])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl SettingsStore for Database {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.kv_get(key)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.kv_set(key, value)
    }
}
