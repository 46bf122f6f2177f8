//! Credential persistence
//!
//! The credential record lives in a single-row SQLite table. Every caller
//! goes through a [`CredentialStore`] handed to it explicitly.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use crate::Result;
use crate::error::Error;
use super::credentials::Credentials;

/// Storage for the one credential record of this installation
pub trait CredentialStore: Send + Sync {
    /// Read the record, if any
    fn load(&self) -> Result<Option<Credentials>>;

    /// Create the record or replace it in place
    fn save(&self, credentials: &Credentials) -> Result<()>;

    /// Remove the record
    fn clear(&self) -> Result<()>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS auth_state (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    state TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)";

/// SQLite-backed credential store
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

impl SqliteCredentialStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Owner-only from the first byte; older files are tightened too.
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .mode(0o600)
                .open(path)?;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Non-persistent database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("credential store lock poisoned".to_string()))
    }

    #[cfg(test)]
    fn row_count(&self) -> i64 {
        self.lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM auth_state", [], |row| row.get(0))
            .unwrap()
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        let conn = self.lock()?;
        let state: Option<String> = conn
            .query_row(
                "SELECT state FROM auth_state ORDER BY id LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match state {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| Error::Storage(format!("corrupt credential record: {}", e))),
            None => Ok(None),
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let state = serde_json::to_string(credentials)?;
        let now = Utc::now().timestamp();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row("SELECT id FROM auth_state ORDER BY id LIMIT 1", [], |row| row.get(0))
            .optional()?;

        match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE auth_state SET state = ?1, updated_at = ?2 WHERE id = ?3",
                    params![state, now, id],
                )?;
                tx.execute("DELETE FROM auth_state WHERE id <> ?1", params![id])?;
            }
            None => {
                tx.execute(
                    "INSERT INTO auth_state (state, updated_at) VALUES (?1, ?2)",
                    params![state, now],
                )?;
            }
        }

        tx.commit()?;
        tracing::debug!("Credential record saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM auth_state", [])?;
        tracing::debug!("Credential record cleared");
        Ok(())
    }
}

/// In-memory store for testing
#[derive(Default)]
pub struct InMemoryCredentialStore {
    record: Mutex<Option<Credentials>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(credentials: Credentials) -> Self {
        Self { record: Mutex::new(Some(credentials)) }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Credentials>>> {
        self.record
            .lock()
            .map_err(|_| Error::Storage("credential store lock poisoned".to_string()))
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self) -> Result<Option<Credentials>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        *self.lock()? = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::GOOGLE_ISSUER;

    fn sample() -> Credentials {
        let mut creds = Credentials::new(
            "access".to_string(),
            Some("refresh".to_string()),
            Some(3600),
        );
        creds.scope = Some("openid email".to_string());
        creds.id_token = Some("id-token".to_string());
        creds.issuer = Some(GOOGLE_ISSUER.to_string());
        creds
    }

    #[test]
    fn test_empty_store_loads_none() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load_is_equal() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        let creds = sample();

        store.save(&creds).unwrap();

        assert_eq!(store.load().unwrap(), Some(creds));
    }

    #[test]
    fn test_save_replaces_in_place() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store.save(&sample()).unwrap();

        let mut updated = sample();
        updated.access_token = "rotated".to_string();
        store.save(&updated).unwrap();

        assert_eq!(store.row_count(), 1);
        assert_eq!(store.load().unwrap().unwrap().access_token, "rotated");
    }

    #[test]
    fn test_save_collapses_stray_rows() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        {
            let conn = store.lock().unwrap();
            for token in ["one", "two", "three"] {
                let state = serde_json::to_string(&Credentials::new(token.to_string(), None, None)).unwrap();
                conn.execute(
                    "INSERT INTO auth_state (state, updated_at) VALUES (?1, 0)",
                    params![state],
                )
                .unwrap();
            }
        }
        assert_eq!(store.row_count(), 3);

        let creds = sample();
        store.save(&creds).unwrap();

        assert_eq!(store.row_count(), 1);
        assert_eq!(store.load().unwrap(), Some(creds));
    }

    #[test]
    fn test_clear_empties_store() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store.save(&sample()).unwrap();

        store.clear().unwrap();

        assert!(store.load().unwrap().is_none());
        assert_eq!(store.row_count(), 0);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("konsol.db");
        let creds = sample();

        {
            let store = SqliteCredentialStore::open(&path).unwrap();
            store.save(&creds).unwrap();
        }

        let reopened = SqliteCredentialStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), Some(creds));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("konsol.db");
        SqliteCredentialStore::open(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_record_is_storage_error() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute("INSERT INTO auth_state (state, updated_at) VALUES ('not json', 0)", [])
            .unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryCredentialStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().access_token, "access");

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
