//! A `[STORE]` backend over a local SQLite database: one object store of
//! entries (`requests`), an index on `queue_name`, auto-increment-style
//! primary key. A lazily-opened `rusqlite::Connection` behind a `Mutex`,
//! wrapped in `tokio::task::block_in_place` so the blocking SQLite calls
//! don't stall the async runtime's other tasks.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use queue_core::error::StoreError;
use queue_core::request::RequestRecord;
use queue_core::store::{NewEntry, Store, StoredEntry};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;

/// Where the SQLite database file lives. `InMemory` is for tests and for
/// the "cold start has nothing to replay" case; `Path` is the durable
/// production case.
#[derive(Debug, Clone)]
pub enum DatabaseLocation {
    InMemory,
    Path(PathBuf),
}

/// Current schema version. Bumped from 1 to 2 when `metadata_json` was
/// added; migrating from 1 drops and recreates `requests` rather than
/// attempting a column migration.
const SCHEMA_VERSION: i64 = 2;

pub struct SqliteStore {
    location: DatabaseLocation,
    connection: OnceCell<Arc<Mutex<Connection>>>,
}

impl SqliteStore {
    pub fn new(location: DatabaseLocation) -> Self {
        Self {
            location,
            connection: OnceCell::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(DatabaseLocation::InMemory)
    }

    fn connection(&self) -> Result<Arc<Mutex<Connection>>, StoreError> {
        // The first call opens the database file and runs the
        // schema-creation/migration DDL, which is blocking file I/O; every
        // later call just clones the already-open `Arc`. `block_in_place`
        // covers both so the one-time open never runs unguarded on the
        // async executor thread.
        task::block_in_place(|| {
            self.connection
                .get_or_try_init(|| open_and_migrate(&self.location))
                .map(Arc::clone)
        })
    }
}

fn open_and_migrate(location: &DatabaseLocation) -> Result<Arc<Mutex<Connection>>, StoreError> {
    let connection = match location {
        DatabaseLocation::InMemory => Connection::open_in_memory(),
        DatabaseLocation::Path(path) => Connection::open(path),
    }
    .map_err(|e| StoreError::Backend(e.into()))?;

    connection
        .execute(
            "CREATE TABLE IF NOT EXISTS schema_meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            (),
        )
        .map_err(|e| StoreError::Backend(e.into()))?;

    let current_version: Option<i64> = connection
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'version'",
            (),
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| StoreError::Backend(e.into()))?
        .and_then(|v| v.parse().ok());

    if current_version != Some(SCHEMA_VERSION) {
        // Migration from version 1 (if found): drop and recreate the
        // object store; pre-existing entries are abandoned.
        connection
            .execute("DROP TABLE IF EXISTS requests", ())
            .map_err(|e| StoreError::Backend(e.into()))?;
        connection
            .execute(
                "CREATE TABLE requests (
                    id INTEGER PRIMARY KEY,
                    queue_name TEXT NOT NULL,
                    request_json TEXT NOT NULL,
                    timestamp_ms INTEGER NOT NULL,
                    metadata_json TEXT
                )",
                (),
            )
            .map_err(|e| StoreError::Backend(e.into()))?;
        connection
            .execute(
                "CREATE INDEX IF NOT EXISTS requests_queue_name ON requests (queue_name)",
                (),
            )
            .map_err(|e| StoreError::Backend(e.into()))?;
        connection
            .execute(
                "INSERT INTO schema_meta (key, value) VALUES ('version', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = ?1",
                params![SCHEMA_VERSION.to_string()],
            )
            .map_err(|e| StoreError::Backend(e.into()))?;
    }

    Ok(Arc::new(Mutex::new(connection)))
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<StoredEntry> {
    let id: i64 = row.get(0)?;
    let queue_name: String = row.get(1)?;
    let request_json: String = row.get(2)?;
    let timestamp_ms: i64 = row.get(3)?;
    let metadata_json: Option<String> = row.get(4)?;

    let request: RequestRecord = serde_json::from_str(&request_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)))?;
    let metadata = metadata_json
        .map(|m| serde_json::from_str(&m))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(StoredEntry {
        id,
        queue_name,
        request,
        timestamp_ms,
        metadata,
    })
}

fn insert(
    conn: &Connection,
    id: i64,
    entry: &NewEntry,
) -> Result<StoredEntry, StoreError> {
    let request_json = serde_json::to_string(&entry.request)?;
    let metadata_json = entry
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO requests (id, queue_name, request_json, timestamp_ms, metadata_json)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, entry.queue_name, request_json, entry.timestamp_ms, metadata_json],
    )
    .map_err(|e| StoreError::Backend(e.into()))?;

    Ok(StoredEntry {
        id,
        queue_name: entry.queue_name.clone(),
        request: entry.request.clone(),
        timestamp_ms: entry.timestamp_ms,
        metadata: entry.metadata.clone(),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn add_last(&self, entry: NewEntry) -> Result<StoredEntry, StoreError> {
        let connection = self.connection()?;
        task::block_in_place(move || {
            let mut conn = connection.lock().expect("sqlite connection mutex poisoned");
            let tx = conn.transaction().map_err(|e| StoreError::Backend(e.into()))?;
            let next_id: i64 = tx
                .query_row("SELECT COALESCE(MAX(id), 0) + 1 FROM requests", (), |row| row.get(0))
                .map_err(|e| StoreError::Backend(e.into()))?;
            let stored = insert(&tx, next_id, &entry)?;
            tx.commit().map_err(|e| StoreError::Backend(e.into()))?;
            Ok(stored)
        })
    }

    async fn add_first(&self, entry: NewEntry) -> Result<StoredEntry, StoreError> {
        let connection = self.connection()?;
        task::block_in_place(move || {
            let mut conn = connection.lock().expect("sqlite connection mutex poisoned");
            let tx = conn.transaction().map_err(|e| StoreError::Backend(e.into()))?;
            // Read the current minimum id across the whole store (not
            // just this queue) and assign one less, allowing negative
            // values. See DESIGN.md for the collision risk this carries.
            let prev_min: i64 = tx
                .query_row("SELECT COALESCE(MIN(id), 0) FROM requests", (), |row| row.get(0))
                .map_err(|e| StoreError::Backend(e.into()))?;
            let new_id = prev_min - 1;
            let stored = insert(&tx, new_id, &entry)?;
            tx.commit().map_err(|e| StoreError::Backend(e.into()))?;
            Ok(stored)
        })
    }

    async fn get_first(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError> {
        let connection = self.connection()?;
        let queue_name = queue_name.to_owned();
        task::block_in_place(move || {
            let conn = connection.lock().expect("sqlite connection mutex poisoned");
            conn.query_row(
                "SELECT id, queue_name, request_json, timestamp_ms, metadata_json
                 FROM requests WHERE queue_name = ?1 ORDER BY id ASC LIMIT 1",
                params![queue_name],
                row_to_entry,
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.into()))
        })
    }

    async fn get_last(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError> {
        let connection = self.connection()?;
        let queue_name = queue_name.to_owned();
        task::block_in_place(move || {
            let conn = connection.lock().expect("sqlite connection mutex poisoned");
            conn.query_row(
                "SELECT id, queue_name, request_json, timestamp_ms, metadata_json
                 FROM requests WHERE queue_name = ?1 ORDER BY id DESC LIMIT 1",
                params![queue_name],
                row_to_entry,
            )
            .optional()
            .map_err(|e| StoreError::Backend(e.into()))
        })
    }

    async fn pop_first(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError> {
        let connection = self.connection()?;
        let queue_name = queue_name.to_owned();
        task::block_in_place(move || {
            let mut conn = connection.lock().expect("sqlite connection mutex poisoned");
            let tx = conn.transaction().map_err(|e| StoreError::Backend(e.into()))?;
            let found = tx
                .query_row(
                    "SELECT id, queue_name, request_json, timestamp_ms, metadata_json
                     FROM requests WHERE queue_name = ?1 ORDER BY id ASC LIMIT 1",
                    params![queue_name],
                    row_to_entry,
                )
                .optional()
                .map_err(|e| StoreError::Backend(e.into()))?;
            if let Some(entry) = &found {
                tx.execute("DELETE FROM requests WHERE id = ?1", params![entry.id])
                    .map_err(|e| StoreError::Backend(e.into()))?;
            }
            tx.commit().map_err(|e| StoreError::Backend(e.into()))?;
            Ok(found)
        })
    }

    async fn pop_last(&self, queue_name: &str) -> Result<Option<StoredEntry>, StoreError> {
        let connection = self.connection()?;
        let queue_name = queue_name.to_owned();
        task::block_in_place(move || {
            let mut conn = connection.lock().expect("sqlite connection mutex poisoned");
            let tx = conn.transaction().map_err(|e| StoreError::Backend(e.into()))?;
            let found = tx
                .query_row(
                    "SELECT id, queue_name, request_json, timestamp_ms, metadata_json
                     FROM requests WHERE queue_name = ?1 ORDER BY id DESC LIMIT 1",
                    params![queue_name],
                    row_to_entry,
                )
                .optional()
                .map_err(|e| StoreError::Backend(e.into()))?;
            if let Some(entry) = &found {
                tx.execute("DELETE FROM requests WHERE id = ?1", params![entry.id])
                    .map_err(|e| StoreError::Backend(e.into()))?;
            }
            tx.commit().map_err(|e| StoreError::Backend(e.into()))?;
            Ok(found)
        })
    }

    async fn get_all(&self, queue_name: &str) -> Result<Vec<StoredEntry>, StoreError> {
        let connection = self.connection()?;
        let queue_name = queue_name.to_owned();
        task::block_in_place(move || {
            let conn = connection.lock().expect("sqlite connection mutex poisoned");
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, queue_name, request_json, timestamp_ms, metadata_json
                     FROM requests WHERE queue_name = ?1 ORDER BY id ASC",
                )
                .map_err(|e| StoreError::Backend(e.into()))?;
            let rows = stmt
                .query_map(params![queue_name], row_to_entry)
                .map_err(|e| StoreError::Backend(e.into()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::Backend(e.into()))
        })
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), StoreError> {
        let connection = self.connection()?;
        task::block_in_place(move || {
            let conn = connection.lock().expect("sqlite connection mutex poisoned");
            conn.execute("DELETE FROM requests WHERE id = ?1", params![id])
                .map_err(|e| StoreError::Backend(e.into()))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queue_core::store::NewEntry;

    fn entry(queue: &str, url: &str, id_hint: i64) -> NewEntry {
        NewEntry {
            queue_name: queue.to_string(),
            request: RequestRecord::new("POST", url),
            timestamp_ms: id_hint,
            metadata: None,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn add_last_assigns_strictly_increasing_ids() {
        let store = SqliteStore::in_memory();
        let one = store.add_last(entry("q", "/one", 0)).await.unwrap();
        let two = store.add_last(entry("q", "/two", 0)).await.unwrap();
        assert!(two.id > one.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn add_first_precedes_every_existing_id() {
        let store = SqliteStore::in_memory();
        let one = store.add_last(entry("q", "/one", 0)).await.unwrap();
        let zero = store.add_first(entry("q", "/zero", 0)).await.unwrap();
        assert!(zero.id < one.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pop_first_is_atomic_read_and_delete() {
        let store = SqliteStore::in_memory();
        store.add_last(entry("q", "/one", 0)).await.unwrap();
        store.add_last(entry("q", "/two", 0)).await.unwrap();

        let popped = store.pop_first("q").await.unwrap().unwrap();
        assert_eq!(popped.request.url, "/one");
        assert_eq!(store.get_all("q").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn queues_do_not_see_each_others_entries() {
        let store = SqliteStore::in_memory();
        store.add_last(entry("a", "/a1", 0)).await.unwrap();
        store.add_last(entry("b", "/b1", 0)).await.unwrap();

        let a_entries = store.get_all("a").await.unwrap();
        assert_eq!(a_entries.len(), 1);
        assert_eq!(a_entries[0].request.url, "/a1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn migration_from_v1_drops_prior_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.sqlite");

        // Seed a version-1 database by hand: no `schema_meta` row at all,
        // which is how a real version-1 database (predating that table)
        // would look.
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "CREATE TABLE requests (id INTEGER PRIMARY KEY, queue_name TEXT, request_json TEXT, timestamp_ms INTEGER)",
                (),
            )
            .unwrap();
            conn.execute(
                "INSERT INTO requests (id, queue_name, request_json, timestamp_ms) VALUES (1, 'q', '{}', 0)",
                (),
            )
            .unwrap();
        }

        let store = SqliteStore::new(DatabaseLocation::Path(path));
        // Migration abandons the old row: the queue it belonged to is empty.
        assert!(store.get_all("q").await.unwrap().is_empty());

        // And the store is fully usable afterward.
        let stored = store.add_last(entry("q", "/fresh", 0)).await.unwrap();
        assert_eq!(stored.request.url, "/fresh");
    }
}
