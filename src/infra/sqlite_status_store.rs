use crate::app::ports::StatusStore;
use crate::error::StoreError;
use crate::types::BuildId;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

const FETCH_SQL: &str = "SELECT payload FROM build_events WHERE build_id = ?1";

/// Status store backed by a local SQLite file shared with the build worker.
///
/// The worker owns the file, the schema and the rows. This side opens the
/// database read-only and fails if it does not exist yet; a missing table
/// surfaces as a `StoreError` on lookup. Queries run on the blocking pool so
/// they never stall the async workers.
pub struct SqliteStatusStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStatusStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!("Opened SQLite status store at {} (read-only)", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn fetch_blocking(conn: &Connection, build_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut stmt = conn.prepare_cached(FETCH_SQL)?;
        let payload = stmt
            .query_row(params![build_id], |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Blob(b) => Some(b.to_vec()),
                    ValueRef::Text(t) => Some(t.to_vec()),
                    _ => None,
                })
            })
            .optional()?;
        match payload {
            None => Ok(None),
            Some(Some(bytes)) => Ok(Some(bytes)),
            Some(None) => Err(StoreError::PayloadType { column: "payload" }),
        }
    }
}

#[async_trait]
impl StatusStore for SqliteStatusStore {
    async fn fetch(&self, build_id: &BuildId) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = Arc::clone(&self.conn);
        let id = build_id.as_str().to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StoreError::Task("connection lock poisoned".to_string()))?;
            Self::fetch_blocking(&conn, &id)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
