use crate::app::ports::StatusStore;
use crate::error::{GatewayError, StoreError};
use crate::types::BuildId;
use async_trait::async_trait;
use libsql::{Builder, Database, Value};
use tracing::info;

/// Status store on a remote Turso/libSQL database.
pub struct LibsqlStatusStore {
    db: Database,
}

impl LibsqlStatusStore {
    pub async fn connect(url: String, auth_token: String) -> Result<Self, GatewayError> {
        info!("Connecting to libSQL status store at {}", url);
        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(StoreError::from)?;
        Ok(Self { db })
    }
}

#[async_trait]
impl StatusStore for LibsqlStatusStore {
    async fn fetch(&self, build_id: &BuildId) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT payload FROM build_events WHERE build_id = ?1",
                libsql::params![build_id.as_str()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        match row.get_value(0)? {
            Value::Blob(bytes) => Ok(Some(bytes)),
            Value::Text(text) => Ok(Some(text.into_bytes())),
            _ => Err(StoreError::PayloadType { column: "payload" }),
        }
    }

    fn name(&self) -> &'static str {
        "libsql"
    }
}
