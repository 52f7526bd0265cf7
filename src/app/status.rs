use crate::app::ports::StatusStore;
use crate::error::StatusError;
use crate::types::BuildId;
use std::sync::Arc;
use tracing::{debug, error};

/// Read-through access to build status records. No caching: every call hits
/// the store.
#[derive(Clone)]
pub struct StatusReader {
    store: Arc<dyn StatusStore>,
}

impl StatusReader {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// Raw status payload for `build_id`, untouched.
    pub async fn fetch_status(&self, build_id: &BuildId) -> Result<Vec<u8>, StatusError> {
        match self.store.fetch(build_id).await {
            Ok(Some(payload)) => {
                debug!(build_id = %build_id, bytes = payload.len(), "Status record found");
                Ok(payload)
            }
            Ok(None) => Err(StatusError::NotFound(build_id.to_string())),
            Err(e) => {
                error!(build_id = %build_id, store = self.store.name(), "Status store read failed: {}", e);
                Err(StatusError::Store(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryStatusStore;

    #[tokio::test]
    async fn test_outcomes_are_distinguished() {
        let store = Arc::new(InMemoryStatusStore::new());
        store.insert("known", br#"{"status":"building"}"#.to_vec());
        let reader = StatusReader::new(store.clone());

        let payload = reader.fetch_status(&BuildId::parse("known").unwrap()).await.unwrap();
        assert_eq!(payload, br#"{"status":"building"}"#);

        let err = reader.fetch_status(&BuildId::parse("unknown").unwrap()).await.unwrap_err();
        assert!(matches!(err, StatusError::NotFound(ref id) if id == "unknown"));

        store.set_failing(true);
        let err = reader.fetch_status(&BuildId::parse("known").unwrap()).await.unwrap_err();
        assert!(matches!(err, StatusError::Store(_)));
        assert_eq!(store.fetch_count(), 3);
    }
}
