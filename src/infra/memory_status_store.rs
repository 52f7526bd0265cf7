use crate::app::ports::StatusStore;
use crate::error::StoreError;
use crate::types::BuildId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory status store for development/testing.
///
/// Counts every `fetch` so tests can assert the store was never touched, and
/// can be switched into a failing mode to simulate an outage.
#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
    fetches: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stand-in for the build worker writing a status record.
    pub fn insert(&self, build_id: &str, payload: impl Into<Vec<u8>>) {
        self.records
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(build_id.to_string(), payload.into());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn fetch(&self, build_id: &BuildId) -> Result<Option<Vec<u8>>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Task("in-memory store is marked as failing".to_string()));
        }
        let records = self.records.lock().unwrap_or_else(|p| p.into_inner());
        Ok(records.get(build_id.as_str()).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
