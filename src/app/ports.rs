use crate::error::{ChannelError, StoreError};
use crate::types::BuildId;
use async_trait::async_trait;

/// Durable pub/sub channel the dispatch client publishes through.
///
/// One instance is created at startup and shared by every in-flight request,
/// so implementations must tolerate concurrent `send` calls on `&self`
/// without external locking. `send` returns only once the channel has
/// confirmed durable receipt with its strongest acknowledgment level.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, topic: &str, key: &[u8], payload: Vec<u8>) -> Result<(), ChannelError>;

    /// Release the underlying connection. Called once at shutdown.
    async fn close(&self) {}

    /// Short label for logs and metrics.
    fn name(&self) -> &'static str;
}

/// Read side of the external build status store.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// `Ok(None)` when no record exists for the id.
    async fn fetch(&self, build_id: &BuildId) -> Result<Option<Vec<u8>>, StoreError>;

    fn name(&self) -> &'static str;
}
