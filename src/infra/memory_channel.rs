use crate::app::ports::MessageChannel;
use crate::error::ChannelError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// A message that the in-memory channel acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub topic: String,
    pub key: Vec<u8>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct Script {
    fail_next: usize,
    fail_always: bool,
    error: Option<ChannelError>,
}

/// In-process channel for local development and tests.
///
/// Records every acknowledged message and every attempt, and can be scripted
/// to fail a number of sends or all of them.
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    delivered: Mutex<Vec<DeliveredMessage>>,
    attempts: AtomicUsize,
    attempted_keys: Mutex<Vec<Vec<u8>>>,
    script: Mutex<Script>,
    latency: Option<Duration>,
    closed: AtomicBool,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every send by `latency` before acknowledging it.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next `count` sends with `error`.
    pub fn fail_next(&self, count: usize, error: ChannelError) {
        let mut script = self.script.lock().unwrap_or_else(|p| p.into_inner());
        script.fail_next = count;
        script.error = Some(error);
    }

    /// Fail every send with `error` until `heal` is called.
    pub fn fail_always(&self, error: ChannelError) {
        let mut script = self.script.lock().unwrap_or_else(|p| p.into_inner());
        script.fail_always = true;
        script.error = Some(error);
    }

    pub fn heal(&self) {
        *self.script.lock().unwrap_or_else(|p| p.into_inner()) = Script::default();
    }

    pub fn delivered(&self) -> Vec<DeliveredMessage> {
        self.delivered.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Number of `send` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Keys of every `send` call in order, including failed ones.
    pub fn attempted_keys(&self) -> Vec<Vec<u8>> {
        self.attempted_keys.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn scripted_failure(&self) -> Option<ChannelError> {
        let mut script = self.script.lock().unwrap_or_else(|p| p.into_inner());
        if script.fail_always {
            return script.error.clone();
        }
        if script.fail_next > 0 {
            script.fail_next -= 1;
            return script.error.clone();
        }
        None
    }
}

#[async_trait]
impl MessageChannel for InMemoryChannel {
    async fn send(&self, topic: &str, key: &[u8], payload: Vec<u8>) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempted_keys
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(key.to_vec());
        if self.is_closed() {
            return Err(ChannelError::fatal("channel is closed"));
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = self.scripted_failure() {
            return Err(err);
        }
        debug!(topic, bytes = payload.len(), "In-memory channel accepted message");
        self.delivered
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(DeliveredMessage {
                topic: topic.to_string(),
                key: key.to_vec(),
                payload,
            });
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
