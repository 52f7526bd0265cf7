use crate::app::ports::MessageChannel;
use crate::config::BrokerConfig;
use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;
use crate::types::DispatchEnvelope;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How hard the dispatch client tries before giving up on an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on the whole publish, retries and backoff included.
    pub publish_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&BrokerConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            publish_timeout: config.publish_timeout(),
        }
    }

    /// Delay after the given failed attempt (1-based): base * 2^(attempt-1),
    /// capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Result of an acknowledged publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Publishes dispatch envelopes to the fixed build topic and waits for the
/// channel's full acknowledgment.
///
/// Cloning is cheap and every clone shares the one channel connection opened
/// at startup.
#[derive(Clone)]
pub struct DispatchClient {
    channel: Arc<dyn MessageChannel>,
    topic: Arc<str>,
    policy: RetryPolicy,
}

impl DispatchClient {
    pub fn new(channel: Arc<dyn MessageChannel>, topic: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            channel,
            topic: Arc::from(topic.into()),
            policy,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Publish one envelope. On `Ok` the broker has durably acknowledged it;
    /// on `Err` the retry budget or the publish timeout was exhausted.
    ///
    /// The timeout is checked between attempts only. An attempt that has
    /// started always runs to its outcome, bounded by the channel's own
    /// request deadline, so a record the broker appended is never reported
    /// as failed.
    pub async fn publish(&self, envelope: DispatchEnvelope) -> Result<PublishReceipt, DispatchError> {
        let payload = envelope.to_json_bytes()?;
        let build_id = envelope.build_id;
        let started = Instant::now();

        let outcome = self
            .send_with_retry(build_id.as_str().as_bytes(), payload, started)
            .await;

        let elapsed = started.elapsed();
        match outcome {
            Ok(attempts) => {
                DispatchMetrics::record_publish_acked(elapsed.as_secs_f64());
                info!(
                    build_id = %build_id,
                    topic = %self.topic,
                    attempts,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Produced new message"
                );
                Ok(PublishReceipt { attempts, elapsed })
            }
            Err(e) => {
                DispatchMetrics::record_publish_failed(elapsed.as_secs_f64());
                error!(build_id = %build_id, topic = %self.topic, "Publish failed: {}", e);
                Err(e)
            }
        }
    }

    async fn send_with_retry(
        &self,
        key: &[u8],
        payload: Vec<u8>,
        started: Instant,
    ) -> Result<u32, DispatchError> {
        let deadline = started + self.policy.publish_timeout;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let cause = match self.channel.send(&self.topic, key, payload.clone()).await {
                Ok(()) => return Ok(attempt),
                Err(cause) => cause,
            };
            if !cause.retryable || attempt >= self.policy.max_attempts {
                return Err(DispatchError::Rejected {
                    attempts: attempt,
                    cause,
                });
            }

            let delay = self.policy.backoff_for(attempt);
            if Instant::now() + delay >= deadline {
                warn!(
                    attempt,
                    "Publish timeout reached on {} after: {}",
                    self.channel.name(),
                    cause
                );
                return Err(DispatchError::TimedOut {
                    after: self.policy.publish_timeout,
                });
            }
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Transient send failure on {}: {}",
                self.channel.name(),
                cause
            );
            DispatchMetrics::record_publish_retry();
            tokio::time::sleep(delay).await;
        }
    }

    /// Release the channel connection. Called once during shutdown.
    pub async fn close(&self) {
        debug!("Closing {} channel", self.channel.name());
        self.channel.close().await;
        info!("Dispatch channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_id::new_build_id;
    use crate::error::ChannelError;
    use crate::infra::memory_channel::InMemoryChannel;
    use crate::types::BuildId;

    fn envelope(build_id: BuildId) -> DispatchEnvelope {
        DispatchEnvelope {
            build_id,
            project_github_url: "https://github.com/a/b".to_string(),
            build_command: "make".to_string(),
            build_out_dir: "dist".to_string(),
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            publish_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            publish_timeout: Duration::from_secs(10),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_default_policy_uses_five_attempts() {
        assert_eq!(RetryPolicy::default().max_attempts, 5);
        assert_eq!(RetryPolicy::default().publish_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_publish_keys_message_by_build_id() {
        let channel = Arc::new(InMemoryChannel::new());
        let client = DispatchClient::new(channel.clone(), "builds", fast_policy(5));
        let id = new_build_id();

        let receipt = client.publish(envelope(id.clone())).await.unwrap();
        assert_eq!(receipt.attempts, 1);

        let delivered = channel.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].topic, "builds");
        assert_eq!(delivered[0].key, id.as_str().as_bytes());
        let body: DispatchEnvelope = serde_json::from_slice(&delivered[0].payload).unwrap();
        assert_eq!(body.build_id, id);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_within_budget() {
        let channel = Arc::new(InMemoryChannel::new());
        channel.fail_next(3, ChannelError::transient("not leader for partition"));
        let client = DispatchClient::new(channel.clone(), "builds", fast_policy(5));

        let receipt = client.publish(envelope(new_build_id())).await.unwrap();
        assert_eq!(receipt.attempts, 4);
        assert_eq!(channel.attempts(), 4);
        assert_eq!(channel.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_budget_is_bounded() {
        let channel = Arc::new(InMemoryChannel::new());
        channel.fail_always(ChannelError::transient("broker unreachable"));
        let client = DispatchClient::new(channel.clone(), "builds", fast_policy(5));

        let err = client.publish(envelope(new_build_id())).await.unwrap_err();
        match err {
            DispatchError::Rejected { attempts, cause } => {
                assert_eq!(attempts, 5);
                assert_eq!(cause.message, "broker unreachable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(channel.attempts(), 5);
        assert!(channel.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_failure_is_not_retried() {
        let channel = Arc::new(InMemoryChannel::new());
        channel.fail_always(ChannelError::fatal("message too large"));
        let client = DispatchClient::new(channel.clone(), "builds", fast_policy(5));

        let err = client.publish(envelope(new_build_id())).await.unwrap_err();
        assert!(matches!(err, DispatchError::Rejected { attempts: 1, .. }));
        assert_eq!(channel.attempts(), 1);
    }

    #[tokio::test]
    async fn test_late_ack_past_timeout_is_still_success() {
        let channel = Arc::new(InMemoryChannel::new().with_latency(Duration::from_millis(300)));
        let policy = RetryPolicy {
            publish_timeout: Duration::from_millis(100),
            ..fast_policy(5)
        };
        let client = DispatchClient::new(channel.clone(), "builds", policy);

        let receipt = client.publish(envelope(new_build_id())).await.unwrap();
        assert_eq!(receipt.attempts, 1);
        assert!(receipt.elapsed >= Duration::from_millis(300));
        assert_eq!(channel.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_publish_timeout_stops_further_attempts() {
        let channel = Arc::new(InMemoryChannel::new());
        channel.fail_always(ChannelError::transient("broker unreachable"));
        let policy = RetryPolicy {
            max_attempts: 50,
            base_backoff: Duration::from_millis(40),
            max_backoff: Duration::from_millis(40),
            publish_timeout: Duration::from_millis(150),
        };
        let client = DispatchClient::new(channel.clone(), "builds", policy);

        let started = Instant::now();
        let err = client.publish(envelope(new_build_id())).await.unwrap_err();
        assert!(matches!(err, DispatchError::TimedOut { .. }), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(channel.attempts() >= 2 && channel.attempts() < 50);
        assert!(channel.delivered().is_empty());
    }
}
