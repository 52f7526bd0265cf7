//! Kafka-backed [`MessageChannel`].
//!
//! rskafka always produces with `acks = all`, so a successful `produce` means
//! every in-sync replica holds the record. The partition client multiplexes
//! concurrent requests over one broker connection and needs no outer lock.
//!
//! rskafka retries connection and leader errors internally. Its backoff
//! deadline is set from `BrokerConfig::request_deadline`, so one `send` ends
//! with an error instead of retrying forever while the broker is down.

use crate::app::ports::MessageChannel;
use crate::config::BrokerConfig;
use crate::error::{ChannelError, GatewayError};
use async_trait::async_trait;
use chrono::Utc;
use rskafka::client::error::{Error as KafkaError, ProtocolError};
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::ClientBuilder;
use rskafka::record::Record;
use rskafka::BackoffConfig;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

pub struct KafkaChannel {
    topic: String,
    partition: i32,
    partition_client: RwLock<Option<Arc<PartitionClient>>>,
}

impl KafkaChannel {
    /// Connect to the cluster and resolve the leader for the configured
    /// topic and partition.
    ///
    /// Called once at startup; a failure here is fatal for the process. The
    /// whole handshake is bounded by `connect_timeout`.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, GatewayError> {
        let topic = config.topic.as_str();
        let partition = config.partition;
        info!(brokers = ?config.bootstrap_servers, topic, partition, "Connecting to Kafka");

        let backoff = BackoffConfig {
            deadline: Some(config.request_deadline()),
            ..BackoffConfig::default()
        };
        let handshake = async {
            let client = ClientBuilder::new(config.bootstrap_servers.clone())
                .backoff_config(backoff)
                .build()
                .await
                .map_err(|e| GatewayError::Broker(format!("failed to create Kafka client: {e}")))?;

            client
                .partition_client(topic.to_string(), partition, UnknownTopicHandling::Error)
                .await
                .map_err(|e| {
                    GatewayError::Broker(format!(
                        "failed to open partition {partition} of topic '{topic}': {e}"
                    ))
                })
        };

        let partition_client = tokio::time::timeout(config.connect_timeout(), handshake)
            .await
            .map_err(|_| {
                GatewayError::Broker(format!(
                    "no broker reachable within {:?} at {:?}",
                    config.connect_timeout(),
                    config.bootstrap_servers
                ))
            })??;

        info!(topic, partition, "Kafka producer created successfully");
        Ok(Self {
            topic: topic.to_string(),
            partition,
            partition_client: RwLock::new(Some(Arc::new(partition_client))),
        })
    }

    fn client(&self) -> Option<Arc<PartitionClient>> {
        self.partition_client
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

/// Broker answers that describe the request or its permissions; resending
/// the same record cannot change them.
fn is_permanent(error: ProtocolError) -> bool {
    matches!(
        error,
        ProtocolError::MessageTooLarge
            | ProtocolError::RecordListTooLarge
            | ProtocolError::InvalidRecord
            | ProtocolError::CorruptMessage
            | ProtocolError::InvalidRequiredAcks
            | ProtocolError::InvalidTopicException
            | ProtocolError::UnknownTopicOrPartition
            | ProtocolError::TopicAuthorizationFailed
            | ProtocolError::ClusterAuthorizationFailed
            | ProtocolError::UnsupportedVersion
    )
}

/// Map a produce failure onto the channel's retry contract.
///
/// `RetryFailed` means rskafka's own backoff deadline ran out while the
/// broker was unreachable; the dispatch budget decides whether to go again.
fn classify(err: KafkaError) -> ChannelError {
    let retryable = match &err {
        KafkaError::ServerError { protocol_error, .. } => !is_permanent(*protocol_error),
        KafkaError::InvalidResponse(_) => false,
        _ => true,
    };
    let message = err.to_string();
    if retryable {
        ChannelError::transient(message)
    } else {
        ChannelError::fatal(message)
    }
}

#[async_trait]
impl MessageChannel for KafkaChannel {
    async fn send(&self, topic: &str, key: &[u8], payload: Vec<u8>) -> Result<(), ChannelError> {
        if topic != self.topic {
            return Err(ChannelError::fatal(format!(
                "producer is bound to topic '{}', not '{}'",
                self.topic, topic
            )));
        }
        let Some(partition_client) = self.client() else {
            return Err(ChannelError::fatal("Kafka producer is closed"));
        };

        let record = Record {
            key: Some(key.to_vec()),
            value: Some(payload),
            headers: BTreeMap::from([(
                "content-type".to_string(),
                b"application/json".to_vec(),
            )]),
            timestamp: Utc::now(),
        };

        let offsets = partition_client
            .produce(vec![record], Compression::NoCompression)
            .await
            .map_err(classify)?;

        if offsets.is_empty() {
            warn!(topic, partition = self.partition, "Broker acknowledged produce without offsets");
        }
        Ok(())
    }

    async fn close(&self) {
        let released = self
            .partition_client
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if released.is_some() {
            info!(topic = %self.topic, partition = self.partition, "Kafka producer closed");
        }
    }

    fn name(&self) -> &'static str {
        "kafka"
    }
}
