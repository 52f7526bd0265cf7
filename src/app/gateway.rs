use crate::app::dispatch::DispatchClient;
use crate::app::status::StatusReader;
use crate::build_id::new_build_id;
use crate::error::{DispatchError, StatusError, ValidationError};
use crate::metrics::GatewayMetrics;
use crate::types::{BuildId, BuildRequestCandidate, CollectResponse, DispatchEnvelope};
use crate::validation::validate;
use tracing::{info, warn};

/// Outcome of a validated submission.
///
/// The id of a failed dispatch stays inside the gateway: nothing downstream
/// will ever hold a record for it.
#[derive(Debug)]
pub enum SubmitOutcome {
    Queued(BuildId),
    DispatchFailed { build_id: BuildId, error: DispatchError },
}

impl From<SubmitOutcome> for CollectResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Queued(build_id) => CollectResponse::queued(build_id),
            SubmitOutcome::DispatchFailed { error, .. } => CollectResponse::failed(error.to_string()),
        }
    }
}

/// Composes validation, id assignment, dispatch and status lookup.
#[derive(Clone)]
pub struct IngestionGateway {
    dispatch: DispatchClient,
    status: StatusReader,
}

impl IngestionGateway {
    pub fn new(dispatch: DispatchClient, status: StatusReader) -> Self {
        Self { dispatch, status }
    }

    pub fn dispatch(&self) -> &DispatchClient {
        &self.dispatch
    }

    /// Validate, assign an id and publish.
    ///
    /// The publish runs on its own task: if the caller goes away mid-request
    /// the handler future is dropped but the publish still runs to its end.
    /// Nothing here retries; the dispatch client owns the retry budget.
    pub async fn submit(&self, candidate: BuildRequestCandidate) -> Result<SubmitOutcome, ValidationError> {
        let request = validate(candidate).map_err(|e| {
            GatewayMetrics::record_request_rejected();
            warn!("Rejected build request: {}", e);
            e
        })?;

        let build_id = new_build_id();
        let envelope = DispatchEnvelope::new(build_id.clone(), request);

        let dispatch = self.dispatch.clone();
        let published = tokio::spawn(async move { dispatch.publish(envelope).await })
            .await
            .unwrap_or(Err(DispatchError::Aborted));

        match published {
            Ok(_) => {
                GatewayMetrics::record_request_queued();
                info!("New Build request!! Assigned buildId {}", build_id);
                Ok(SubmitOutcome::Queued(build_id))
            }
            Err(error) => {
                GatewayMetrics::record_dispatch_failed();
                warn!(build_id = %build_id, "Build request not queued: {}", error);
                Ok(SubmitOutcome::DispatchFailed { build_id, error })
            }
        }
    }

    pub async fn build_status(&self, build_id: &BuildId) -> Result<Vec<u8>, StatusError> {
        let result = self.status.fetch_status(build_id).await;
        match &result {
            Ok(_) => GatewayMetrics::record_status_found(),
            Err(StatusError::NotFound(_)) => GatewayMetrics::record_status_not_found(),
            Err(StatusError::Store(_)) => GatewayMetrics::record_status_error(),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dispatch::RetryPolicy;
    use crate::error::ChannelError;
    use crate::infra::{InMemoryChannel, InMemoryStatusStore};
    use std::sync::Arc;
    use std::time::Duration;

    fn gateway(channel: Arc<InMemoryChannel>, store: Arc<InMemoryStatusStore>) -> IngestionGateway {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            publish_timeout: Duration::from_secs(5),
        };
        IngestionGateway::new(
            DispatchClient::new(channel, "webfront-kafka", policy),
            StatusReader::new(store),
        )
    }

    fn valid() -> BuildRequestCandidate {
        BuildRequestCandidate {
            project_github_url: Some("https://github.com/a/b".to_string()),
            build_command: Some("make".to_string()),
            build_out_dir: Some("dist".to_string()),
        }
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_channel() {
        let channel = Arc::new(InMemoryChannel::new());
        let gw = gateway(channel.clone(), Arc::new(InMemoryStatusStore::new()));

        let err = gw
            .submit(BuildRequestCandidate {
                build_out_dir: None,
                ..valid()
            })
            .await
            .unwrap_err();
        assert_eq!(err.fields(), vec!["build_out_dir"]);
        assert_eq!(channel.attempts(), 0);
    }

    #[tokio::test]
    async fn test_queued_submission_publishes_its_id() {
        let channel = Arc::new(InMemoryChannel::new());
        let gw = gateway(channel.clone(), Arc::new(InMemoryStatusStore::new()));

        let outcome = gw.submit(valid()).await.unwrap();
        let SubmitOutcome::Queued(id) = outcome else {
            panic!("expected queued outcome");
        };
        let sent: DispatchEnvelope = serde_json::from_slice(&channel.delivered()[0].payload).unwrap();
        assert_eq!(sent.build_id, id);
        assert_eq!(sent.build_command, "make");
    }

    #[tokio::test]
    async fn test_dispatch_failure_hides_build_id() {
        let channel = Arc::new(InMemoryChannel::new());
        channel.fail_always(ChannelError::transient("kafka: client has run out of available brokers"));
        let store = Arc::new(InMemoryStatusStore::new());
        let gw = gateway(channel.clone(), store.clone());

        let outcome = gw.submit(valid()).await.unwrap();
        let generated = match &outcome {
            SubmitOutcome::DispatchFailed { build_id, .. } => build_id.clone(),
            other => panic!("expected dispatch failure, got {other:?}"),
        };
        assert_eq!(channel.attempts(), 3);

        let response = CollectResponse::from(outcome);
        assert!(!response.success);
        assert!(response.build_id.is_none());
        assert!(response.message.contains("run out of available brokers"));

        assert!(matches!(
            gw.build_status(&generated).await,
            Err(StatusError::NotFound(_))
        ));
    }
}
