//! Dispatch Phase Metrics
//!
//! Broker publish attempts, retries and latency.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record an acknowledged publish and how long it took end to end
    pub fn record_publish_acked(duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "dispatch", "publish_acked")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "dispatch", "publish_duration_seconds"))
            .record(duration_secs);
    }

    /// Record a publish that ended in a terminal error
    pub fn record_publish_failed(duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "dispatch", "publish_failed")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "dispatch", "publish_duration_seconds"))
            .record(duration_secs);
    }

    /// Record one retry of a transient send failure
    pub fn record_publish_retry() {
        ::metrics::counter!(phase_metric!(counter, "dispatch", "publish_retries")).increment(1);
    }
}

impl PhaseMetrics for DispatchMetrics {
    fn register_metrics() {
        for doc in Self::metrics_documentation() {
            match doc.metric_type {
                MetricType::Counter => {
                    ::metrics::describe_counter!(doc.name, doc.help);
                }
                MetricType::Histogram => {
                    ::metrics::describe_histogram!(doc.name, doc.help);
                }
            }
        }
    }

    fn phase_name() -> &'static str {
        "dispatch"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "dispatch", "publish_acked"),
                metric_type: MetricType::Counter,
                help: "Envelopes acknowledged by all in-sync replicas",
            },
            MetricDoc {
                name: phase_metric!(counter, "dispatch", "publish_failed"),
                metric_type: MetricType::Counter,
                help: "Envelopes that failed after the retry budget or timeout",
            },
            MetricDoc {
                name: phase_metric!(counter, "dispatch", "publish_retries"),
                metric_type: MetricType::Counter,
                help: "Retries of transient send failures",
            },
            MetricDoc {
                name: phase_metric!(histogram, "dispatch", "publish_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time from first send attempt to acknowledgment or terminal failure",
            },
        ]
    }
}
