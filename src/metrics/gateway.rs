//! Gateway Phase Metrics
//!
//! Request intake and status lookup outcomes as seen by the HTTP surface.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct GatewayMetrics;

impl GatewayMetrics {
    /// A submission passed validation and was queued on the channel
    pub fn record_request_queued() {
        ::metrics::counter!(phase_metric!(counter, "gateway", "requests_queued")).increment(1);
    }

    /// A submission failed validation
    pub fn record_request_rejected() {
        ::metrics::counter!(phase_metric!(counter, "gateway", "requests_rejected")).increment(1);
    }

    /// A validated submission could not be dispatched
    pub fn record_dispatch_failed() {
        ::metrics::counter!(phase_metric!(counter, "gateway", "dispatch_failures")).increment(1);
    }

    pub fn record_status_found() {
        ::metrics::counter!(phase_metric!(counter, "gateway", "status_found")).increment(1);
    }

    pub fn record_status_not_found() {
        ::metrics::counter!(phase_metric!(counter, "gateway", "status_not_found")).increment(1);
    }

    pub fn record_status_error() {
        ::metrics::counter!(phase_metric!(counter, "gateway", "status_errors")).increment(1);
    }

    pub fn record_route_miss() {
        ::metrics::counter!(phase_metric!(counter, "gateway", "route_misses")).increment(1);
    }
}

impl PhaseMetrics for GatewayMetrics {
    fn register_metrics() {
        for doc in Self::metrics_documentation() {
            ::metrics::describe_counter!(doc.name, doc.help);
        }
    }

    fn phase_name() -> &'static str {
        "gateway"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "gateway", "requests_queued"),
                metric_type: MetricType::Counter,
                help: "Build requests acknowledged by the broker",
            },
            MetricDoc {
                name: phase_metric!(counter, "gateway", "requests_rejected"),
                metric_type: MetricType::Counter,
                help: "Build requests rejected by validation",
            },
            MetricDoc {
                name: phase_metric!(counter, "gateway", "dispatch_failures"),
                metric_type: MetricType::Counter,
                help: "Validated build requests that could not be dispatched",
            },
            MetricDoc {
                name: phase_metric!(counter, "gateway", "status_found"),
                metric_type: MetricType::Counter,
                help: "Status lookups that returned a record",
            },
            MetricDoc {
                name: phase_metric!(counter, "gateway", "status_not_found"),
                metric_type: MetricType::Counter,
                help: "Status lookups for ids with no record",
            },
            MetricDoc {
                name: phase_metric!(counter, "gateway", "status_errors"),
                metric_type: MetricType::Counter,
                help: "Status lookups that failed in the store",
            },
            MetricDoc {
                name: phase_metric!(counter, "gateway", "route_misses"),
                metric_type: MetricType::Counter,
                help: "Requests that matched no route",
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_metrics_registration() {
        GatewayMetrics::register_metrics();
    }

    #[test]
    fn test_metrics_documentation() {
        let docs = GatewayMetrics::metrics_documentation();
        assert_eq!(docs.len(), 7);
        for doc in docs {
            assert!(doc.name.starts_with("collect_gateway_"));
            assert!(doc.name.ends_with("_total"));
        }
    }
}
