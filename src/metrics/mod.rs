//! Metrics for the collect gateway
//!
//! Each phase (request intake, dispatch) defines its own metrics in a
//! dedicated submodule and registers them through [`PhaseMetrics`]. Values are
//! recorded through the `metrics` facade and exposed in Prometheus text format
//! on `GET /metrics`.

pub mod dispatch;
pub mod gateway;
pub mod registry;

pub use dispatch::DispatchMetrics;
pub use gateway::GatewayMetrics;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder and register every phase's metrics.
///
/// Idempotent. When disabled, the `metrics` macros stay no-ops and
/// [`render`] returns an empty exposition.
pub fn init_metrics(enabled: bool) {
    if !enabled {
        info!("Metrics disabled; /metrics will be empty");
        return;
    }
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_err() {
                warn!("Prometheus handle was already set");
            }
            registry::register_all_metrics();
            info!("Prometheus recorder installed");
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    });
}

/// Render the current metric values in Prometheus text format.
pub fn render() -> String {
    match HANDLE.get() {
        Some(handle) => {
            handle.run_upkeep();
            handle.render()
        }
        None => String::new(),
    }
}

/// Implemented by each phase's metric collection.
pub trait PhaseMetrics {
    /// Describe every metric of the phase to the installed recorder.
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Build a metric name following `collect_{phase}_{name}` (counters get a
/// `_total` suffix).
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("collect_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("collect_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_naming_convention() {
        assert_eq!(
            phase_metric!(counter, "gateway", "requests_accepted"),
            "collect_gateway_requests_accepted_total"
        );
        assert_eq!(
            phase_metric!(histogram, "dispatch", "publish_duration_seconds"),
            "collect_dispatch_publish_duration_seconds"
        );
    }

    #[test]
    fn test_render_without_recorder_is_empty_or_text() {
        // Another test may have installed the recorder; either way this must not panic.
        let _ = render();
    }
}
