//! Registration of all phase metrics, with early detection of name clashes.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::gateway::GatewayMetrics>(&mut all_metrics);
    register_phase_metrics::<super::dispatch::DispatchMetrics>(&mut all_metrics);

    info!("Registered {} metrics across all phases", all_metrics.len());
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    for doc in T::metrics_documentation() {
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' registered twice (phase '{}')",
                doc.name,
                T::phase_name()
            );
        } else {
            all_metrics.insert(doc.name, doc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{DispatchMetrics, GatewayMetrics};
    use std::collections::HashSet;

    #[test]
    fn test_phase_metric_names_are_unique() {
        let docs: Vec<_> = GatewayMetrics::metrics_documentation()
            .into_iter()
            .chain(DispatchMetrics::metrics_documentation())
            .collect();
        let names: HashSet<_> = docs.iter().map(|d| d.name).collect();
        assert_eq!(names.len(), docs.len());
    }
}
