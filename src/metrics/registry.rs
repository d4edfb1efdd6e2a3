//! One-time registration of every phase's metrics, with a duplicate-name check.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::metrics::{AnalysisMetrics, CleaningMetrics, FusionMetrics, MetricDoc, PhaseMetrics};

/// Describe all cleaning, fusion and analysis metrics to the recorder
pub fn register_all_metrics() {
    let mut names: BTreeMap<&'static str, &'static str> = BTreeMap::new();
    let mut duplicates = 0usize;
    duplicates += register::<CleaningMetrics>(&mut names);
    duplicates += register::<FusionMetrics>(&mut names);
    duplicates += register::<AnalysisMetrics>(&mut names);

    info!(metrics = names.len(), duplicates, "Metrics registered");
}

/// Registers one phase and returns how many of its names were already taken
fn register<T: PhaseMetrics>(names: &mut BTreeMap<&'static str, &'static str>) -> usize {
    T::register_metrics();
    claim_names(T::phase_name(), &T::metrics_documentation(), names)
}

fn claim_names(
    phase: &'static str,
    docs: &[MetricDoc],
    names: &mut BTreeMap<&'static str, &'static str>,
) -> usize {
    let mut duplicates = 0;
    for doc in docs {
        if let Some(owner) = names.get(doc.name) {
            warn!(metric = doc.name, owner, phase, "Metric name claimed by two phases");
            duplicates += 1;
        } else {
            debug!(metric = doc.name, kind = ?doc.metric_type, labels = ?doc.labels, phase, "{}", doc.help);
            names.insert(doc.name, phase);
        }
    }
    duplicates
}
