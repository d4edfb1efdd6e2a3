//! Fusion phase metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use metrics::{counter, gauge};

pub struct FusionMetrics;

impl PhaseMetrics for FusionMetrics {
    fn register_metrics() {
        let _ = gauge!(phase_metric!(gauge, "fusion", "rows_output"));
        let _ = gauge!(phase_metric!(gauge, "fusion", "join_mismatches"));
        let _ = counter!(phase_metric!(counter, "fusion", "standardization_excluded"));
    }

    fn phase_name() -> &'static str {
        "fusion"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(gauge, "fusion", "rows_output"),
                metric_type: MetricType::Gauge,
                help: "Rows in the fused analysis dataset",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "fusion", "join_mismatches"),
                metric_type: MetricType::Gauge,
                help: "Hospital rows without a matching statistics record",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "fusion", "standardization_excluded"),
                metric_type: MetricType::Counter,
                help: "Missing values excluded when fitting standardization",
                labels: vec!["field"],
            },
        ]
    }
}

impl FusionMetrics {
    pub fn record_rows(rows: usize) {
        gauge!(phase_metric!(gauge, "fusion", "rows_output")).set(rows as f64);
    }

    pub fn record_join_mismatches(mismatches: usize) {
        gauge!(phase_metric!(gauge, "fusion", "join_mismatches")).set(mismatches as f64);
    }

    pub fn record_excluded(field: &'static str, excluded: usize) {
        counter!(phase_metric!(counter, "fusion", "standardization_excluded"), "field" => field)
            .increment(excluded as u64);
    }
}
