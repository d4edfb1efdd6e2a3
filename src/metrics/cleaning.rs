//! Cleaning phase metrics
//!
//! Row accounting for the Raw → Parsed → Deduplicated → Canonical walk,
//! labelled by dataset.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use crate::pipeline::processing::normalize::CleaningStats;
use metrics::{counter, gauge};

pub struct CleaningMetrics;

impl PhaseMetrics for CleaningMetrics {
    fn register_metrics() {
        let _ = counter!(phase_metric!(counter, "cleaning", "rows_input"));
        let _ = counter!(phase_metric!(counter, "cleaning", "rows_dropped"));
        let _ = counter!(phase_metric!(counter, "cleaning", "rows_flagged"));
        let _ = counter!(phase_metric!(counter, "cleaning", "duplicates_removed"));
        let _ = gauge!(phase_metric!(gauge, "cleaning", "rows_output"));
    }

    fn phase_name() -> &'static str {
        "cleaning"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "cleaning", "rows_input"),
                metric_type: MetricType::Counter,
                help: "Raw records handed to a cleaner",
                labels: vec!["dataset"],
            },
            MetricDoc {
                name: phase_metric!(counter, "cleaning", "rows_dropped"),
                metric_type: MetricType::Counter,
                help: "Records dropped because a required field could not be parsed",
                labels: vec!["dataset"],
            },
            MetricDoc {
                name: phase_metric!(counter, "cleaning", "rows_flagged"),
                metric_type: MetricType::Counter,
                help: "Records kept with at least one unparseable optional field",
                labels: vec!["dataset"],
            },
            MetricDoc {
                name: phase_metric!(counter, "cleaning", "duplicates_removed"),
                metric_type: MetricType::Counter,
                help: "Records removed as duplicates of an earlier record",
                labels: vec!["dataset"],
            },
            MetricDoc {
                name: phase_metric!(gauge, "cleaning", "rows_output"),
                metric_type: MetricType::Gauge,
                help: "Canonical rows produced by the last cleaning pass",
                labels: vec!["dataset"],
            },
        ]
    }
}

impl CleaningMetrics {
    pub fn record_dataset(dataset: &'static str, stats: &CleaningStats) {
        counter!(phase_metric!(counter, "cleaning", "rows_input"), "dataset" => dataset)
            .increment(stats.input_rows as u64);
        counter!(phase_metric!(counter, "cleaning", "rows_dropped"), "dataset" => dataset)
            .increment(stats.dropped_rows as u64);
        counter!(phase_metric!(counter, "cleaning", "rows_flagged"), "dataset" => dataset)
            .increment(stats.flagged_rows as u64);
        counter!(phase_metric!(counter, "cleaning", "duplicates_removed"), "dataset" => dataset)
            .increment(stats.duplicate_rows as u64);
        gauge!(phase_metric!(gauge, "cleaning", "rows_output"), "dataset" => dataset)
            .set(stats.output_rows as f64);
    }
}
