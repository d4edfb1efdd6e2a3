//! Analysis phase metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};
use metrics::{counter, histogram};

pub struct AnalysisMetrics;

impl PhaseMetrics for AnalysisMetrics {
    fn register_metrics() {
        let _ = counter!(phase_metric!(counter, "analysis", "completed"));
        let _ = counter!(phase_metric!(counter, "analysis", "insufficient_data"));
        let _ = histogram!(phase_metric!(histogram, "analysis", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "analysis"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "analysis", "completed"),
                metric_type: MetricType::Counter,
                help: "Analyses that produced a complete result",
                labels: vec!["analysis"],
            },
            MetricDoc {
                name: phase_metric!(counter, "analysis", "insufficient_data"),
                metric_type: MetricType::Counter,
                help: "Analyses reported as insufficient data",
                labels: vec!["analysis"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "analysis", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time spent in one analysis",
                labels: vec!["analysis"],
            },
        ]
    }
}

impl AnalysisMetrics {
    pub fn record_outcome(analysis: &'static str, complete: bool, duration_secs: f64) {
        if complete {
            counter!(phase_metric!(counter, "analysis", "completed"), "analysis" => analysis)
                .increment(1);
        } else {
            counter!(phase_metric!(counter, "analysis", "insufficient_data"), "analysis" => analysis)
                .increment(1);
        }
        histogram!(phase_metric!(histogram, "analysis", "duration_seconds"), "analysis" => analysis)
            .record(duration_secs);
    }
}
