//! Centralized metrics infrastructure for the pipeline
//!
//! Each pipeline phase defines its own metrics in a dedicated submodule, which
//! keeps ownership clear and prevents naming conflicts. Runs are short-lived
//! batch jobs, so the recorder is rendered in-process and written to a
//! Prometheus textfile at the end of a run instead of being scraped.

pub mod analysis;
pub mod cleaning;
pub mod fusion;
pub mod registry;

pub use analysis::AnalysisMetrics;
pub use cleaning::CleaningMetrics;
pub use fusion::FusionMetrics;

use std::fs;
use std::path::Path;
use std::sync::{Once, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the in-process Prometheus recorder and register all phase metrics.
///
/// Idempotent. When another recorder is already installed (for example in an
/// embedding binary) metrics still flow to it, but no snapshot is available.
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            registry::register_all_metrics();
            info!("Prometheus recorder installed for in-process rendering");
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    });
}

/// Current snapshot in Prometheus text format, if the recorder is ours
pub fn render_snapshot() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

/// Write the snapshot to a textfile; a no-op when no recorder is installed
pub fn write_snapshot(path: &Path) -> std::io::Result<bool> {
    match render_snapshot() {
        Some(text) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, text)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Trait for phase-specific metrics collections
///
/// Each pipeline phase implements this trait to provide:
/// - Metric registration at startup
/// - Consistent naming conventions
/// - Documentation of what each metric measures
pub trait PhaseMetrics {
    /// Register all metrics for this phase
    fn register_metrics();

    /// Get the phase name for prefixing metrics
    fn phase_name() -> &'static str;

    /// Get documentation for all metrics in this phase
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Macro to create phase-specific metric names with consistent naming
///
/// All metrics follow the convention: medstat_{phase}_{metric_name}[_total]
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("medstat_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("medstat_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("medstat_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_naming_convention() {
        assert_eq!(
            phase_metric!(counter, "cleaning", "rows_dropped"),
            "medstat_cleaning_rows_dropped_total"
        );
        assert_eq!(
            phase_metric!(histogram, "analysis", "duration_seconds"),
            "medstat_analysis_duration_seconds"
        );
        assert_eq!(
            phase_metric!(gauge, "fusion", "join_mismatches"),
            "medstat_fusion_join_mismatches"
        );
    }
}
