//! Statistical analysis engine.
//!
//! Four independent analyses run over the read-only fused dataset (temporal
//! also reads the canonical hospital rows). Each yields a result record and a
//! chart instruction. An analysis that cannot meet its data precondition
//! reports `insufficient_data`; it never fails the run.

pub mod charts;
pub mod clustering;
pub mod correlation;
pub mod geographical;
pub mod linalg;
pub mod stats;
pub mod temporal;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::config::AnalysisConfig;
use crate::constants;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::domain::HospitalRecord;
use crate::error::Stage;
use crate::metrics::AnalysisMetrics;
use crate::pipeline::processing::fusion::FusedDataset;

use charts::{ChartFilter, ChartSpec};
use clustering::{ClusteringResult, KMeansSettings};
use correlation::CorrelationResult;
use geographical::GeographicalResult;
use temporal::TemporalResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Temporal,
    Geographical,
    Correlation,
    Clustering,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Temporal,
        AnalysisKind::Geographical,
        AnalysisKind::Correlation,
        AnalysisKind::Clustering,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AnalysisKind::Temporal => "temporal",
            AnalysisKind::Geographical => "geographical",
            AnalysisKind::Correlation => "correlation",
            AnalysisKind::Clustering => "clustering",
        }
    }
}

/// Result of one analysis (or one step of it)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Complete(T),
    InsufficientData {
        reason: String,
        required: usize,
        available: usize,
    },
    /// Enough data, but the statistic is not defined for it (e.g. a constant series)
    Undefined { reason: String },
}

impl<T> Outcome<T> {
    pub fn insufficient(reason: impl Into<String>, required: usize, available: usize) -> Self {
        Outcome::InsufficientData {
            reason: reason.into(),
            required,
            available,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }

    pub fn complete(&self) -> Option<&T> {
        match self {
            Outcome::Complete(value) => Some(value),
            _ => None,
        }
    }

    /// Human-readable reason when the outcome is not complete
    pub fn shortfall(&self) -> Option<String> {
        match self {
            Outcome::Complete(_) => None,
            Outcome::InsufficientData {
                reason,
                required,
                available,
            } => Some(format!("{} (required {}, available {})", reason, required, available)),
            Outcome::Undefined { reason } => Some(reason.clone()),
        }
    }
}

/// One analysis result record: outcome plus the identifier of its figure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord<T> {
    pub figure: String,
    pub outcome: Outcome<T>,
}

/// All four analysis records, keyed by analysis name when serialized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub temporal: AnalysisRecord<TemporalResult>,
    pub geographical: AnalysisRecord<GeographicalResult>,
    pub correlation: AnalysisRecord<CorrelationResult>,
    pub clustering: AnalysisRecord<ClusteringResult>,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutput {
    pub results: AnalysisResults,
    pub charts: Vec<ChartSpec>,
    pub diagnostics: Diagnostics,
}

pub struct AnalysisEngine {
    config: AnalysisConfig,
}

impl AnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, hospital: &[HospitalRecord], fused: &FusedDataset) -> AnalysisOutput {
        let span = info_span!("analyze", rows = fused.len());
        let _enter = span.enter();

        let mut diagnostics = Diagnostics::new();
        let period = self.config.seasonal_period;
        let ext = self.config.figure_extension.as_str();

        let temporal = timed(AnalysisKind::Temporal, || temporal::analyze(hospital, period));
        if let Some(t) = temporal.complete() {
            note(AnalysisKind::Temporal, "decomposition", &t.decomposition, &mut diagnostics);
            note(AnalysisKind::Temporal, "stationarity", &t.stationarity, &mut diagnostics);
        }
        note(AnalysisKind::Temporal, "temporal", &temporal, &mut diagnostics);

        let geographical = timed(AnalysisKind::Geographical, || geographical::analyze(fused.rows()));
        if let Some(g) = geographical.complete() {
            note(AnalysisKind::Geographical, "anova", &g.anova, &mut diagnostics);
        }
        note(AnalysisKind::Geographical, "geographical", &geographical, &mut diagnostics);

        let correlation = timed(AnalysisKind::Correlation, || correlation::analyze(fused.rows()));
        note(AnalysisKind::Correlation, "correlation", &correlation, &mut diagnostics);

        let settings = KMeansSettings::from(&self.config);
        let clustering = timed(AnalysisKind::Clustering, || clustering::analyze(fused.rows(), settings));
        note(AnalysisKind::Clustering, "clustering", &clustering, &mut diagnostics);

        let charts = build_charts(hospital, fused, clustering.complete(), &ChartFilter::default(), &self.config);

        let figure = |kind: AnalysisKind| constants::figure_file_name(kind.name(), ext);
        let results = AnalysisResults {
            temporal: AnalysisRecord {
                figure: figure(AnalysisKind::Temporal),
                outcome: temporal,
            },
            geographical: AnalysisRecord {
                figure: figure(AnalysisKind::Geographical),
                outcome: geographical,
            },
            correlation: AnalysisRecord {
                figure: figure(AnalysisKind::Correlation),
                outcome: correlation,
            },
            clustering: AnalysisRecord {
                figure: figure(AnalysisKind::Clustering),
                outcome: clustering,
            },
        };

        info!(
            diagnostics = diagnostics.len(),
            "Completed statistical analyses"
        );
        AnalysisOutput {
            results,
            charts,
            diagnostics,
        }
    }
}

/// Chart instructions for all four analyses over the rows the filter admits.
/// Without a clustering result the scatter chart is empty.
pub fn build_charts(
    hospital: &[HospitalRecord],
    fused: &FusedDataset,
    clustering: Option<&ClusteringResult>,
    filter: &ChartFilter,
    config: &AnalysisConfig,
) -> Vec<ChartSpec> {
    let cluster_chart = match clustering {
        Some(result) => charts::cluster_chart(fused.rows(), result, filter),
        None => charts::cluster_chart(&[], &empty_clustering(KMeansSettings::from(config)), filter),
    };
    vec![
        charts::temporal_chart(hospital, filter, config.seasonal_period),
        charts::geographical_chart(fused.rows(), filter),
        charts::correlation_chart(fused.rows(), filter),
        cluster_chart,
    ]
    .into_iter()
    .map(|c| c.with_extension(&config.figure_extension))
    .collect()
}

fn timed<T>(kind: AnalysisKind, run: impl FnOnce() -> Outcome<T>) -> Outcome<T> {
    let started = Instant::now();
    let outcome = run();
    AnalysisMetrics::record_outcome(kind.name(), outcome.is_complete(), started.elapsed().as_secs_f64());
    outcome
}

fn note<T>(kind: AnalysisKind, step: &str, outcome: &Outcome<T>, diagnostics: &mut Diagnostics) {
    if let Some(reason) = outcome.shortfall() {
        warn!(analysis = kind.name(), step, "{}", reason);
        diagnostics.push(
            Stage::Analysis,
            constants::ANALYSIS_DATASET,
            DiagnosticKind::InsufficientData,
            None,
            format!("{}/{}: {}", kind.name(), step, reason),
        );
    }
}

fn empty_clustering(settings: KMeansSettings) -> ClusteringResult {
    use crate::pipeline::processing::fusion::{MissingValuePolicy, StandardizationParams};
    ClusteringResult {
        features: crate::domain::PrimaryField::ALL.to_vec(),
        policy: MissingValuePolicy::CLUSTERING,
        scaling: StandardizationParams {
            policy: MissingValuePolicy::CLUSTERING,
            columns: Vec::new(),
        },
        n_clusters: settings.n_clusters,
        seed: settings.seed,
        restarts: settings.restarts,
        iterations: 0,
        inertia: 0.0,
        centers: Vec::new(),
        centers_original: Vec::new(),
        labels: Vec::new(),
        cluster_sizes: Vec::new(),
        explained_variance_ratio: Vec::new(),
        projection: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome: Outcome<geographical::AnovaResult> = Outcome::insufficient("one location", 2, 1);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "insufficient_data");
        assert_eq!(json["required"], 2);
        assert_eq!(json["available"], 1);

        let complete: Outcome<geographical::AnovaResult> = Outcome::Complete(geographical::AnovaResult {
            groups: 2,
            df_between: 1,
            df_within: 8,
            f_statistic: Some(3.5),
            p_value: None,
        });
        let json = serde_json::to_value(&complete).unwrap();
        assert_eq!(json["status"], "complete");
        assert_eq!(json["f_statistic"], 3.5);
        assert!(json["p_value"].is_null());
        let back: Outcome<geographical::AnovaResult> = serde_json::from_value(json).unwrap();
        assert_eq!(back, complete);
    }

    #[test]
    fn test_engine_reports_insufficient_data_without_failing() {
        let fused = FusedDataset::restore(Vec::new());
        let output = AnalysisEngine::new(AnalysisConfig::default()).run(&[], &fused);

        assert!(!output.results.temporal.outcome.is_complete());
        assert!(!output.results.clustering.outcome.is_complete());
        assert_eq!(output.charts.len(), 4);
        assert_eq!(output.results.temporal.figure, "temporal_analysis.png");
        assert!(output.diagnostics.count(DiagnosticKind::InsufficientData) >= 4);
    }
}
