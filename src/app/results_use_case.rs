//! Results accumulator: one structure per run, persisted once.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::AnalysisResults;
use crate::app::ports::{CanonicalDatasets, ResultsOutputPort};
use crate::diagnostics::Diagnostics;
use crate::fingerprint::compute_run_key;
use crate::pipeline::processing::fusion::{FusedDataset, JoinReport, StandardizationParams};
use crate::pipeline::processing::normalize::CleaningStats;
use crate::pipeline::processing::quality_gate::DataQualityReport;
use crate::pipeline::processing::summary::StatisticalSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub version: String,
    pub seed: u64,
    /// Input file name → SHA-256 of its bytes
    pub input_fingerprints: BTreeMap<String, String>,
    pub run_key: String,
    pub standardization: StandardizationParams,
    /// `None` when analysis ran over a fused dataset read back from disk
    pub join: Option<JoinReport>,
    pub processing_steps: Vec<String>,
}

impl RunMetadata {
    pub fn new(seed: u64, input_fingerprints: BTreeMap<String, String>, fused: &FusedDataset) -> Self {
        let run_key = compute_run_key(&input_fingerprints, seed);
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            seed,
            input_fingerprints,
            run_key,
            standardization: fused.standardization().clone(),
            join: fused.join_report().cloned(),
            processing_steps: Vec::new(),
        }
    }
}

/// The persisted results of one run (`analysis_results.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResults {
    pub analyses: AnalysisResults,
    pub statistical_summary: StatisticalSummary,
    pub data_quality: DataQualityReport,
    pub diagnostics: Diagnostics,
    pub metadata: RunMetadata,
}

/// Run bookkeeping (`processing_metadata.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub metadata: RunMetadata,
    pub data_quality: DataQualityReport,
    /// Quality of the cleaned datasets before fusion; empty when the run
    /// started from processed files
    #[serde(default)]
    pub initial_quality: DataQualityReport,
    pub cleaning: BTreeMap<String, CleaningStats>,
    pub diagnostics: Diagnostics,
}

/// Collects stage outputs until the run is finished
#[derive(Debug)]
pub struct ResultsAccumulator {
    metadata: RunMetadata,
    initial_quality: DataQualityReport,
    cleaning: BTreeMap<String, CleaningStats>,
    diagnostics: Diagnostics,
}

impl ResultsAccumulator {
    pub fn new(metadata: RunMetadata) -> Self {
        Self {
            metadata,
            initial_quality: DataQualityReport::new(),
            cleaning: BTreeMap::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn record_step(&mut self, step: &str) {
        self.metadata.processing_steps.push(step.to_string());
    }

    pub fn record_cleaning(&mut self, stats: BTreeMap<String, CleaningStats>, quality: DataQualityReport) {
        self.cleaning = stats;
        self.initial_quality = quality;
    }

    pub fn record_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.diagnostics.extend(diagnostics);
    }

    /// Recompute quality and summary over every processed dataset and seal the run
    pub fn finish(
        self,
        datasets: &CanonicalDatasets,
        fused: &FusedDataset,
        analyses: AnalysisResults,
    ) -> (PipelineResults, ProcessingMetadata) {
        let data_quality = final_quality_report(datasets, fused);

        let mut statistical_summary = StatisticalSummary::new();
        statistical_summary.add(&datasets.publications);
        statistical_summary.add(&datasets.hospital);
        statistical_summary.add(&datasets.statistics);
        statistical_summary.add(fused.rows());

        let results = PipelineResults {
            analyses,
            statistical_summary,
            data_quality: data_quality.clone(),
            diagnostics: self.diagnostics.clone(),
            metadata: self.metadata.clone(),
        };
        let processing = ProcessingMetadata {
            metadata: self.metadata,
            data_quality,
            initial_quality: self.initial_quality,
            cleaning: self.cleaning,
            diagnostics: self.diagnostics,
        };
        (results, processing)
    }
}

pub fn final_quality_report(datasets: &CanonicalDatasets, fused: &FusedDataset) -> DataQualityReport {
    let mut report = DataQualityReport::new();
    report.record(&datasets.publications);
    report.record(&datasets.hospital);
    report.record(&datasets.statistics);
    report.record(fused.rows());

    report.join_mismatches = fused.join_report().map_or(0, |j| j.mismatches);
    report.standardization_excluded = fused
        .standardization()
        .columns
        .iter()
        .map(|c| (c.field.clone(), c.excluded))
        .collect();
    report
}

/// Use case for persisting the accumulated results
pub struct ResultsUseCase {
    output: Box<dyn ResultsOutputPort>,
}

impl ResultsUseCase {
    pub fn new(output: Box<dyn ResultsOutputPort>) -> Self {
        Self { output }
    }

    pub fn persist(&self, results: &PipelineResults, processing: &ProcessingMetadata) -> Result<()> {
        self.output
            .write_results(results)
            .context("results stage: failed to write analysis results")?;
        self.output
            .write_metadata(processing)
            .context("results stage: failed to write processing metadata")?;

        info!(
            run_id = %results.metadata.run_id,
            run_key = %results.metadata.run_key,
            diagnostics = results.diagnostics.len(),
            "Results persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisEngine;
    use crate::config::AnalysisConfig;
    use crate::domain::{FusedRecord, HospitalRecord};
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockResultsOutput {
        results: Arc<Mutex<Vec<PipelineResults>>>,
        metadata: Arc<Mutex<Vec<ProcessingMetadata>>>,
    }

    impl ResultsOutputPort for MockResultsOutput {
        fn write_results(&self, results: &PipelineResults) -> Result<()> {
            self.results.lock().unwrap().push(results.clone());
            Ok(())
        }

        fn write_metadata(&self, metadata: &ProcessingMetadata) -> Result<()> {
            self.metadata.lock().unwrap().push(metadata.clone());
            Ok(())
        }
    }

    fn fused_row(name: &str, count: Option<u64>) -> FusedRecord {
        FusedRecord {
            hospital_name: Some(name.to_string()),
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            location: Some("Boston".to_string()),
            surgery_count: count,
            statistics_source: None,
            mean_value: None,
            publication_count: Some(0),
            surgery_rate: None,
            surgery_count_std: None,
            mean_value_std: None,
            publication_count_std: None,
        }
    }

    fn finished() -> (PipelineResults, ProcessingMetadata) {
        let datasets = CanonicalDatasets {
            hospital: vec![HospitalRecord {
                hospital_name: Some("General".to_string()),
                date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
                surgery_count: Some(4),
                location: Some("Boston".to_string()),
                count_missing: false,
            }],
            ..CanonicalDatasets::default()
        };
        let fused = FusedDataset::restore(vec![fused_row("General", Some(4)), fused_row("Mercy", None)]);
        let analyses = AnalysisEngine::new(AnalysisConfig::default())
            .run(&datasets.hospital, &fused)
            .results;

        let mut fingerprints = BTreeMap::new();
        fingerprints.insert("hospital_data.csv".to_string(), "ab".repeat(32));
        let mut initial_quality = DataQualityReport::new();
        initial_quality.record(&datasets.hospital);
        let mut accumulator = ResultsAccumulator::new(RunMetadata::new(42, fingerprints, &fused));
        accumulator.record_cleaning(BTreeMap::new(), initial_quality);
        accumulator.record_step("cleaning");
        accumulator.record_step("analysis");
        accumulator.finish(&datasets, &fused, analyses)
    }

    #[test]
    fn test_final_report_covers_every_processed_dataset() {
        let (results, processing) = finished();

        let names: Vec<&str> = results.data_quality.datasets.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["analysis", "hospital", "pubmed", "statistics"]);
        assert_eq!(results.data_quality.standardization_excluded["surgery_count"], 1);
        assert_eq!(results.data_quality.join_mismatches, 0);
        assert_eq!(results.statistical_summary.datasets.len(), 4);
        assert_eq!(results.metadata.processing_steps, vec!["cleaning", "analysis"]);
        assert_eq!(results.metadata.run_key.len(), 64);
        assert_eq!(processing.metadata, results.metadata);
    }

    #[test]
    fn test_initial_quality_is_persisted_apart_from_final() {
        let (results, processing) = finished();

        let initial: Vec<&str> = processing.initial_quality.datasets.keys().map(String::as_str).collect();
        assert_eq!(initial, vec!["hospital"]);
        assert_eq!(processing.data_quality, results.data_quality);

        let json = serde_json::to_string(&processing).unwrap();
        let back: ProcessingMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back.initial_quality, processing.initial_quality);
    }

    #[test]
    fn test_results_json_round_trips() {
        let (results, _) = finished();
        let json = serde_json::to_string_pretty(&results).unwrap();
        assert!(!json.contains("NaN"));
        let back: PipelineResults = serde_json::from_str(&json).unwrap();
        assert_eq!(back, results);
    }

    #[test]
    fn test_persist_writes_both_documents() {
        let (results, processing) = finished();
        let output = MockResultsOutput::default();
        let written = output.results.clone();
        let metadata = output.metadata.clone();

        ResultsUseCase::new(Box::new(output)).persist(&results, &processing).unwrap();
        assert_eq!(written.lock().unwrap().len(), 1);
        assert_eq!(metadata.lock().unwrap().len(), 1);
    }
}
