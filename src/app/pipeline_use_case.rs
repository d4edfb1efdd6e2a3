//! End-to-end orchestration: Cleaning → Fusion → Analysis → Results.
//!
//! Stages run strictly in order and each completes before the next starts. A
//! stage error aborts the run; nothing downstream of the failing stage is
//! written.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, info_span, warn};

use crate::analysis::charts::{ChartFilter, ChartSpec};
use crate::analysis::{self, Outcome};
use crate::app::analysis_use_case::AnalysisUseCase;
use crate::app::cleaning_use_case::{CleaningOutcome, CleaningUseCase};
use crate::app::fusion_use_case::FusionUseCase;
use crate::app::ports::{DatasetSourcePort, FigureOutputPort, ResultsSourcePort};
use crate::app::results_use_case::{PipelineResults, ResultsAccumulator, ResultsUseCase, RunMetadata};
use crate::config::Config;
use crate::constants;
use crate::domain::{CanonicalRow, FusedRecord, HospitalRecord, Publication, StatisticsRecord};
use crate::fingerprint::fingerprint_bytes;
use crate::infra::{CsvDatasetAdapter, FigureFileAdapter, FileRawSourceAdapter, JsonResultsAdapter, RawSourceLayout};
use crate::metrics;
use crate::pipeline::processing::fusion::FusedDataset;

pub struct PipelineUseCase {
    config: Config,
}

impl PipelineUseCase {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn output_dir(&self) -> &Path {
        &self.config.paths.output_dir
    }

    fn figures_dir(&self) -> PathBuf {
        self.output_dir().join(constants::FIGURES_DIR)
    }

    fn cleaning(&self) -> CleaningUseCase {
        let layout = if self.config.paths.use_combined_json {
            RawSourceLayout::CombinedJson
        } else {
            RawSourceLayout::CsvFiles
        };
        CleaningUseCase::new(
            Box::new(FileRawSourceAdapter::new(&self.config.paths.input_dir, layout)),
            Box::new(CsvDatasetAdapter::new(self.output_dir())),
        )
    }

    /// Cleaning stage only: writes the three canonical datasets
    pub fn clean(&self) -> Result<CleaningOutcome> {
        let span = info_span!("pipeline", command = "clean");
        let _enter = span.enter();
        self.cleaning().run()
    }

    /// Full run from raw inputs to persisted results
    pub fn run(&self) -> Result<PipelineResults> {
        let span = info_span!("pipeline", command = "run", seed = self.config.analysis.seed);
        let _enter = span.enter();

        let cleaned = self.cleaning().run()?;

        let fusion = FusionUseCase::new(
            self.config.fusion.clone(),
            Box::new(CsvDatasetAdapter::new(self.output_dir())),
        )
        .run(&cleaned.datasets)?;

        let analysis = AnalysisUseCase::new(
            self.config.analysis.clone(),
            Box::new(FigureFileAdapter::new(self.figures_dir())),
        )
        .run(&cleaned.datasets.hospital, &fusion.dataset)?;

        let mut accumulator = ResultsAccumulator::new(RunMetadata::new(
            self.config.analysis.seed,
            cleaned.fingerprints,
            &fusion.dataset,
        ));
        accumulator.record_cleaning(cleaned.stats, cleaned.quality);
        accumulator.record_diagnostics(cleaned.diagnostics);
        accumulator.record_step("cleaning");
        accumulator.record_diagnostics(fusion.diagnostics);
        accumulator.record_step("fusion");
        accumulator.record_diagnostics(analysis.diagnostics);
        accumulator.record_step("analysis");
        accumulator.record_step("results");

        let (results, processing) = accumulator.finish(&cleaned.datasets, &fusion.dataset, analysis.results);
        ResultsUseCase::new(Box::new(JsonResultsAdapter::new(self.output_dir()))).persist(&results, &processing)?;
        self.write_metrics_snapshot();

        info!(run_key = %results.metadata.run_key, "Pipeline run complete");
        Ok(results)
    }

    /// Analysis and results over previously written processed datasets
    pub fn analyze(&self) -> Result<PipelineResults> {
        let span = info_span!("pipeline", command = "analyze", seed = self.config.analysis.seed);
        let _enter = span.enter();

        let store = CsvDatasetAdapter::new(self.output_dir());
        let datasets = store
            .read_canonical()
            .context("analysis needs the processed datasets; run `clean` or `run` first")?;
        let fused = FusedDataset::restore(store.read_fused()?);
        let fingerprints = processed_fingerprints(self.output_dir())?;

        let analysis = AnalysisUseCase::new(
            self.config.analysis.clone(),
            Box::new(FigureFileAdapter::new(self.figures_dir())),
        )
        .run(&datasets.hospital, &fused)?;

        let mut accumulator =
            ResultsAccumulator::new(RunMetadata::new(self.config.analysis.seed, fingerprints, &fused));
        accumulator.record_diagnostics(analysis.diagnostics);
        accumulator.record_step("analysis");
        accumulator.record_step("results");

        let (results, processing) = accumulator.finish(&datasets, &fused, analysis.results);
        ResultsUseCase::new(Box::new(JsonResultsAdapter::new(self.output_dir()))).persist(&results, &processing)?;
        self.write_metrics_snapshot();
        Ok(results)
    }

    /// Rebuild chart instructions for a location/date selection from the
    /// persisted datasets and results
    pub fn chart(&self, filter: &ChartFilter) -> Result<Vec<ChartSpec>> {
        let span = info_span!("pipeline", command = "chart");
        let _enter = span.enter();

        let store = CsvDatasetAdapter::new(self.output_dir());
        let hospital = store.read_canonical()?.hospital;
        let fused = FusedDataset::restore(store.read_fused()?);
        let results = JsonResultsAdapter::new(self.output_dir()).read_results()?;

        let clustering = match &results.analyses.clustering.outcome {
            Outcome::Complete(result) if result.labels.len() == fused.len() => Some(result),
            Outcome::Complete(_) => {
                warn!("Clustering result does not match the processed dataset; scatter chart left empty");
                None
            }
            _ => None,
        };

        let charts = analysis::build_charts(&hospital, &fused, clustering, filter, &self.config.analysis);
        let figures = FigureFileAdapter::new(self.figures_dir());
        for chart in &charts {
            figures.write_chart(chart)?;
        }
        info!(charts = charts.len(), "Chart instructions written");
        Ok(charts)
    }

    fn write_metrics_snapshot(&self) {
        let path = self.output_dir().join(constants::METRICS_FILE);
        match metrics::write_snapshot(&path) {
            Ok(true) => info!(path = %path.display(), "Wrote metrics snapshot"),
            Ok(false) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to write metrics snapshot"),
        }
    }
}

/// Fingerprints of the processed datasets an `analyze` run reads
fn processed_fingerprints(output_dir: &Path) -> Result<BTreeMap<String, String>> {
    let names = [
        constants::processed_file_name(Publication::dataset()),
        constants::processed_file_name(HospitalRecord::dataset()),
        constants::processed_file_name(StatisticsRecord::dataset()),
        constants::processed_file_name(FusedRecord::dataset()),
    ];
    names
        .into_iter()
        .map(|name| {
            let bytes = fs::read(output_dir.join(&name)).with_context(|| format!("failed to read {}", name))?;
            Ok((name, fingerprint_bytes(&bytes)))
        })
        .collect()
}
