use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::info;

use crate::app::ports::{CanonicalDatasets, DatasetOutputPort, RawSourcePort};
use crate::diagnostics::Diagnostics;
use crate::pipeline::ingestion::SourceKind;
use crate::pipeline::processing::normalize::{
    Cleaner, CleaningStats, HospitalCleaner, PublicationCleaner, StatisticsCleaner,
};
use crate::pipeline::processing::quality_gate::DataQualityReport;

/// Everything the cleaning stage hands to the rest of the run
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    pub datasets: CanonicalDatasets,
    pub stats: BTreeMap<String, CleaningStats>,
    /// Initial quality entry per canonical dataset
    pub quality: DataQualityReport,
    pub diagnostics: Diagnostics,
    pub fingerprints: BTreeMap<String, String>,
}

/// Use case for turning raw sources into the three canonical datasets
pub struct CleaningUseCase {
    source: Box<dyn RawSourcePort>,
    output: Box<dyn DatasetOutputPort>,
}

impl CleaningUseCase {
    pub fn new(source: Box<dyn RawSourcePort>, output: Box<dyn DatasetOutputPort>) -> Self {
        Self { source, output }
    }

    pub fn run(&self) -> Result<CleaningOutcome> {
        let (raw, mut diagnostics) = self
            .source
            .load()
            .with_context(|| format!("cleaning stage: failed to load raw sources from {}", self.source.describe()))?;

        let publications = PublicationCleaner.clean(raw.records(SourceKind::Publications));
        let hospital = HospitalCleaner.clean(raw.records(SourceKind::Hospitals));
        let statistics = StatisticsCleaner.clean(raw.records(SourceKind::Statistics));

        let mut stats = BTreeMap::new();
        stats.insert(SourceKind::Publications.dataset().to_string(), publications.stats);
        stats.insert(SourceKind::Hospitals.dataset().to_string(), hospital.stats);
        stats.insert(SourceKind::Statistics.dataset().to_string(), statistics.stats);

        diagnostics.extend(publications.diagnostics);
        diagnostics.extend(hospital.diagnostics);
        diagnostics.extend(statistics.diagnostics);

        let datasets = CanonicalDatasets {
            publications: publications.rows,
            hospital: hospital.rows,
            statistics: statistics.rows,
        };

        let mut quality = DataQualityReport::new();
        quality.record(&datasets.publications);
        quality.record(&datasets.hospital);
        quality.record(&datasets.statistics);

        self.output
            .write_canonical(&datasets)
            .context("cleaning stage: failed to write canonical datasets")?;

        info!(
            publications = datasets.publications.len(),
            hospital = datasets.hospital.len(),
            statistics = datasets.statistics.len(),
            diagnostics = diagnostics.len(),
            "Cleaning stage complete"
        );

        Ok(CleaningOutcome {
            datasets,
            stats,
            quality,
            diagnostics,
            fingerprints: raw.fingerprints,
        })
    }
}
