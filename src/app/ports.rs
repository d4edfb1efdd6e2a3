use anyhow::Result;

use crate::analysis::charts::ChartSpec;
use crate::app::results_use_case::{PipelineResults, ProcessingMetadata};
use crate::diagnostics::Diagnostics;
use crate::domain::{FusedRecord, HospitalRecord, Publication, StatisticsRecord};
use crate::pipeline::ingestion::RawSources;

/// The three canonical datasets produced by cleaning
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalDatasets {
    pub publications: Vec<Publication>,
    pub hospital: Vec<HospitalRecord>,
    pub statistics: Vec<StatisticsRecord>,
}

// Input side
pub trait RawSourcePort {
    /// Load every raw source. A missing or unreadable input is an error.
    fn load(&self) -> Result<(RawSources, Diagnostics)>;

    /// Human-readable description of where inputs come from
    fn describe(&self) -> String;
}

pub trait DatasetSourcePort {
    fn read_canonical(&self) -> Result<CanonicalDatasets>;
    fn read_fused(&self) -> Result<Vec<FusedRecord>>;
}

pub trait ResultsSourcePort {
    fn read_results(&self) -> Result<PipelineResults>;
}

// Output side
pub trait DatasetOutputPort {
    fn write_canonical(&self, datasets: &CanonicalDatasets) -> Result<()>;
    fn write_fused(&self, rows: &[FusedRecord]) -> Result<()>;
}

pub trait ResultsOutputPort {
    fn write_results(&self, results: &PipelineResults) -> Result<()>;
    fn write_metadata(&self, metadata: &ProcessingMetadata) -> Result<()>;
}

pub trait FigureOutputPort {
    fn write_chart(&self, chart: &ChartSpec) -> Result<()>;
}
