use std::path::PathBuf;

use anyhow::Result;

use crate::app::ports::RawSourcePort;
use crate::diagnostics::Diagnostics;
use crate::pipeline::ingestion::{load_combined_sources, load_csv_sources, RawSources};

/// Where raw inputs are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSourceLayout {
    /// `pubmed_data.csv`, `hospital_data.csv`, `medical_statistics.csv`
    CsvFiles,
    /// `combined_data.json`
    CombinedJson,
}

/// File-based implementation of RawSourcePort
pub struct FileRawSourceAdapter {
    input_dir: PathBuf,
    layout: RawSourceLayout,
}

impl FileRawSourceAdapter {
    pub fn new(input_dir: impl Into<PathBuf>, layout: RawSourceLayout) -> Self {
        Self {
            input_dir: input_dir.into(),
            layout,
        }
    }
}

impl RawSourcePort for FileRawSourceAdapter {
    fn load(&self) -> Result<(RawSources, Diagnostics)> {
        let loaded = match self.layout {
            RawSourceLayout::CsvFiles => load_csv_sources(&self.input_dir)?,
            RawSourceLayout::CombinedJson => load_combined_sources(&self.input_dir)?,
        };
        Ok(loaded)
    }

    fn describe(&self) -> String {
        match self.layout {
            RawSourceLayout::CsvFiles => format!("CSV files in {}", self.input_dir.display()),
            RawSourceLayout::CombinedJson => format!("combined JSON in {}", self.input_dir.display()),
        }
    }
}
