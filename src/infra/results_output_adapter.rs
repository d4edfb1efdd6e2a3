use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::app::ports::{ResultsOutputPort, ResultsSourcePort};
use crate::app::results_use_case::{PipelineResults, ProcessingMetadata};
use crate::constants;
use crate::error::{PipelineError, Stage};

/// Pretty-printed JSON results next to the processed datasets
pub struct JsonResultsAdapter {
    output_dir: PathBuf,
}

impl JsonResultsAdapter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(constants::RESULTS_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.output_dir.join(constants::METADATA_FILE)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let written = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::write(path, json));
    written.map_err(|e| PipelineError::Output {
        stage: Stage::Results,
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    info!(path = %path.display(), "Wrote JSON output");
    Ok(())
}

impl ResultsOutputPort for JsonResultsAdapter {
    fn write_results(&self, results: &PipelineResults) -> Result<()> {
        write_json(&self.results_path(), results)
    }

    fn write_metadata(&self, metadata: &ProcessingMetadata) -> Result<()> {
        write_json(&self.metadata_path(), metadata)
    }
}

impl ResultsSourcePort for JsonResultsAdapter {
    fn read_results(&self) -> Result<PipelineResults> {
        let path = self.results_path();
        let content = fs::read_to_string(&path).map_err(|source| PipelineError::SourceUnavailable {
            stage: Stage::Results,
            path: path.clone(),
            source,
        })?;
        let results = serde_json::from_str(&content).map_err(|e| PipelineError::MalformedSource {
            stage: Stage::Results,
            path,
            message: e.to_string(),
        })?;
        Ok(results)
    }
}
