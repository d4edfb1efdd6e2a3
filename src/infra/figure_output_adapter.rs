use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::analysis::charts::ChartSpec;
use crate::app::ports::FigureOutputPort;
use crate::error::{PipelineError, Stage};

/// Writes chart instructions as `figures/<kind>_analysis.json`
pub struct FigureFileAdapter {
    figures_dir: PathBuf,
}

impl FigureFileAdapter {
    pub fn new(figures_dir: impl Into<PathBuf>) -> Self {
        Self {
            figures_dir: figures_dir.into(),
        }
    }
}

impl FigureOutputPort for FigureFileAdapter {
    fn write_chart(&self, chart: &ChartSpec) -> Result<()> {
        let path = self.figures_dir.join(chart.instruction_file());
        let json = serde_json::to_string_pretty(chart)?;
        fs::create_dir_all(&self.figures_dir)
            .and_then(|_| fs::write(&path, json))
            .map_err(|e| PipelineError::Output {
                stage: Stage::Analysis,
                path: path.clone(),
                message: e.to_string(),
            })?;
        debug!(path = %path.display(), figure = %chart.figure, "Wrote chart instruction");
        Ok(())
    }
}
