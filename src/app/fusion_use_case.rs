use anyhow::{Context, Result};
use tracing::info;

use crate::app::ports::{CanonicalDatasets, DatasetOutputPort};
use crate::config::FusionConfig;
use crate::pipeline::processing::fusion::{fuse, FusionOutput};

/// Use case for building and persisting the fused analysis dataset
pub struct FusionUseCase {
    config: FusionConfig,
    output: Box<dyn DatasetOutputPort>,
}

impl FusionUseCase {
    pub fn new(config: FusionConfig, output: Box<dyn DatasetOutputPort>) -> Self {
        Self { config, output }
    }

    pub fn run(&self, datasets: &CanonicalDatasets) -> Result<FusionOutput> {
        let output = fuse(
            &datasets.hospital,
            &datasets.statistics,
            &datasets.publications,
            &self.config,
        );

        self.output
            .write_fused(output.dataset.rows())
            .context("fusion stage: failed to write the analysis dataset")?;

        info!(
            rows = output.dataset.len(),
            diagnostics = output.diagnostics.len(),
            "Fusion stage complete"
        );
        Ok(output)
    }
}
