use anyhow::{Context, Result};
use tracing::info;

use crate::analysis::{AnalysisEngine, AnalysisOutput};
use crate::app::ports::FigureOutputPort;
use crate::config::AnalysisConfig;
use crate::domain::HospitalRecord;
use crate::pipeline::processing::fusion::FusedDataset;

/// Use case for running the four analyses and emitting their chart instructions
pub struct AnalysisUseCase {
    engine: AnalysisEngine,
    figures: Box<dyn FigureOutputPort>,
}

impl AnalysisUseCase {
    pub fn new(config: AnalysisConfig, figures: Box<dyn FigureOutputPort>) -> Self {
        Self {
            engine: AnalysisEngine::new(config),
            figures,
        }
    }

    pub fn run(&self, hospital: &[HospitalRecord], fused: &FusedDataset) -> Result<AnalysisOutput> {
        let output = self.engine.run(hospital, fused);

        for chart in &output.charts {
            self.figures
                .write_chart(chart)
                .with_context(|| format!("analysis stage: failed to write chart {}", chart.figure))?;
        }

        info!(charts = output.charts.len(), "Analysis stage complete");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::charts::ChartSpec;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockFigureOutput {
        figures: Arc<Mutex<Vec<String>>>,
    }

    impl FigureOutputPort for MockFigureOutput {
        fn write_chart(&self, chart: &ChartSpec) -> Result<()> {
            self.figures.lock().unwrap().push(chart.figure.clone());
            Ok(())
        }
    }

    #[test]
    fn test_every_analysis_emits_a_chart_even_without_data() {
        let output = MockFigureOutput::default();
        let figures = output.figures.clone();
        let use_case = AnalysisUseCase::new(AnalysisConfig::default(), Box::new(output));

        let result = use_case.run(&[], &FusedDataset::restore(Vec::new())).unwrap();
        assert!(!result.results.geographical.outcome.is_complete());
        assert_eq!(
            *figures.lock().unwrap(),
            vec![
                "temporal_analysis.png",
                "geographical_analysis.png",
                "correlation_analysis.png",
                "clustering_analysis.png",
            ]
        );
    }
}
