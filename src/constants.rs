/// File name and dataset name constants shared between the pipeline, the CLI
/// and the presentation layer that reads the outputs.

// Raw inputs (written by the acquisition collaborator)
pub const PUBMED_RAW_FILE: &str = "pubmed_data.csv";
pub const HOSPITAL_RAW_FILE: &str = "hospital_data.csv";
pub const STATISTICS_RAW_FILE: &str = "medical_statistics.csv";
pub const COMBINED_RAW_FILE: &str = "combined_data.json";

// Dataset names, used as keys in the quality report and summary
pub const PUBMED_DATASET: &str = "pubmed";
pub const HOSPITAL_DATASET: &str = "hospital";
pub const STATISTICS_DATASET: &str = "statistics";
pub const ANALYSIS_DATASET: &str = "analysis";

// Structured outputs
pub const RESULTS_FILE: &str = "analysis_results.json";
pub const METADATA_FILE: &str = "processing_metadata.json";
pub const METRICS_FILE: &str = "pipeline_metrics.prom";
pub const FIGURES_DIR: &str = "figures";

/// Default figure format produced by the renderer
pub const FIGURE_EXTENSION: &str = "png";

/// Default clustering seed
pub const DEFAULT_SEED: u64 = 42;

/// Canonical CSV file name for a processed dataset: `<dataset>_processed.csv`
pub fn processed_file_name(dataset: &str) -> String {
    format!("{}_processed.csv", dataset)
}

/// Figure artifact name for an analysis kind: `<kind>_analysis.<ext>`
pub fn figure_file_name(kind: &str, extension: &str) -> String {
    format!("{}_analysis.{}", kind, extension)
}

/// All processed dataset names in output order
pub fn processed_datasets() -> Vec<&'static str> {
    vec![PUBMED_DATASET, HOSPITAL_DATASET, STATISTICS_DATASET, ANALYSIS_DATASET]
}
