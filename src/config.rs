use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::fusion::{JoinStrategy, PublicationJoin};

/// Environment variable naming an alternative config file
pub const CONFIG_ENV_VAR: &str = "MEDSTAT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub fusion: FusionConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the raw source files
    pub input_dir: PathBuf,
    /// Directory receiving canonical datasets, results and figures
    pub output_dir: PathBuf,
    /// Read the combined JSON summary instead of the per-source CSV files
    pub use_combined_json: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/raw_data"),
            output_dir: PathBuf::from("data/processed_data"),
            use_combined_json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub join_strategy: JoinStrategy,
    pub publication_join: PublicationJoin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub seed: u64,
    pub n_clusters: usize,
    pub kmeans_restarts: usize,
    pub kmeans_max_iter: usize,
    pub seasonal_period: usize,
    pub figure_extension: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            seed: constants::DEFAULT_SEED,
            n_clusters: 3,
            kmeans_restarts: 10,
            kmeans_max_iter: 300,
            seasonal_period: 12,
            figure_extension: constants::FIGURE_EXTENSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            file_prefix: "medstat.log".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, the `MEDSTAT_CONFIG` variable or
    /// `config.toml`. A missing default file yields the built-in defaults; a
    /// missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Self::from_file(Path::new(&path));
            }
        }
        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.analysis.n_clusters == 0 {
            return Err(PipelineError::Config("analysis.n_clusters must be at least 1".into()));
        }
        if self.analysis.seasonal_period < 2 {
            return Err(PipelineError::Config("analysis.seasonal_period must be at least 2".into()));
        }
        if self.analysis.kmeans_restarts == 0 || self.analysis.kmeans_max_iter == 0 {
            return Err(PipelineError::Config(
                "analysis.kmeans_restarts and analysis.kmeans_max_iter must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::from_toml_str("[analysis]\nseed = 7\n").unwrap();
        assert_eq!(config.analysis.seed, 7);
        assert_eq!(config.analysis.n_clusters, 3);
        assert_eq!(config.analysis.seasonal_period, 12);
        assert_eq!(config.fusion.join_strategy, JoinStrategy::Auto);
        assert_eq!(config.paths.output_dir, PathBuf::from("data/processed_data"));
    }

    #[test]
    fn test_parses_fusion_section() {
        let config = Config::from_toml_str(
            "[fusion]\njoin_strategy = \"positional\"\npublication_join = \"calendar_year\"\n",
        )
        .unwrap();
        assert_eq!(config.fusion.join_strategy, JoinStrategy::Positional);
        assert_eq!(config.fusion.publication_join, PublicationJoin::CalendarYear);
    }

    #[test]
    fn test_rejects_zero_clusters() {
        let err = Config::from_toml_str("[analysis]\nn_clusters = 0\n").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
