use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage that owns a failure or a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Cleaning,
    Fusion,
    Analysis,
    Results,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Cleaning => "cleaning",
            Stage::Fusion => "fusion",
            Stage::Analysis => "analysis",
            Stage::Results => "results",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{stage} stage: source unavailable '{}': {source}", path.display())]
    SourceUnavailable {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage: malformed source '{}': {message}", path.display())]
    MalformedSource {
        stage: Stage,
        path: PathBuf,
        message: String,
    },

    #[error("{stage} stage: failed to write '{}': {message}", path.display())]
    Output {
        stage: Stage,
        path: PathBuf,
        message: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Stage the error belongs to, when it carries one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::SourceUnavailable { stage, .. }
            | PipelineError::MalformedSource { stage, .. }
            | PipelineError::Output { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
