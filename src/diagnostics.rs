//! Explicit diagnostics channel returned by every stage.
//!
//! Stages still log through `tracing`, but tests and the results file read
//! diagnostics from here rather than from process-wide log output.

use serde::{Deserialize, Serialize};

use crate::error::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Row removed because a required field could not be parsed
    RowDropped,
    /// Optional field could not be parsed; row kept and flagged
    FieldUnparsed,
    /// Row removed as a duplicate of an earlier row
    DuplicateRemoved,
    /// Sources expected to align row-for-row did not
    JoinIntegrity,
    /// An analysis could not meet its minimum-data precondition
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub dataset: String,
    pub kind: DiagnosticKind,
    /// Zero-based position in the stage's input, when the diagnostic is row-local
    pub row: Option<usize>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        stage: Stage,
        dataset: &str,
        kind: DiagnosticKind,
        row: Option<usize>,
        message: impl Into<String>,
    ) {
        self.entries.push(Diagnostic {
            stage,
            dataset: dataset.to_string(),
            kind,
            row,
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn for_dataset<'a>(&'a self, dataset: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.entries.iter().filter(move |d| d.dataset == dataset)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
