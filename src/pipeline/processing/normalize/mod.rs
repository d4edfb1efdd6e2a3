//! Cleaning stage: raw records → typed canonical rows.
//!
//! Every source type walks `Raw → Parsed → Deduplicated → Canonical`. Each
//! transition is total: a row either advances or is dropped with a recorded
//! reason, so one bad row never aborts a dataset.

pub mod normalizers;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::domain::CanonicalRow;
use crate::error::Stage;
use crate::metrics::CleaningMetrics;
use crate::pipeline::ingestion::RawRecord;
use crate::pipeline::processing::parser::ParseError;

pub use normalizers::{HospitalCleaner, PublicationCleaner, StatisticsCleaner};

/// A parsed row plus notes about optional fields that could not be read
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub row: T,
    pub flags: Vec<String>,
}

impl<T> Parsed<T> {
    pub fn clean(row: T) -> Self {
        Self { row, flags: Vec::new() }
    }
}

/// Per-dataset counts for one cleaning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub input_rows: usize,
    pub dropped_rows: usize,
    pub flagged_rows: usize,
    pub duplicate_rows: usize,
    pub output_rows: usize,
}

/// Canonical rows with the diagnostics produced while cleaning them
#[derive(Debug, Clone)]
pub struct CleanOutput<T> {
    pub rows: Vec<T>,
    pub stats: CleaningStats,
    pub diagnostics: Diagnostics,
}

/// Per-source cleaning rules
pub trait Cleaner {
    type Row: CanonicalRow + Clone;

    /// Raw → Parsed. An error drops the row.
    fn parse_row(&self, record: &RawRecord) -> Result<Parsed<Self::Row>, ParseError>;

    /// Deduplication key; `None` keeps every row (pass-through)
    fn dedup_key(&self, row: &Self::Row) -> Option<String>;

    /// Run the full state machine over a raw dataset
    fn clean(&self, records: &[RawRecord]) -> CleanOutput<Self::Row> {
        let dataset = Self::Row::dataset();
        let span = info_span!("clean", dataset);
        let _enter = span.enter();

        let mut diagnostics = Diagnostics::new();
        let mut stats = CleaningStats {
            input_rows: records.len(),
            ..CleaningStats::default()
        };

        // Raw → Parsed
        let mut parsed = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match self.parse_row(record) {
                Ok(Parsed { row, flags }) => {
                    if !flags.is_empty() {
                        stats.flagged_rows += 1;
                    }
                    for flag in flags {
                        debug!(row = index, "{}", flag);
                        diagnostics.push(Stage::Cleaning, dataset, DiagnosticKind::FieldUnparsed, Some(index), flag);
                    }
                    parsed.push((index, row));
                }
                Err(e) => {
                    debug!(row = index, error = %e, "Dropping row");
                    stats.dropped_rows += 1;
                    diagnostics.push(
                        Stage::Cleaning,
                        dataset,
                        DiagnosticKind::RowDropped,
                        Some(index),
                        e.to_string(),
                    );
                }
            }
        }

        // Parsed → Deduplicated
        let rows = deduplicate(parsed, |row| self.dedup_key(row), |index, key| {
            stats.duplicate_rows += 1;
            diagnostics.push(
                Stage::Cleaning,
                dataset,
                DiagnosticKind::DuplicateRemoved,
                Some(index),
                format!("duplicate of an earlier row with key '{}'", key),
            );
        });

        // Deduplicated → Canonical
        stats.output_rows = rows.len();
        CleaningMetrics::record_dataset(dataset, &stats);
        info!(
            input = stats.input_rows,
            output = stats.output_rows,
            dropped = stats.dropped_rows,
            duplicates = stats.duplicate_rows,
            flagged = stats.flagged_rows,
            "Cleaned dataset"
        );

        CleanOutput {
            rows,
            stats,
            diagnostics,
        }
    }
}

/// Keep the first occurrence of every key, in input order. Rows without a key
/// always pass.
fn deduplicate<T>(
    rows: Vec<(usize, T)>,
    key_of: impl Fn(&T) -> Option<String>,
    mut on_duplicate: impl FnMut(usize, &str),
) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for (index, row) in rows {
        match key_of(&row) {
            Some(key) => {
                if seen.insert(key.clone()) {
                    out.push(row);
                } else {
                    on_duplicate(index, &key);
                }
            }
            None => out.push(row),
        }
    }
    out
}

/// Canonical rows rendered back into raw form, for re-cleaning
pub trait IntoRaw {
    fn to_raw(&self) -> RawRecord;
}
