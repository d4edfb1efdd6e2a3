use std::path::Path;

use tracing::warn;

use super::{RawRecord, RawValue, SourceKind};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::{PipelineError, Result, Stage};

/// Parse CSV bytes into raw records keyed by the header row.
///
/// A missing required column makes the whole source unusable. A single
/// unreadable record is skipped with a diagnostic.
pub fn parse_csv_records(
    kind: SourceKind,
    path: &Path,
    bytes: &[u8],
) -> Result<(Vec<RawRecord>, Diagnostics)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::MalformedSource {
            stage: Stage::Cleaning,
            path: path.to_path_buf(),
            message: format!("unreadable header row: {}", e),
        })?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    for required in kind.required_columns() {
        if !headers.iter().any(|h| h == required) {
            return Err(PipelineError::MalformedSource {
                stage: Stage::Cleaning,
                path: path.to_path_buf(),
                message: format!("missing required column '{}'", required),
            });
        }
    }

    let mut records = Vec::new();
    let mut diagnostics = Diagnostics::new();

    for (index, result) in reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!(source = kind.dataset(), row = index, error = %e, "Skipping unreadable CSV record");
                diagnostics.push(
                    Stage::Cleaning,
                    kind.dataset(),
                    DiagnosticKind::RowDropped,
                    Some(index),
                    format!("unreadable CSV record: {}", e),
                );
                continue;
            }
        };

        let mut record = RawRecord::new();
        for (i, header) in headers.iter().enumerate() {
            let value = match row.get(i) {
                Some(cell) if !cell.trim().is_empty() => RawValue::Text(cell.to_string()),
                _ => RawValue::Missing,
            };
            record.insert(header, value);
        }
        records.push(record);
    }

    Ok((records, diagnostics))
}
