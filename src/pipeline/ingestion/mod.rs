//! Raw record loading: per-source CSV files or the combined JSON summary.
//!
//! Raw records carry no type guarantees. Everything here is a thin,
//! fallible read; typing happens in the cleaning stage.

pub mod combined_json;
pub mod csv_source;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::constants;
use crate::diagnostics::Diagnostics;
use crate::error::{PipelineError, Result, Stage};
use crate::fingerprint::fingerprint_bytes;

/// A raw field value: text, number, or absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Missing,
    Number(f64),
    Text(String),
}

/// One raw record: field name to raw value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub fields: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, RawValue::Text(value.to_string()));
        self
    }

    pub fn insert(&mut self, key: &str, value: RawValue) {
        self.fields.insert(key.to_string(), value);
    }

    /// Field as trimmed text; numbers are rendered, blanks are `None`
    pub fn text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            RawValue::Missing => None,
            RawValue::Number(n) => Some(render_number(*n)),
            RawValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }

    /// First present field among several aliases
    pub fn text_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.text(k))
    }
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// The three raw source types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Publications,
    Hospitals,
    Statistics,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Publications, SourceKind::Hospitals, SourceKind::Statistics];

    pub fn dataset(self) -> &'static str {
        match self {
            SourceKind::Publications => constants::PUBMED_DATASET,
            SourceKind::Hospitals => constants::HOSPITAL_DATASET,
            SourceKind::Statistics => constants::STATISTICS_DATASET,
        }
    }

    pub fn raw_file(self) -> &'static str {
        match self {
            SourceKind::Publications => constants::PUBMED_RAW_FILE,
            SourceKind::Hospitals => constants::HOSPITAL_RAW_FILE,
            SourceKind::Statistics => constants::STATISTICS_RAW_FILE,
        }
    }

    /// Columns a raw file of this kind must carry
    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            SourceKind::Publications => &["title", "date"],
            SourceKind::Hospitals => &["hospital_name", "date", "surgery_count", "location"],
            SourceKind::Statistics => &["data"],
        }
    }

    /// Key under `data_sources` in the combined JSON summary
    pub fn combined_key(self) -> &'static str {
        match self {
            SourceKind::Publications => "pubmed",
            SourceKind::Hospitals => "hospitals",
            SourceKind::Statistics => "statistics",
        }
    }
}

/// All raw records for one run plus the fingerprint of every file read
#[derive(Debug, Clone, Default)]
pub struct RawSources {
    pub publications: Vec<RawRecord>,
    pub hospitals: Vec<RawRecord>,
    pub statistics: Vec<RawRecord>,
    pub fingerprints: BTreeMap<String, String>,
}

impl RawSources {
    pub fn records(&self, kind: SourceKind) -> &[RawRecord] {
        match kind {
            SourceKind::Publications => &self.publications,
            SourceKind::Hospitals => &self.hospitals,
            SourceKind::Statistics => &self.statistics,
        }
    }

    fn records_mut(&mut self, kind: SourceKind) -> &mut Vec<RawRecord> {
        match kind {
            SourceKind::Publications => &mut self.publications,
            SourceKind::Hospitals => &mut self.hospitals,
            SourceKind::Statistics => &mut self.statistics,
        }
    }
}

/// Read a source file fully, mapping any failure to `SourceUnavailable`
pub(crate) fn read_source(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| PipelineError::SourceUnavailable {
        stage: Stage::Cleaning,
        path: path.to_path_buf(),
        source,
    })
}

/// Load the three per-source CSV files from `input_dir`
#[instrument(skip_all, fields(input_dir = %input_dir.display()))]
pub fn load_csv_sources(input_dir: &Path) -> Result<(RawSources, Diagnostics)> {
    let mut sources = RawSources::default();
    let mut diagnostics = Diagnostics::new();

    for kind in SourceKind::ALL {
        let path: PathBuf = input_dir.join(kind.raw_file());
        let bytes = read_source(&path)?;
        sources
            .fingerprints
            .insert(kind.raw_file().to_string(), fingerprint_bytes(&bytes));

        let (records, diags) = csv_source::parse_csv_records(kind, &path, &bytes)?;
        info!(source = kind.dataset(), records = records.len(), "Loaded raw CSV source");
        *sources.records_mut(kind) = records;
        diagnostics.extend(diags);
    }

    Ok((sources, diagnostics))
}

/// Load all three record sets from the combined JSON summary
#[instrument(skip_all, fields(input_dir = %input_dir.display()))]
pub fn load_combined_sources(input_dir: &Path) -> Result<(RawSources, Diagnostics)> {
    let path = input_dir.join(constants::COMBINED_RAW_FILE);
    let bytes = read_source(&path)?;

    let mut sources = combined_json::parse_combined(&path, &bytes)?;
    sources
        .fingerprints
        .insert(constants::COMBINED_RAW_FILE.to_string(), fingerprint_bytes(&bytes));

    info!(
        publications = sources.publications.len(),
        hospitals = sources.hospitals.len(),
        statistics = sources.statistics.len(),
        "Loaded combined JSON summary"
    );
    Ok((sources, Diagnostics::new()))
}
