//! Canonical row shapes shared across stages.
//!
//! Every dataset has a fixed, typed schema from the start of cleaning. The
//! `CanonicalRow` view gives the quality report and the statistical summary a
//! uniform, column-wise look at any of them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Date,
    Boolean,
    FloatList,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSchema {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> ColumnSchema {
    ColumnSchema { name, kind }
}

/// A single typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Text(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Boolean(bool),
    FloatList(Vec<f64>),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Integer(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Stable textual key used for equality checks (duplicates, unique counts)
    pub fn key(&self) -> String {
        match self {
            Cell::Missing => "\u{0}null".to_string(),
            Cell::Text(s) => format!("t:{}", s),
            Cell::Integer(v) => format!("i:{}", v),
            Cell::Float(v) => format!("f:{:016x}", v.to_bits()),
            Cell::Date(d) => format!("d:{}", d),
            Cell::Boolean(b) => format!("b:{}", b),
            Cell::FloatList(values) => {
                let parts: Vec<String> = values.iter().map(|v| format!("{:016x}", v.to_bits())).collect();
                format!("l:{}", parts.join(","))
            }
        }
    }
}

fn text(value: &Option<String>) -> Cell {
    value.as_ref().map(|s| Cell::Text(s.clone())).unwrap_or(Cell::Missing)
}

/// Counts past `i64::MAX` have no integer cell and read as missing
fn integer(value: Option<u64>) -> Cell {
    value
        .and_then(|v| i64::try_from(v).ok())
        .map(Cell::Integer)
        .unwrap_or(Cell::Missing)
}

fn float(value: Option<f64>) -> Cell {
    value.map(Cell::Float).unwrap_or(Cell::Missing)
}

/// Uniform column-wise view of a canonical row
pub trait CanonicalRow {
    fn dataset() -> &'static str;
    fn schema() -> &'static [ColumnSchema];
    fn cells(&self) -> Vec<Cell>;

    fn column_names() -> Vec<&'static str> {
        Self::schema().iter().map(|c| c.name).collect()
    }
}

/// A cleaned literature citation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    pub authors: Option<String>,
    pub date: NaiveDate,
    pub source: Option<String>,
    pub first_author: Option<String>,
}

static PUBLICATION_SCHEMA: [ColumnSchema; 5] = [
    col("title", ColumnKind::Text),
    col("authors", ColumnKind::Text),
    col("date", ColumnKind::Date),
    col("source", ColumnKind::Text),
    col("first_author", ColumnKind::Text),
];

impl CanonicalRow for Publication {
    fn dataset() -> &'static str {
        constants::PUBMED_DATASET
    }

    fn schema() -> &'static [ColumnSchema] {
        &PUBLICATION_SCHEMA
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.title.clone()),
            text(&self.authors),
            Cell::Date(self.date),
            text(&self.source),
            text(&self.first_author),
        ]
    }
}

/// A cleaned per-hospital surgery count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalRecord {
    /// `None` when the raw name normalizes to nothing
    pub hospital_name: Option<String>,
    pub date: NaiveDate,
    /// `None` when the raw field held no digits; distinct from zero surgeries
    pub surgery_count: Option<u64>,
    pub location: Option<String>,
    pub count_missing: bool,
}

static HOSPITAL_SCHEMA: [ColumnSchema; 5] = [
    col("hospital_name", ColumnKind::Text),
    col("date", ColumnKind::Date),
    col("surgery_count", ColumnKind::Integer),
    col("location", ColumnKind::Text),
    col("count_missing", ColumnKind::Boolean),
];

impl CanonicalRow for HospitalRecord {
    fn dataset() -> &'static str {
        constants::HOSPITAL_DATASET
    }

    fn schema() -> &'static [ColumnSchema] {
        &HOSPITAL_SCHEMA
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            text(&self.hospital_name),
            Cell::Date(self.date),
            integer(self.surgery_count),
            text(&self.location),
            Cell::Boolean(self.count_missing),
        ]
    }
}

/// A processed aggregated-statistics record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRecord {
    pub source: Option<String>,
    /// Normalized hospital name, when the raw record names one (join key)
    pub hospital_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub data: String,
    #[serde(with = "float_list")]
    pub parsed_values: Vec<f64>,
    pub mean_value: Option<f64>,
}

static STATISTICS_SCHEMA: [ColumnSchema; 6] = [
    col("source", ColumnKind::Text),
    col("hospital_name", ColumnKind::Text),
    col("date", ColumnKind::Date),
    col("data", ColumnKind::Text),
    col("parsed_values", ColumnKind::FloatList),
    col("mean_value", ColumnKind::Float),
];

impl CanonicalRow for StatisticsRecord {
    fn dataset() -> &'static str {
        constants::STATISTICS_DATASET
    }

    fn schema() -> &'static [ColumnSchema] {
        &STATISTICS_SCHEMA
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            text(&self.source),
            text(&self.hospital_name),
            self.date.map(Cell::Date).unwrap_or(Cell::Missing),
            Cell::Text(self.data.clone()),
            Cell::FloatList(self.parsed_values.clone()),
            float(self.mean_value),
        ]
    }
}

/// One row of the fused analysis dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedRecord {
    pub hospital_name: Option<String>,
    pub date: NaiveDate,
    pub location: Option<String>,
    pub surgery_count: Option<u64>,
    pub statistics_source: Option<String>,
    pub mean_value: Option<f64>,
    pub publication_count: Option<u64>,
    pub surgery_rate: Option<f64>,
    pub surgery_count_std: Option<f64>,
    pub mean_value_std: Option<f64>,
    pub publication_count_std: Option<f64>,
}

static FUSED_SCHEMA: [ColumnSchema; 11] = [
    col("hospital_name", ColumnKind::Text),
    col("date", ColumnKind::Date),
    col("location", ColumnKind::Text),
    col("surgery_count", ColumnKind::Integer),
    col("statistics_source", ColumnKind::Text),
    col("mean_value", ColumnKind::Float),
    col("publication_count", ColumnKind::Integer),
    col("surgery_rate", ColumnKind::Float),
    col("surgery_count_std", ColumnKind::Float),
    col("mean_value_std", ColumnKind::Float),
    col("publication_count_std", ColumnKind::Float),
];

impl FusedRecord {
    pub fn surgery_count_f64(&self) -> Option<f64> {
        self.surgery_count.map(|c| c as f64)
    }

    pub fn publication_count_f64(&self) -> Option<f64> {
        self.publication_count.map(|c| c as f64)
    }
}

impl CanonicalRow for FusedRecord {
    fn dataset() -> &'static str {
        constants::ANALYSIS_DATASET
    }

    fn schema() -> &'static [ColumnSchema] {
        &FUSED_SCHEMA
    }

    fn cells(&self) -> Vec<Cell> {
        vec![
            text(&self.hospital_name),
            Cell::Date(self.date),
            text(&self.location),
            integer(self.surgery_count),
            text(&self.statistics_source),
            float(self.mean_value),
            integer(self.publication_count),
            float(self.surgery_rate),
            float(self.surgery_count_std),
            float(self.mean_value_std),
            float(self.publication_count_std),
        ]
    }
}

/// The three primary numeric fields shared by fusion and the analyses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryField {
    SurgeryCount,
    MeanValue,
    PublicationCount,
}

impl PrimaryField {
    pub const ALL: [PrimaryField; 3] = [
        PrimaryField::SurgeryCount,
        PrimaryField::MeanValue,
        PrimaryField::PublicationCount,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimaryField::SurgeryCount => "surgery_count",
            PrimaryField::MeanValue => "mean_value",
            PrimaryField::PublicationCount => "publication_count",
        }
    }

    /// Raw (unstandardized) value of this field for a fused row
    pub fn raw(self, row: &FusedRecord) -> Option<f64> {
        match self {
            PrimaryField::SurgeryCount => row.surgery_count_f64(),
            PrimaryField::MeanValue => row.mean_value,
            PrimaryField::PublicationCount => row.publication_count_f64(),
        }
    }
}

/// Serializes a float list as a `;`-separated string so it fits in one CSV cell
pub mod float_list {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let joined = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(";");
        serializer.serialize_str(&joined)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>().map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_matches_cells() {
        let row = HospitalRecord {
            hospital_name: Some("General".to_string()),
            date: NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
            surgery_count: None,
            location: None,
            count_missing: true,
        };
        assert_eq!(row.cells().len(), HospitalRecord::schema().len());
        assert!(row.cells()[2].is_missing());
        assert!(row.cells()[3].is_missing());
        assert_eq!(HospitalRecord::column_names()[0], "hospital_name");
    }

    #[test]
    fn test_integer_cells_never_wrap_negative() {
        assert_eq!(integer(Some(u64::from(u32::MAX))), Cell::Integer(i64::from(u32::MAX)));
        assert!(integer(Some(u64::MAX)).is_missing());
        assert!(integer(None).is_missing());
    }

    #[test]
    fn test_float_cell_keys_distinguish_values() {
        assert_ne!(Cell::Float(0.1).key(), Cell::Float(0.2).key());
        assert_eq!(Cell::Float(1.5).key(), Cell::Float(1.5).key());
        assert_ne!(Cell::Missing.key(), Cell::Text(String::new()).key());
    }
}
