//! Data quality report: completeness, duplicates and columns per dataset.
//!
//! An initial entry is taken for each canonical dataset right after cleaning.
//! The final report is recomputed over every processed dataset (including the
//! fused one) and carries the fusion-side counts.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::CanonicalRow;

/// Quality metrics for a single dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetQuality {
    pub record_count: usize,
    /// Share of non-missing cells; `None` for an empty dataset
    pub completeness: Option<f64>,
    /// Share of rows identical to an earlier row; `None` for an empty dataset
    pub duplicate_rate: Option<f64>,
    pub columns: Vec<String>,
    pub missing_by_column: BTreeMap<String, usize>,
}

impl DatasetQuality {
    pub fn assess<T: CanonicalRow>(rows: &[T]) -> Self {
        let columns = T::column_names();
        let mut missing_by_column: BTreeMap<String, usize> =
            columns.iter().map(|c| (c.to_string(), 0)).collect();

        let mut seen = HashSet::new();
        let mut duplicates = 0usize;
        let mut missing_cells = 0usize;

        for row in rows {
            let cells = row.cells();
            for (name, cell) in columns.iter().zip(&cells) {
                if cell.is_missing() {
                    missing_cells += 1;
                    *missing_by_column.entry(name.to_string()).or_default() += 1;
                }
            }
            let key: Vec<String> = cells.iter().map(|c| c.key()).collect();
            if !seen.insert(key.join("\u{1f}")) {
                duplicates += 1;
            }
        }

        let total_cells = rows.len() * columns.len();
        let (completeness, duplicate_rate) = if rows.is_empty() {
            (None, None)
        } else {
            (
                Some(1.0 - missing_cells as f64 / total_cells as f64),
                Some(duplicates as f64 / rows.len() as f64),
            )
        };

        Self {
            record_count: rows.len(),
            completeness,
            duplicate_rate,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            missing_by_column,
        }
    }
}

/// Quality metrics for every dataset of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub datasets: BTreeMap<String, DatasetQuality>,
    /// Hospital rows the statistics join could not match one-to-one
    pub join_mismatches: usize,
    /// Missing values left out of the standardization fit, per field
    pub standardization_excluded: BTreeMap<String, usize>,
}

impl DataQualityReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assess a dataset, replacing any earlier entry under the same name
    pub fn record<T: CanonicalRow>(&mut self, rows: &[T]) -> &DatasetQuality {
        let name = T::dataset().to_string();
        self.datasets.insert(name.clone(), DatasetQuality::assess(rows));
        &self.datasets[&name]
    }

    pub fn get(&self, dataset: &str) -> Option<&DatasetQuality> {
        self.datasets.get(dataset)
    }
}
