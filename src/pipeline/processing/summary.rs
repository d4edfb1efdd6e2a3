//! Statistical summary of processed datasets: describe-style numeric
//! statistics plus missing and unique value counts per column.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::analysis::stats::{self, finite};
use crate::domain::{CanonicalRow, Cell};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub p25: Option<f64>,
    #[serde(rename = "50%")]
    pub p50: Option<f64>,
    #[serde(rename = "75%")]
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnDescription {
    pub fn describe(values: &[f64]) -> Self {
        let sorted = stats::sorted(values);
        let q = |p: f64| stats::quantile_sorted(&sorted, p).and_then(finite);
        Self {
            count: values.len(),
            mean: stats::mean(values).and_then(finite),
            std: stats::std_dev(values, 1).and_then(finite),
            min: sorted.first().copied(),
            p25: q(0.25),
            p50: q(0.5),
            p75: q(0.75),
            max: sorted.last().copied(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Numeric columns only
    pub describe: BTreeMap<String, ColumnDescription>,
    pub missing_values: BTreeMap<String, usize>,
    pub unique_values: BTreeMap<String, usize>,
}

impl DatasetSummary {
    pub fn summarize<T: CanonicalRow>(rows: &[T]) -> Self {
        let schema = T::schema();
        let mut numeric: Vec<Vec<f64>> = vec![Vec::new(); schema.len()];
        let mut missing = vec![0usize; schema.len()];
        let mut unique: Vec<HashSet<String>> = vec![HashSet::new(); schema.len()];

        for row in rows {
            for (i, cell) in row.cells().iter().enumerate().take(schema.len()) {
                match cell {
                    Cell::Missing => missing[i] += 1,
                    other => {
                        unique[i].insert(other.key());
                        if let Some(v) = other.as_f64().filter(|v| v.is_finite()) {
                            numeric[i].push(v);
                        }
                    }
                }
            }
        }

        let mut summary = DatasetSummary::default();
        for (i, column) in schema.iter().enumerate() {
            let name = column.name.to_string();
            if column.kind.is_numeric() {
                summary
                    .describe
                    .insert(name.clone(), ColumnDescription::describe(&numeric[i]));
            }
            summary.missing_values.insert(name.clone(), missing[i]);
            summary.unique_values.insert(name, unique[i].len());
        }
        summary
    }
}

/// Summaries for every processed dataset, keyed by dataset name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticalSummary {
    pub datasets: BTreeMap<String, DatasetSummary>,
}

impl StatisticalSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T: CanonicalRow>(&mut self, rows: &[T]) {
        self.datasets
            .insert(T::dataset().to_string(), DatasetSummary::summarize(rows));
    }
}
