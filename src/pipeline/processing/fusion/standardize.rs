//! Zero-mean, unit-variance scaling with stored, invertible fit parameters.

use serde::{Deserialize, Serialize};

/// How missing values are treated before a numeric step.
///
/// Standardization excludes them from the fit and leaves them missing;
/// correlation and clustering substitute zero. The two never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    ExcludeMissing,
    SubstituteZero,
}

impl MissingValuePolicy {
    pub const STANDARDIZATION: MissingValuePolicy = MissingValuePolicy::ExcludeMissing;
    pub const CORRELATION: MissingValuePolicy = MissingValuePolicy::SubstituteZero;
    pub const CLUSTERING: MissingValuePolicy = MissingValuePolicy::SubstituteZero;

    pub fn apply(self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        match self {
            MissingValuePolicy::ExcludeMissing => values.to_vec(),
            MissingValuePolicy::SubstituteZero => values.iter().map(|v| Some(v.unwrap_or(0.0))).collect(),
        }
    }

    /// Values as a dense column; only meaningful for `SubstituteZero`
    pub fn dense(self, values: &[Option<f64>]) -> Vec<f64> {
        self.apply(values).into_iter().flatten().collect()
    }
}

/// Fit parameters for one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnScaler {
    pub field: String,
    pub mean: f64,
    /// Population standard deviation, or 1 for a constant column
    pub scale: f64,
    pub fitted: usize,
    pub excluded: usize,
}

impl ColumnScaler {
    pub fn fit(field: &str, values: &[Option<f64>], policy: MissingValuePolicy) -> Self {
        let present: Vec<f64> = policy.apply(values).into_iter().flatten().collect();
        let excluded = values.len() - present.len();

        let (mean, scale) = if present.is_empty() {
            (0.0, 1.0)
        } else {
            let n = present.len() as f64;
            let mean = present.iter().sum::<f64>() / n;
            let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            (mean, if std > f64::EPSILON * mean.abs().max(1.0) { std } else { 1.0 })
        };

        Self {
            field: field.to_string(),
            mean,
            scale,
            fitted: present.len(),
            excluded,
        }
    }

    pub fn transform(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }

    pub fn inverse(&self, value: f64) -> f64 {
        value * self.scale + self.mean
    }

    pub fn transform_column(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        values.iter().map(|v| v.map(|x| self.transform(x))).collect()
    }
}

/// Fit parameters for a set of columns, fitted once and stored with the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardizationParams {
    pub policy: MissingValuePolicy,
    pub columns: Vec<ColumnScaler>,
}

impl StandardizationParams {
    pub fn fit<'a>(
        columns: impl IntoIterator<Item = (&'a str, &'a [Option<f64>])>,
        policy: MissingValuePolicy,
    ) -> Self {
        Self {
            policy,
            columns: columns
                .into_iter()
                .map(|(field, values)| ColumnScaler::fit(field, values, policy))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&ColumnScaler> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn total_excluded(&self) -> usize {
        self.columns.iter().map(|c| c.excluded).sum()
    }
}
