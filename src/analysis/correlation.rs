//! Correlation analysis over the fused dataset.
//!
//! Pairwise tests use the three primary fields with missing values set to
//! zero. The matrix covers every numeric column with pairwise-complete rows.

use serde::{Deserialize, Serialize};

use crate::analysis::stats::{finite, pearson, pearson_p_value};
use crate::analysis::Outcome;
use crate::domain::{FusedRecord, PrimaryField};
use crate::pipeline::processing::fusion::MissingValuePolicy;

/// Minimum rows for a p-value
pub const MIN_ROWS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub x: PrimaryField,
    pub y: PrimaryField,
    pub n: usize,
    /// `None` when undefined (constant input)
    pub r: Option<f64>,
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub policy: MissingValuePolicy,
    pub pairs: Vec<CorrelationPair>,
    pub matrix: CorrelationMatrix,
}

/// Numeric columns of the fused dataset, as named in the processed file
pub fn numeric_columns(rows: &[FusedRecord]) -> Vec<(&'static str, Vec<Option<f64>>)> {
    let mut columns: Vec<(&'static str, Vec<Option<f64>>)> = PrimaryField::ALL
        .iter()
        .map(|f| (f.name(), rows.iter().map(|r| f.raw(r)).collect()))
        .collect();
    columns.push(("surgery_rate", rows.iter().map(|r| r.surgery_rate).collect()));
    columns
}

pub fn analyze(rows: &[FusedRecord]) -> Outcome<CorrelationResult> {
    if rows.len() < MIN_ROWS {
        return Outcome::insufficient("correlation needs at least three fused rows", MIN_ROWS, rows.len());
    }

    let policy = MissingValuePolicy::CORRELATION;
    let dense: Vec<(PrimaryField, Vec<f64>)> = PrimaryField::ALL
        .iter()
        .map(|&f| {
            let column: Vec<Option<f64>> = rows.iter().map(|r| f.raw(r)).collect();
            (f, policy.dense(&column))
        })
        .collect();

    let mut pairs = Vec::new();
    for (x, xs) in &dense {
        for (y, ys) in &dense {
            if x == y {
                continue;
            }
            let r = pearson(xs, ys).and_then(finite);
            pairs.push(CorrelationPair {
                x: *x,
                y: *y,
                n: xs.len(),
                r,
                p_value: r.and_then(|r| pearson_p_value(r, xs.len())).and_then(finite),
            });
        }
    }

    Outcome::Complete(CorrelationResult {
        policy,
        pairs,
        matrix: correlation_matrix(&numeric_columns(rows)),
    })
}

/// Pearson matrix using, for each pair, the rows where both are present
pub fn correlation_matrix(columns: &[(&str, Vec<Option<f64>>)]) -> CorrelationMatrix {
    let values = columns
        .iter()
        .map(|(_, a)| {
            columns
                .iter()
                .map(|(_, b)| {
                    let (xs, ys): (Vec<f64>, Vec<f64>) = a
                        .iter()
                        .zip(b)
                        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                        .unzip();
                    pearson(&xs, &ys).and_then(finite)
                })
                .collect()
        })
        .collect();

    CorrelationMatrix {
        columns: columns.iter().map(|(name, _)| name.to_string()).collect(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fused(count: Option<u64>, mean_value: Option<f64>, pubs: Option<u64>) -> FusedRecord {
        FusedRecord {
            hospital_name: Some("H".to_string()),
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            location: Some("X".to_string()),
            surgery_count: count,
            statistics_source: None,
            mean_value,
            publication_count: pubs,
            surgery_rate: None,
            surgery_count_std: None,
            mean_value_std: None,
            publication_count_std: None,
        }
    }

    #[test]
    fn test_ordered_pairs_without_self_pairs() {
        let rows: Vec<FusedRecord> = (0..10)
            .map(|i| fused(Some(i), Some(2.0 * i as f64 + 1.0), Some(10 - i)))
            .collect();
        let Outcome::Complete(result) = analyze(&rows) else {
            panic!("expected complete result");
        };
        assert_eq!(result.pairs.len(), 6);
        assert!(result.pairs.iter().all(|p| p.x != p.y));

        let pair = result
            .pairs
            .iter()
            .find(|p| p.x == PrimaryField::SurgeryCount && p.y == PrimaryField::MeanValue)
            .unwrap();
        assert!((pair.r.unwrap() - 1.0).abs() < 1e-9);
        assert!(pair.p_value.unwrap() < 1e-9);

        let inverse = result
            .pairs
            .iter()
            .find(|p| p.x == PrimaryField::SurgeryCount && p.y == PrimaryField::PublicationCount)
            .unwrap();
        assert!((inverse.r.unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_values_are_zero_for_pairs_only() {
        let rows = vec![
            fused(Some(1), Some(1.0), None),
            fused(Some(2), None, None),
            fused(Some(3), Some(3.0), None),
            fused(Some(4), Some(4.0), None),
        ];
        let Outcome::Complete(result) = analyze(&rows) else {
            panic!("expected complete result");
        };
        // Publication counts are all missing, hence all zero and constant
        let undefined = result
            .pairs
            .iter()
            .filter(|p| p.x == PrimaryField::PublicationCount || p.y == PrimaryField::PublicationCount);
        assert!(undefined.into_iter().all(|p| p.r.is_none() && p.p_value.is_none()));

        // Pairwise-complete matrix skips the missing mean_value row
        let m = &result.matrix;
        assert_eq!(m.columns[0], "surgery_count");
        assert!((m.values[0][1].unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(m.values[2][2], None);
    }

    #[test]
    fn test_too_few_rows() {
        let rows = vec![fused(Some(1), Some(1.0), Some(1)), fused(Some(2), Some(2.0), Some(2))];
        assert!(matches!(
            analyze(&rows),
            Outcome::InsufficientData { required: 3, available: 2, .. }
        ));
    }
}
