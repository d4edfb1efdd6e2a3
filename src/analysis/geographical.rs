//! Geographical analysis: per-location surgery statistics and a one-way
//! ANOVA of surgery counts across locations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::stats::{self, finite};
use crate::analysis::Outcome;
use crate::domain::FusedRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionalStats {
    pub location: String,
    /// Rows with a surgery count
    pub count: usize,
    pub surgery_count_mean: Option<f64>,
    /// Sample standard deviation; `None` below two rows
    pub surgery_count_std: Option<f64>,
    pub mean_value_mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnovaResult {
    pub groups: usize,
    pub df_between: usize,
    pub df_within: usize,
    /// `None` when there is no within-group variation
    pub f_statistic: Option<f64>,
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographicalResult {
    pub regions: Vec<RegionalStats>,
    pub anova: Outcome<AnovaResult>,
}

/// Surgery counts grouped by location, in location order. Rows without a
/// location join no group.
pub fn counts_by_location(rows: &[FusedRecord]) -> BTreeMap<String, Vec<f64>> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for row in rows {
        let Some(location) = &row.location else {
            continue;
        };
        let group = groups.entry(location.clone()).or_default();
        if let Some(count) = row.surgery_count_f64() {
            group.push(count);
        }
    }
    groups
}

pub fn analyze(rows: &[FusedRecord]) -> Outcome<GeographicalResult> {
    let groups = counts_by_location(rows);
    if groups.is_empty() {
        return Outcome::insufficient("no fused rows with a location", 1, 0);
    }

    let mut mean_values: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        if let (Some(location), Some(v)) = (row.location.as_deref(), row.mean_value) {
            mean_values.entry(location).or_default().push(v);
        }
    }

    let regions = groups
        .iter()
        .map(|(location, counts)| RegionalStats {
            location: location.clone(),
            count: counts.len(),
            surgery_count_mean: stats::mean(counts).and_then(finite),
            surgery_count_std: stats::std_dev(counts, 1).and_then(finite),
            mean_value_mean: mean_values
                .get(location.as_str())
                .and_then(|v| stats::mean(v))
                .and_then(finite),
        })
        .collect();

    let populated: Vec<Vec<f64>> = groups.into_values().filter(|g| !g.is_empty()).collect();
    let anova = match stats::one_way_anova(&populated) {
        Some(result) => Outcome::Complete(AnovaResult {
            groups: populated.len(),
            df_between: result.df_between,
            df_within: result.df_within,
            f_statistic: result.f_statistic.and_then(finite),
            p_value: result.p_value.and_then(finite),
        }),
        None => Outcome::insufficient("ANOVA needs at least two locations with surgery counts", 2, populated.len()),
    };

    Outcome::Complete(GeographicalResult { regions, anova })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fused(location: &str, count: Option<u64>, mean_value: Option<f64>) -> FusedRecord {
        FusedRecord {
            hospital_name: Some("H".to_string()),
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            location: (!location.is_empty()).then(|| location.to_string()),
            surgery_count: count,
            statistics_source: None,
            mean_value,
            publication_count: None,
            surgery_rate: None,
            surgery_count_std: None,
            mean_value_std: None,
            publication_count_std: None,
        }
    }

    #[test]
    fn test_rows_without_location_join_no_region() {
        let rows = vec![fused("A", Some(3), None), fused("", Some(40), Some(2.0))];
        let groups = counts_by_location(&rows);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups["A"], vec![3.0]);

        let Outcome::Complete(result) = analyze(&rows) else {
            panic!("expected complete result");
        };
        assert_eq!(result.regions.len(), 1);
        assert_eq!(result.regions[0].mean_value_mean, None);
    }

    #[test]
    fn test_two_locations_give_defined_anova() {
        let mut rows: Vec<FusedRecord> = [10, 12, 11, 14, 9, 13]
            .iter()
            .map(|&c| fused("A", Some(c), Some(5.0)))
            .collect();
        rows.extend([20, 22, 19, 25].iter().map(|&c| fused("B", Some(c), None)));

        let Outcome::Complete(result) = analyze(&rows) else {
            panic!("expected complete result");
        };
        assert_eq!(result.regions.len(), 2);
        assert_eq!(result.regions[0].location, "A");
        assert_eq!(result.regions[0].count, 6);
        assert!((result.regions[0].surgery_count_mean.unwrap() - 11.5).abs() < 1e-12);
        assert!((result.regions[0].surgery_count_std.unwrap() - 3.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(result.regions[0].mean_value_mean, Some(5.0));
        assert_eq!(result.regions[1].mean_value_mean, None);

        let Outcome::Complete(anova) = result.anova else {
            panic!("expected a defined ANOVA");
        };
        assert_eq!(anova.groups, 2);
        assert_eq!(anova.df_within, 8);
        assert!(anova.f_statistic.unwrap() > 10.0);
        assert!(anova.p_value.unwrap() < 0.01);
    }

    #[test]
    fn test_single_location_anova_is_insufficient() {
        let rows = vec![fused("A", Some(1), None), fused("A", Some(2), None)];
        let Outcome::Complete(result) = analyze(&rows) else {
            panic!("expected complete result");
        };
        assert_eq!(result.regions.len(), 1);
        match result.anova {
            Outcome::InsufficientData { required, available, .. } => {
                assert_eq!(required, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_location_without_counts_is_reported_but_not_tested() {
        let rows = vec![
            fused("A", Some(1), None),
            fused("A", Some(3), None),
            fused("B", None, Some(2.0)),
        ];
        let Outcome::Complete(result) = analyze(&rows) else {
            panic!("expected complete result");
        };
        assert_eq!(result.regions.len(), 2);
        assert_eq!(result.regions[1].count, 0);
        assert_eq!(result.regions[1].surgery_count_mean, None);
        assert!(matches!(result.anova, Outcome::InsufficientData { .. }));
    }
}
