//! Fusion stage: hospital rows joined with statistics and publication counts.
//!
//! Produces the read-only analysis dataset. Fusion is its only writer; the
//! analysis engine receives it by shared reference.

pub mod standardize;

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use crate::config::FusionConfig;
use crate::constants;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::domain::{FusedRecord, HospitalRecord, PrimaryField, Publication, StatisticsRecord};
use crate::error::Stage;
use crate::metrics::FusionMetrics;

pub use standardize::{ColumnScaler, MissingValuePolicy, StandardizationParams};

/// How hospital rows are matched to statistics rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Keyed when every statistics row names a hospital, positional otherwise
    #[default]
    Auto,
    /// Match on (normalized hospital name, date)
    Keyed,
    /// Row i of hospital data with row i of statistics
    Positional,
}

/// How publication counts are matched to hospital rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationJoin {
    #[default]
    ExactDate,
    CalendarYear,
}

/// What the statistics join actually did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinReport {
    pub requested: JoinStrategy,
    /// Either `Keyed` or `Positional`
    pub applied: JoinStrategy,
    pub publication_join: PublicationJoin,
    pub hospital_rows: usize,
    pub statistics_rows: usize,
    pub matched: usize,
    pub mismatches: usize,
    pub ambiguous_keys: usize,
}

/// The fused analysis dataset. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedDataset {
    rows: Vec<FusedRecord>,
    standardization: StandardizationParams,
    join: Option<JoinReport>,
}

impl FusedDataset {
    /// Rebuild from persisted rows; the standardization fit is recomputed from
    /// the raw columns, which reproduces the stored parameters.
    pub fn restore(rows: Vec<FusedRecord>) -> Self {
        let standardization = fit_primary_fields(&rows);
        Self {
            rows,
            standardization,
            join: None,
        }
    }

    pub fn rows(&self) -> &[FusedRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn standardization(&self) -> &StandardizationParams {
        &self.standardization
    }

    /// `None` when the dataset was restored from disk
    pub fn join_report(&self) -> Option<&JoinReport> {
        self.join.as_ref()
    }

    /// Raw column of a primary field, missing values kept
    pub fn column(&self, field: PrimaryField) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| field.raw(r)).collect()
    }
}

/// Fused dataset plus the diagnostics fusion raised
#[derive(Debug, Clone)]
pub struct FusionOutput {
    pub dataset: FusedDataset,
    pub diagnostics: Diagnostics,
}

/// Join, derive and standardize
pub fn fuse(
    hospital: &[HospitalRecord],
    statistics: &[StatisticsRecord],
    publications: &[Publication],
    config: &FusionConfig,
) -> FusionOutput {
    let span = info_span!("fuse", hospital = hospital.len(), statistics = statistics.len());
    let _enter = span.enter();

    let mut diagnostics = Diagnostics::new();
    let (matches, mut join) = join_statistics(hospital, statistics, config.join_strategy, &mut diagnostics);
    join.publication_join = config.publication_join;
    let counts = PublicationCounts::build(publications, config.publication_join);

    let mut rows: Vec<FusedRecord> = hospital
        .iter()
        .zip(&matches)
        .map(|(h, matched)| {
            let stats = matched.map(|i| &statistics[i]);
            FusedRecord {
                hospital_name: h.hospital_name.clone(),
                date: h.date,
                location: h.location.clone(),
                surgery_count: h.surgery_count,
                statistics_source: stats.and_then(|s| s.source.clone()),
                mean_value: stats.and_then(|s| s.mean_value),
                publication_count: counts.lookup(h.date),
                surgery_rate: None,
                surgery_count_std: None,
                mean_value_std: None,
                publication_count_std: None,
            }
        })
        .collect();

    assign_surgery_rates(&mut rows);

    let standardization = fit_primary_fields(&rows);
    apply_standardization(&mut rows, &standardization);
    for scaler in &standardization.columns {
        if scaler.excluded > 0 {
            FusionMetrics::record_excluded(field_label(&scaler.field), scaler.excluded);
        }
    }

    FusionMetrics::record_rows(rows.len());
    FusionMetrics::record_join_mismatches(join.mismatches);
    info!(
        rows = rows.len(),
        strategy = ?join.applied,
        matched = join.matched,
        mismatches = join.mismatches,
        "Fused analysis dataset"
    );

    FusionOutput {
        dataset: FusedDataset {
            rows,
            standardization,
            join: Some(join),
        },
        diagnostics,
    }
}

fn field_label(field: &str) -> &'static str {
    PrimaryField::ALL
        .iter()
        .map(|f| f.name())
        .find(|name| *name == field)
        .unwrap_or("unknown")
}

/// For each hospital row, the index of its statistics row (if any)
fn join_statistics(
    hospital: &[HospitalRecord],
    statistics: &[StatisticsRecord],
    requested: JoinStrategy,
    diagnostics: &mut Diagnostics,
) -> (Vec<Option<usize>>, JoinReport) {
    let applied = match requested {
        JoinStrategy::Auto => {
            if !statistics.is_empty() && statistics.iter().all(|s| s.hospital_name.is_some()) {
                JoinStrategy::Keyed
            } else {
                JoinStrategy::Positional
            }
        }
        other => other,
    };

    let mut report = JoinReport {
        requested,
        applied,
        publication_join: PublicationJoin::default(),
        hospital_rows: hospital.len(),
        statistics_rows: statistics.len(),
        matched: 0,
        mismatches: 0,
        ambiguous_keys: 0,
    };

    let matches = match applied {
        JoinStrategy::Keyed => keyed_join(hospital, statistics, &mut report, diagnostics),
        _ => positional_join(hospital, statistics, &mut report, diagnostics),
    };
    report.matched = matches.iter().filter(|m| m.is_some()).count();
    (matches, report)
}

fn positional_join(
    hospital: &[HospitalRecord],
    statistics: &[StatisticsRecord],
    report: &mut JoinReport,
    diagnostics: &mut Diagnostics,
) -> Vec<Option<usize>> {
    if hospital.len() != statistics.len() {
        report.mismatches = hospital.len().abs_diff(statistics.len());
        let message = format!(
            "positional alignment over datasets of different length: {} hospital rows, {} statistics rows",
            hospital.len(),
            statistics.len()
        );
        warn!("{}", message);
        diagnostics.push(
            Stage::Fusion,
            constants::ANALYSIS_DATASET,
            DiagnosticKind::JoinIntegrity,
            None,
            message,
        );
    }
    (0..hospital.len())
        .map(|i| (i < statistics.len()).then_some(i))
        .collect()
}

fn keyed_join(
    hospital: &[HospitalRecord],
    statistics: &[StatisticsRecord],
    report: &mut JoinReport,
    diagnostics: &mut Diagnostics,
) -> Vec<Option<usize>> {
    // Undated statistics rows key on the hospital alone and back-fill any dated miss
    let mut index: HashMap<(&str, Option<NaiveDate>), Vec<usize>> = HashMap::new();
    for (i, s) in statistics.iter().enumerate() {
        if let Some(name) = s.hospital_name.as_deref() {
            index.entry((name, s.date)).or_default().push(i);
        }
    }

    let mut ambiguous = 0usize;
    let mut unmatched = 0usize;
    let matches: Vec<Option<usize>> = hospital
        .iter()
        .enumerate()
        .map(|(row, h)| {
            let name = h.hospital_name.as_deref().unwrap_or_default();
            let candidates = h.hospital_name.as_deref().and_then(|name| {
                index
                    .get(&(name, Some(h.date)))
                    .or_else(|| index.get(&(name, None)))
            });
            match candidates {
                Some(found) => {
                    if found.len() > 1 {
                        ambiguous += 1;
                        diagnostics.push(
                            Stage::Fusion,
                            constants::ANALYSIS_DATASET,
                            DiagnosticKind::JoinIntegrity,
                            Some(row),
                            format!(
                                "{} statistics rows share the key ({}, {}); using the first",
                                found.len(),
                                name,
                                h.date
                            ),
                        );
                    }
                    Some(found[0])
                }
                None => {
                    unmatched += 1;
                    diagnostics.push(
                        Stage::Fusion,
                        constants::ANALYSIS_DATASET,
                        DiagnosticKind::JoinIntegrity,
                        Some(row),
                        format!("no statistics row for ({}, {})", name, h.date),
                    );
                    None
                }
            }
        })
        .collect();

    if unmatched + ambiguous > 0 {
        warn!(unmatched, ambiguous, "Keyed statistics join was not one-to-one");
    }
    report.ambiguous_keys = ambiguous;
    report.mismatches = unmatched + ambiguous;
    matches
}

/// Publication counts keyed by exact date or by calendar year
struct PublicationCounts {
    mode: PublicationJoin,
    by_date: BTreeMap<NaiveDate, u64>,
    by_year: BTreeMap<i32, u64>,
}

impl PublicationCounts {
    fn build(publications: &[Publication], mode: PublicationJoin) -> Self {
        let mut by_date = BTreeMap::new();
        let mut by_year = BTreeMap::new();
        for p in publications {
            *by_date.entry(p.date).or_insert(0) += 1;
            *by_year.entry(p.date.year()).or_insert(0) += 1;
        }
        Self { mode, by_date, by_year }
    }

    fn lookup(&self, date: NaiveDate) -> Option<u64> {
        match self.mode {
            PublicationJoin::ExactDate => self.by_date.get(&date).copied(),
            PublicationJoin::CalendarYear => self.by_year.get(&date.year()).copied(),
        }
    }
}

/// `surgery_count / sum(surgery_count)` within each location. A row without a
/// location belongs to no group and gets no rate.
fn assign_surgery_rates(rows: &mut [FusedRecord]) {
    let mut totals: HashMap<String, u64> = HashMap::new();
    for row in rows.iter() {
        if let Some(location) = &row.location {
            let total = totals.entry(location.clone()).or_insert(0);
            *total = total.saturating_add(row.surgery_count.unwrap_or(0));
        }
    }
    for row in rows.iter_mut() {
        let Some(total) = row.location.as_ref().and_then(|l| totals.get(l)).copied() else {
            row.surgery_rate = None;
            continue;
        };
        row.surgery_rate = if total == 0 {
            Some(0.0)
        } else {
            row.surgery_count.map(|c| c as f64 / total as f64)
        };
    }
}

fn fit_primary_fields(rows: &[FusedRecord]) -> StandardizationParams {
    let columns: Vec<(&str, Vec<Option<f64>>)> = PrimaryField::ALL
        .iter()
        .map(|f| (f.name(), rows.iter().map(|r| f.raw(r)).collect()))
        .collect();
    StandardizationParams::fit(
        columns.iter().map(|(name, values)| (*name, values.as_slice())),
        MissingValuePolicy::STANDARDIZATION,
    )
}

fn apply_standardization(rows: &mut [FusedRecord], params: &StandardizationParams) {
    let scaler = |field: PrimaryField| params.get(field.name());
    for row in rows.iter_mut() {
        let std_of = |field: PrimaryField| {
            scaler(field).and_then(|s| field.raw(row).map(|v| s.transform(v)))
        };
        let surgery = std_of(PrimaryField::SurgeryCount);
        let mean = std_of(PrimaryField::MeanValue);
        let publications = std_of(PrimaryField::PublicationCount);
        row.surgery_count_std = surgery;
        row.mean_value_std = mean;
        row.publication_count_std = publications;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hospital(name: &str, d: NaiveDate, count: Option<u64>, location: &str) -> HospitalRecord {
        HospitalRecord {
            hospital_name: (!name.is_empty()).then(|| name.to_string()),
            date: d,
            surgery_count: count,
            location: (!location.is_empty()).then(|| location.to_string()),
            count_missing: count.is_none(),
        }
    }

    fn stat(name: Option<&str>, d: Option<NaiveDate>, mean: Option<f64>) -> StatisticsRecord {
        StatisticsRecord {
            source: Some("registry".to_string()),
            hospital_name: name.map(str::to_string),
            date: d,
            data: String::new(),
            parsed_values: mean.into_iter().collect(),
            mean_value: mean,
        }
    }

    fn publication(d: NaiveDate) -> Publication {
        Publication {
            title: format!("paper {}", d),
            authors: None,
            date: d,
            source: None,
            first_author: None,
        }
    }

    #[test]
    fn test_surgery_rates_sum_to_one_per_location() {
        let d = date(2021, 1, 1);
        let hospital = vec![
            hospital("A", d, Some(10), "Boston"),
            hospital("B", d, Some(30), "Boston"),
            hospital("C", d, Some(5), "Denver"),
            hospital("D", d, Some(0), "Austin"),
            hospital("E", d, Some(0), "Austin"),
        ];
        let out = fuse(&hospital, &[], &[], &FusionConfig::default());
        let rows = out.dataset.rows();

        let mut sums: HashMap<&str, f64> = HashMap::new();
        for r in rows {
            *sums.entry(r.location.as_deref().unwrap()).or_default() += r.surgery_rate.unwrap();
        }
        assert!((sums["Boston"] - 1.0).abs() < 1e-6);
        assert!((sums["Denver"] - 1.0).abs() < 1e-6);
        assert_eq!(rows[3].surgery_rate, Some(0.0));
        assert_eq!(rows[4].surgery_rate, Some(0.0));
        assert!((rows[0].surgery_rate.unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_missing_count_gives_missing_rate() {
        let d = date(2021, 1, 1);
        let hospital = vec![
            hospital("A", d, Some(10), "Boston"),
            hospital("B", d, None, "Boston"),
        ];
        let out = fuse(&hospital, &[], &[], &FusionConfig::default());
        assert_eq!(out.dataset.rows()[0].surgery_rate, Some(1.0));
        assert_eq!(out.dataset.rows()[1].surgery_rate, None);
        assert_eq!(out.dataset.rows()[1].surgery_count_std, None);
        let excluded = out.dataset.standardization().get("surgery_count").unwrap().excluded;
        assert_eq!(excluded, 1);
    }

    #[test]
    fn test_rows_without_location_get_no_rate() {
        let d = date(2021, 1, 1);
        let hospital = vec![
            hospital("A", d, Some(10), "Boston"),
            hospital("B", d, Some(30), ""),
        ];
        let out = fuse(&hospital, &[], &[], &FusionConfig::default());
        let rows = out.dataset.rows();
        assert_eq!(rows[0].surgery_rate, Some(1.0));
        assert_eq!(rows[1].location, None);
        assert_eq!(rows[1].surgery_rate, None);
        assert_eq!(rows[1].surgery_count, Some(30));
    }

    #[test]
    fn test_huge_counts_saturate_instead_of_overflowing() {
        let d = date(2021, 1, 1);
        let hospital = vec![
            hospital("A", d, Some(u64::MAX), "Boston"),
            hospital("B", d, Some(u64::MAX), "Boston"),
            hospital("C", d, Some(u64::from(u32::MAX)), "Denver"),
        ];
        let out = fuse(&hospital, &[], &[], &FusionConfig::default());
        let rows = out.dataset.rows();
        assert_eq!(rows[0].surgery_rate, Some(1.0));
        assert_eq!(rows[1].surgery_rate, Some(1.0));
        assert_eq!(rows[2].surgery_rate, Some(1.0));
    }

    #[test]
    fn test_nameless_hospital_row_is_an_unmatched_key() {
        let d = date(2021, 1, 1);
        let hospital = vec![hospital("A", d, Some(1), "X"), hospital("", d, Some(2), "X")];
        let statistics = vec![stat(Some("A"), Some(d), Some(5.0))];
        let out = fuse(&hospital, &statistics, &[], &FusionConfig::default());
        let join = out.dataset.join_report().unwrap();
        assert_eq!(join.applied, JoinStrategy::Keyed);
        assert_eq!(join.matched, 1);
        assert_eq!(join.mismatches, 1);
        assert_eq!(out.dataset.rows()[1].mean_value, None);
    }

    #[test]
    fn test_keyed_join_matches_on_name_and_date() {
        let hospital = vec![
            hospital("A", date(2021, 1, 1), Some(1), "X"),
            hospital("B", date(2021, 1, 1), Some(2), "X"),
            hospital("C", date(2021, 1, 1), Some(3), "X"),
        ];
        let statistics = vec![
            stat(Some("B"), Some(date(2021, 1, 1)), Some(20.0)),
            stat(Some("A"), Some(date(2021, 1, 1)), Some(10.0)),
            stat(Some("A"), Some(date(2022, 1, 1)), Some(99.0)),
        ];
        let out = fuse(&hospital, &statistics, &[], &FusionConfig::default());
        let rows = out.dataset.rows();
        let report = out.dataset.join_report().unwrap();

        assert_eq!(report.applied, JoinStrategy::Keyed);
        assert_eq!(rows[0].mean_value, Some(10.0));
        assert_eq!(rows[1].mean_value, Some(20.0));
        assert_eq!(rows[2].mean_value, None);
        assert_eq!(report.matched, 2);
        assert_eq!(report.mismatches, 1);
        assert_eq!(out.diagnostics.count(DiagnosticKind::JoinIntegrity), 1);
    }

    #[test]
    fn test_positional_fallback_flags_length_mismatch() {
        let d = date(2021, 1, 1);
        let hospital = vec![
            hospital("A", d, Some(1), "X"),
            hospital("B", d, Some(2), "X"),
            hospital("C", d, Some(3), "X"),
        ];
        let statistics = vec![stat(None, None, Some(1.0)), stat(None, None, Some(2.0))];
        let out = fuse(&hospital, &statistics, &[], &FusionConfig::default());
        let report = out.dataset.join_report().unwrap();

        assert_eq!(report.applied, JoinStrategy::Positional);
        assert_eq!(report.mismatches, 1);
        assert_eq!(out.dataset.rows()[1].mean_value, Some(2.0));
        assert_eq!(out.dataset.rows()[2].mean_value, None);
        assert_eq!(out.diagnostics.count(DiagnosticKind::JoinIntegrity), 1);
    }

    #[test]
    fn test_publication_counts_by_date_and_year() {
        let hospital = vec![
            hospital("A", date(2019, 1, 1), Some(1), "X"),
            hospital("B", date(2019, 6, 1), Some(2), "X"),
            hospital("C", date(2020, 1, 1), Some(3), "X"),
        ];
        let publications = vec![
            publication(date(2019, 1, 1)),
            publication(date(2019, 1, 1)),
            publication(date(2018, 1, 1)),
        ];

        let exact = fuse(&hospital, &[], &publications, &FusionConfig::default());
        let counts: Vec<Option<u64>> = exact.dataset.rows().iter().map(|r| r.publication_count).collect();
        assert_eq!(counts, vec![Some(2), None, None]);

        let config = FusionConfig {
            publication_join: PublicationJoin::CalendarYear,
            ..FusionConfig::default()
        };
        let yearly = fuse(&hospital, &[], &publications, &config);
        let counts: Vec<Option<u64>> = yearly.dataset.rows().iter().map(|r| r.publication_count).collect();
        assert_eq!(counts, vec![Some(2), Some(2), None]);
    }

    #[test]
    fn test_standardized_columns_have_zero_mean_unit_std() {
        let hospital: Vec<HospitalRecord> = (0..20)
            .map(|i| hospital(&format!("H{}", i), date(2021, 1, 1), Some((i * i) as u64 + 3), "X"))
            .collect();
        let out = fuse(&hospital, &[], &[], &FusionConfig::default());
        let z: Vec<f64> = out.dataset.rows().iter().filter_map(|r| r.surgery_count_std).collect();
        let n = z.len() as f64;
        let mean = z.iter().sum::<f64>() / n;
        let std = (z.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        assert!(mean.abs() < 1e-6);
        assert!((std - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_restore_refits_same_parameters() {
        let hospital: Vec<HospitalRecord> = (0..5)
            .map(|i| hospital(&format!("H{}", i), date(2021, 1, 1), Some(i as u64 * 7), "X"))
            .collect();
        let fused = fuse(&hospital, &[], &[], &FusionConfig::default()).dataset;
        let restored = FusedDataset::restore(fused.rows().to_vec());
        assert_eq!(restored.standardization(), fused.standardization());
        assert!(restored.join_report().is_none());
    }
}
