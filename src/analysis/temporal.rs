//! Temporal analysis: monthly surgery totals, additive seasonal
//! decomposition and an augmented Dickey-Fuller stationarity test.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::analysis::linalg::{line_fit, ols, Matrix};
use crate::analysis::stats::{finite, normal_cdf};
use crate::analysis::Outcome;
use crate::domain::HospitalRecord;

/// Fewest observations for which the ADF lag bound is non-negative
pub const ADF_MIN_OBSERVATIONS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    /// `YYYY-MM`
    pub month: String,
    pub total: u64,
    /// True when no hospital row fell in this month and the total was filled with 0
    pub filled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub period: usize,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    /// Peak-to-trough spread of the seasonal pattern
    pub seasonal_amplitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    #[serde(rename = "1%")]
    pub one_percent: f64,
    #[serde(rename = "5%")]
    pub five_percent: f64,
    #[serde(rename = "10%")]
    pub ten_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationarityTest {
    pub adf_statistic: f64,
    pub p_value: f64,
    pub used_lag: usize,
    pub n_obs: usize,
    pub critical_values: CriticalValues,
    /// Best information criterion from lag selection
    pub ic_best: f64,
    /// p-value below 0.05
    pub stationary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalResult {
    pub months: Vec<MonthlyTotal>,
    pub filled_months: usize,
    pub decomposition: Outcome<Decomposition>,
    pub stationarity: Outcome<StationarityTest>,
}

pub fn analyze(hospital: &[HospitalRecord], period: usize) -> Outcome<TemporalResult> {
    let months = monthly_totals(hospital);
    if months.is_empty() {
        return Outcome::insufficient("no dated hospital rows", 1, 0);
    }
    let values: Vec<f64> = months.iter().map(|m| m.total as f64).collect();
    Outcome::Complete(TemporalResult {
        filled_months: months.iter().filter(|m| m.filled).count(),
        decomposition: seasonal_decompose(&values, period),
        stationarity: adfuller(&values),
        months,
    })
}

/// Surgery counts summed per calendar month over a contiguous range; months
/// without rows count as 0. Missing counts contribute nothing.
pub fn monthly_totals(hospital: &[HospitalRecord]) -> Vec<MonthlyTotal> {
    let mut buckets: BTreeMap<(i32, u32), u64> = BTreeMap::new();
    for row in hospital {
        let bucket = buckets.entry((row.date.year(), row.date.month())).or_insert(0);
        *bucket = bucket.saturating_add(row.surgery_count.unwrap_or(0));
    }
    let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let (mut year, mut month) = first;
    while (year, month) <= last {
        let total = buckets.get(&(year, month)).copied();
        out.push(MonthlyTotal {
            month: format!("{:04}-{:02}", year, month),
            total: total.unwrap_or(0),
            filled: total.is_none(),
        });
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    out
}

/// Additive decomposition with a centered moving-average trend.
///
/// The trend's undefined ends are extrapolated linearly from the nearest
/// `period - 1` trend points, so every component is defined everywhere.
pub fn seasonal_decompose(values: &[f64], period: usize) -> Outcome<Decomposition> {
    let n = values.len();
    let required = 2 * period;
    if period < 2 || n < required {
        return Outcome::insufficient(
            format!("seasonal decomposition needs two full periods of {} months", period),
            required,
            n,
        );
    }

    let weights = moving_average_weights(period);
    let half = weights.len() / 2;
    let mut trend = vec![f64::NAN; n];
    for (t, slot) in trend.iter_mut().enumerate().take(n - half).skip(half) {
        *slot = weights
            .iter()
            .enumerate()
            .map(|(j, w)| w * values[t + j - half])
            .sum();
    }
    extrapolate_trend(&mut trend, half, n - 1 - half, (period - 1).max(2));
    if trend.iter().any(|v| !v.is_finite()) {
        return Outcome::Undefined {
            reason: "trend could not be extrapolated to the series ends".to_string(),
        };
    }

    let detrended: Vec<f64> = values.iter().zip(&trend).map(|(v, t)| v - t).collect();
    let mut averages: Vec<f64> = (0..period)
        .map(|i| {
            let phase: Vec<f64> = detrended.iter().skip(i).step_by(period).copied().collect();
            phase.iter().sum::<f64>() / phase.len() as f64
        })
        .collect();
    let centre = averages.iter().sum::<f64>() / period as f64;
    for a in averages.iter_mut() {
        *a -= centre;
    }

    let seasonal: Vec<f64> = (0..n).map(|t| averages[t % period]).collect();
    let residual: Vec<f64> = detrended.iter().zip(&seasonal).map(|(d, s)| d - s).collect();
    let max = averages.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = averages.iter().copied().fold(f64::INFINITY, f64::min);

    Outcome::Complete(Decomposition {
        period,
        trend,
        seasonal,
        residual,
        seasonal_amplitude: max - min,
    })
}

/// 2×period centered filter for an even period, plain mean for an odd one
fn moving_average_weights(period: usize) -> Vec<f64> {
    let p = period as f64;
    if period % 2 == 0 {
        let mut w = vec![1.0 / p; period + 1];
        w[0] = 0.5 / p;
        w[period] = 0.5 / p;
        w
    } else {
        vec![1.0 / p; period]
    }
}

/// Fill `trend[..front]` and `trend[back + 1..]` from least-squares lines
/// through the `npoints` defined values nearest each end.
fn extrapolate_trend(trend: &mut [f64], front: usize, back: usize, npoints: usize) {
    let n = trend.len();
    let fit = |lo: usize, hi: usize, trend: &[f64]| {
        let x: Vec<f64> = (lo..hi).map(|i| i as f64).collect();
        line_fit(&x, &trend[lo..hi])
    };

    let front_last = (front + npoints).min(back);
    if let Some((k, c)) = fit(front, front_last, &*trend) {
        for (i, slot) in trend.iter_mut().enumerate().take(front) {
            *slot = i as f64 * k + c;
        }
    }

    let back_first = back.saturating_sub(npoints).max(front);
    if let Some((k, c)) = fit(back_first, back, &*trend) {
        for (i, slot) in trend.iter_mut().enumerate().take(n).skip(back + 1) {
            *slot = i as f64 * k + c;
        }
    }
}

/// Augmented Dickey-Fuller test with a constant, lag order chosen by AIC.
pub fn adfuller(values: &[f64]) -> Outcome<StationarityTest> {
    let n = values.len();
    if n < ADF_MIN_OBSERVATIONS {
        return Outcome::insufficient("stationarity test needs more monthly observations", ADF_MIN_OBSERVATIONS, n);
    }

    let upper = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    let maxlag = upper.min(n / 2 - 2);
    let diff: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    // Lag selection on the common sample implied by `maxlag`
    let (y, design) = adf_design(values, &diff, maxlag, maxlag, true);
    let mut best: Option<(f64, usize)> = None;
    for lags in 0..=maxlag {
        let cols: Matrix = design.iter().map(|r| r[..lags + 2].to_vec()).collect();
        if let Some(fit) = ols(&y, &cols) {
            if fit.aic.is_finite() && best.map_or(true, |(aic, _)| fit.aic < aic) {
                best = Some((fit.aic, lags));
            }
        }
    }
    let Some((ic_best, used_lag)) = best else {
        return Outcome::Undefined {
            reason: "ADF regression is singular for every lag order (constant series?)".to_string(),
        };
    };

    // Refit with the chosen lag on its own (longer) sample
    let (y, design) = adf_design(values, &diff, used_lag, used_lag, false);
    let Some(fit) = ols(&y, &design) else {
        return Outcome::Undefined {
            reason: "ADF regression is singular".to_string(),
        };
    };
    let Some(adf_statistic) = finite(fit.t_value(0)) else {
        return Outcome::Undefined {
            reason: "ADF statistic is not finite".to_string(),
        };
    };

    let p_value = mackinnon_p_value(adf_statistic);
    Outcome::Complete(StationarityTest {
        adf_statistic,
        p_value,
        used_lag,
        n_obs: fit.nobs,
        critical_values: mackinnon_critical_values(fit.nobs),
        ic_best,
        stationary: p_value < 0.05,
    })
}

/// Response `Δx[t]` and regressors: lagged level `x[t]`, then
/// `Δx[t-1] .. Δx[t-lags]`, with the constant first or last.
fn adf_design(
    values: &[f64],
    diff: &[f64],
    sample_lag: usize,
    lags: usize,
    constant_first: bool,
) -> (Vec<f64>, Matrix) {
    let rows = sample_lag..diff.len();
    let y = diff[rows.clone()].to_vec();
    let design = rows
        .map(|t| {
            let mut row = Vec::with_capacity(lags + 2);
            if constant_first {
                row.push(1.0);
            }
            row.push(values[t]);
            row.extend((1..=lags).map(|j| diff[t - j]));
            if !constant_first {
                row.push(1.0);
            }
            row
        })
        .collect();
    (y, design)
}

/// MacKinnon (1994) approximate p-value, constant-only regression, one series
pub fn mackinnon_p_value(stat: f64) -> f64 {
    const MAX_STAT: f64 = 2.74;
    const MIN_STAT: f64 = -18.86;
    const STAR_STAT: f64 = -1.61;
    const SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
    const LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

    if stat > MAX_STAT {
        return 1.0;
    }
    if stat < MIN_STAT {
        return 0.0;
    }
    let coeffs: &[f64] = if stat <= STAR_STAT { &SMALL_P } else { &LARGE_P };
    normal_cdf(polyval(coeffs, stat))
}

/// MacKinnon (2010) critical values for a constant-only regression
pub fn mackinnon_critical_values(nobs: usize) -> CriticalValues {
    const TAU_C: [[f64; 4]; 3] = [
        [-3.43035, -6.5393, -16.786, -79.433],
        [-2.86154, -2.8903, -4.234, -40.04],
        [-2.56677, -1.5384, -2.809, 0.0],
    ];
    let inv = 1.0 / nobs as f64;
    CriticalValues {
        one_percent: polyval(&TAU_C[0], inv),
        five_percent: polyval(&TAU_C[1], inv),
        ten_percent: polyval(&TAU_C[2], inv),
    }
}

/// `c[0] + c[1]·x + c[2]·x² + …`
fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn row(y: i32, m: u32, count: Option<u64>) -> HospitalRecord {
        HospitalRecord {
            hospital_name: Some("General".to_string()),
            date: NaiveDate::from_ymd_opt(y, m, 10).unwrap(),
            surgery_count: count,
            location: Some("Boston".to_string()),
            count_missing: count.is_none(),
        }
    }

    fn autocorrelation(values: &[f64], lag: usize) -> f64 {
        crate::analysis::stats::pearson(&values[..values.len() - lag], &values[lag..]).unwrap()
    }

    #[test]
    fn test_monthly_totals_fill_gaps() {
        let rows = vec![
            row(2020, 11, Some(5)),
            row(2020, 11, Some(2)),
            row(2021, 2, Some(4)),
            row(2021, 2, None),
        ];
        let months = monthly_totals(&rows);
        let labels: Vec<&str> = months.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(labels, vec!["2020-11", "2020-12", "2021-01", "2021-02"]);
        let totals: Vec<u64> = months.iter().map(|m| m.total).collect();
        assert_eq!(totals, vec![7, 0, 0, 4]);
        assert_eq!(months.iter().filter(|m| m.filled).count(), 2);
    }

    #[test]
    fn test_monthly_totals_count_rows_without_location() {
        use crate::pipeline::processing::normalize::{Cleaner, HospitalCleaner};
        use crate::pipeline::ingestion::RawRecord;

        let records = vec![
            RawRecord::new()
                .with("hospital_name", "General")
                .with("date", "2021-03-02")
                .with("surgery_count", "6"),
            RawRecord::new()
                .with("hospital_name", "Mercy")
                .with("date", "2021-03-20")
                .with("surgery_count", "4")
                .with("location", "Boston"),
        ];
        let cleaned = HospitalCleaner.clean(&records);
        assert_eq!(cleaned.rows.len(), 2);
        assert_eq!(cleaned.rows[0].location, None);

        let months = monthly_totals(&cleaned.rows);
        assert_eq!(months.len(), 1);
        assert_eq!(months[0].total, 10);
    }

    #[test]
    fn test_monthly_totals_saturate() {
        let rows = vec![row(2021, 1, Some(u64::MAX)), row(2021, 1, Some(5))];
        assert_eq!(monthly_totals(&rows)[0].total, u64::MAX);
    }

    #[test]
    fn test_decomposition_recovers_seasonality() {
        let mut rng = StdRng::seed_from_u64(7);
        let values: Vec<f64> = (0..48)
            .map(|t| {
                let t = t as f64;
                100.0 + 0.8 * t + 10.0 * (2.0 * PI * t / 12.0).sin() + rng.gen_range(-1.0..1.0)
            })
            .collect();

        let Outcome::Complete(d) = seasonal_decompose(&values, 12) else {
            panic!("expected a complete decomposition");
        };
        assert_eq!(d.trend.len(), 48);
        assert!(d.trend.iter().chain(&d.seasonal).chain(&d.residual).all(|v| v.is_finite()));
        assert!(autocorrelation(&d.seasonal, 12) > 0.8);
        assert!(d.trend.windows(2).all(|w| w[1] > w[0]), "trend should be monotone");
        for t in 0..48 {
            let sum = d.trend[t] + d.seasonal[t] + d.residual[t];
            assert!((sum - values[t]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_decomposition_needs_two_periods() {
        let values = vec![1.0; 23];
        match seasonal_decompose(&values, 12) {
            Outcome::InsufficientData { required, available, .. } => {
                assert_eq!(required, 24);
                assert_eq!(available, 23);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_adf_separates_stationary_from_random_walk() {
        let mut rng = StdRng::seed_from_u64(42);
        let noise: Vec<f64> = (0..120).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let mut walk = Vec::with_capacity(120);
        let mut level = 0.0;
        for e in &noise {
            level += e;
            walk.push(level);
        }

        let Outcome::Complete(stationary) = adfuller(&noise) else {
            panic!("expected a complete test");
        };
        assert!(stationary.p_value < 0.05);
        assert!(stationary.adf_statistic < stationary.critical_values.five_percent);

        let Outcome::Complete(trending) = adfuller(&walk) else {
            panic!("expected a complete test");
        };
        assert!(trending.p_value > stationary.p_value);
        assert!(trending.used_lag <= 13);
    }

    #[test]
    fn test_adf_preconditions() {
        assert!(matches!(adfuller(&[1.0, 2.0, 3.0]), Outcome::InsufficientData { .. }));
        assert!(matches!(adfuller(&[5.0; 30]), Outcome::Undefined { .. }));
    }

    #[test]
    fn test_mackinnon_tables() {
        assert_eq!(mackinnon_p_value(3.0), 1.0);
        assert_eq!(mackinnon_p_value(-20.0), 0.0);
        // Textbook 5% critical value is about -2.86 for large samples
        let cv = mackinnon_critical_values(10_000);
        assert!((cv.five_percent + 2.8618).abs() < 1e-3);
        assert!((mackinnon_p_value(cv.five_percent) - 0.05).abs() < 0.01);
    }
}
