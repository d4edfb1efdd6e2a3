//! Clustering analysis: k-means (k-means++ seeding, seeded restarts) on the
//! standardized primary fields, plus a two-component PCA projection.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::linalg::{symmetric_eigen, Matrix};
use crate::analysis::Outcome;
use crate::config::AnalysisConfig;
use crate::domain::{FusedRecord, PrimaryField};
use crate::pipeline::processing::fusion::{MissingValuePolicy, StandardizationParams};

/// Convergence tolerance, relative to the mean feature variance
const RELATIVE_TOLERANCE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeansSettings {
    pub n_clusters: usize,
    pub seed: u64,
    pub restarts: usize,
    pub max_iter: usize,
}

impl From<&AnalysisConfig> for KMeansSettings {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            n_clusters: config.n_clusters,
            seed: config.seed,
            restarts: config.kmeans_restarts,
            max_iter: config.kmeans_max_iter,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub centers: Matrix,
    pub labels: Vec<usize>,
    pub inertia: f64,
    pub iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    /// Unit principal axes, one per row, in decreasing variance order
    pub components: Matrix,
    pub explained_variance_ratio: Vec<f64>,
    pub projection: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub features: Vec<PrimaryField>,
    pub policy: MissingValuePolicy,
    pub scaling: StandardizationParams,
    pub n_clusters: usize,
    pub seed: u64,
    pub restarts: usize,
    pub iterations: usize,
    pub inertia: f64,
    /// Cluster centers in standardized units
    pub centers: Vec<Vec<f64>>,
    /// Cluster centers mapped back to raw units
    pub centers_original: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    pub cluster_sizes: Vec<usize>,
    pub explained_variance_ratio: Vec<f64>,
    /// First two principal coordinates per row
    pub projection: Vec<[f64; 2]>,
}

pub fn analyze(rows: &[FusedRecord], settings: KMeansSettings) -> Outcome<ClusteringResult> {
    let k = settings.n_clusters;
    if rows.len() < k {
        return Outcome::insufficient("k-means needs at least as many rows as clusters", k, rows.len());
    }

    let policy = MissingValuePolicy::CLUSTERING;
    let columns: Vec<(&str, Vec<Option<f64>>)> = PrimaryField::ALL
        .iter()
        .map(|f| (f.name(), rows.iter().map(|r| f.raw(r)).collect()))
        .collect();
    let scaling = StandardizationParams::fit(
        columns.iter().map(|(name, values)| (*name, values.as_slice())),
        policy,
    );

    let data: Matrix = (0..rows.len())
        .map(|i| {
            scaling
                .columns
                .iter()
                .zip(&columns)
                .map(|(scaler, (_, values))| scaler.transform(values[i].unwrap_or(0.0)))
                .collect()
        })
        .collect();

    let distinct = distinct_points(&data);
    if distinct < k {
        return Outcome::insufficient("k-means needs at least as many distinct points as clusters", k, distinct);
    }

    let Some(fit) = kmeans(&data, settings) else {
        return Outcome::Undefined {
            reason: "k-means did not produce a clustering".to_string(),
        };
    };
    let pca = pca(&data, 2);

    let mut cluster_sizes = vec![0usize; k];
    for &label in &fit.labels {
        cluster_sizes[label] += 1;
    }
    let centers_original = fit
        .centers
        .iter()
        .map(|c| c.iter().zip(&scaling.columns).map(|(z, s)| s.inverse(*z)).collect())
        .collect();
    let projection = pca
        .projection
        .iter()
        .map(|p| [p.first().copied().unwrap_or(0.0), p.get(1).copied().unwrap_or(0.0)])
        .collect();

    Outcome::Complete(ClusteringResult {
        features: PrimaryField::ALL.to_vec(),
        policy,
        n_clusters: k,
        seed: settings.seed,
        restarts: settings.restarts,
        iterations: fit.iterations,
        inertia: fit.inertia,
        centers: fit.centers,
        centers_original,
        labels: fit.labels,
        cluster_sizes,
        explained_variance_ratio: pca.explained_variance_ratio,
        projection,
        scaling,
    })
}

fn distinct_points(data: &Matrix) -> usize {
    data.iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<HashSet<_>>()
        .len()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Lowest-inertia Lloyd run over `restarts` k-means++ initializations drawn
/// from one seeded generator. `None` when there are fewer points than clusters.
pub fn kmeans(data: &Matrix, settings: KMeansSettings) -> Option<KMeansFit> {
    let k = settings.n_clusters;
    if k == 0 || data.len() < k {
        return None;
    }
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let tol = tolerance(data);

    let mut best: Option<KMeansFit> = None;
    for restart in 0..settings.restarts.max(1) {
        let init = kmeans_plus_plus(data, k, &mut rng);
        let fit = lloyd(data, init, settings.max_iter, tol);
        debug!(restart, inertia = fit.inertia, iterations = fit.iterations, "k-means restart");
        if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }
    best
}

fn tolerance(data: &Matrix) -> f64 {
    let n = data.len() as f64;
    let dims = data.first().map(|r| r.len()).unwrap_or(0);
    if dims == 0 {
        return 0.0;
    }
    let mean_variance = (0..dims)
        .map(|j| {
            let mean = data.iter().map(|r| r[j]).sum::<f64>() / n;
            data.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n
        })
        .sum::<f64>()
        / dims as f64;
    mean_variance * RELATIVE_TOLERANCE
}

/// k-means++ with greedy local trials (`2 + ln k` candidates per center)
fn kmeans_plus_plus(data: &Matrix, k: usize, rng: &mut StdRng) -> Matrix {
    let n = data.len();
    let local_trials = 2 + (k as f64).ln() as usize;

    let first = rng.gen_range(0..n);
    let mut centers = vec![data[first].clone()];
    let mut closest: Vec<f64> = data.iter().map(|p| squared_distance(p, &data[first])).collect();
    let mut potential: f64 = closest.iter().sum();

    while centers.len() < k {
        let cumulative: Vec<f64> = closest
            .iter()
            .scan(0.0, |acc, d| {
                *acc += d;
                Some(*acc)
            })
            .collect();

        let mut best: Option<(f64, usize, Vec<f64>)> = None;
        for _ in 0..local_trials {
            let target = rng.gen::<f64>() * potential;
            let candidate = cumulative.partition_point(|&c| c < target).min(n - 1);
            let distances: Vec<f64> = data
                .iter()
                .zip(&closest)
                .map(|(p, &d)| d.min(squared_distance(p, &data[candidate])))
                .collect();
            let candidate_potential: f64 = distances.iter().sum();
            if best.as_ref().map_or(true, |(pot, _, _)| candidate_potential < *pot) {
                best = Some((candidate_potential, candidate, distances));
            }
        }

        let Some((new_potential, chosen, distances)) = best else {
            break;
        };
        centers.push(data[chosen].clone());
        closest = distances;
        potential = new_potential;
    }
    centers
}

fn assign(data: &Matrix, centers: &Matrix) -> (Vec<usize>, f64) {
    let mut inertia = 0.0;
    let labels = data
        .iter()
        .map(|p| {
            let (label, dist) = centers
                .iter()
                .enumerate()
                .map(|(i, c)| (i, squared_distance(p, c)))
                .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });
            inertia += dist;
            label
        })
        .collect();
    (labels, inertia)
}

fn lloyd(data: &Matrix, mut centers: Matrix, max_iter: usize, tol: f64) -> KMeansFit {
    let dims = data[0].len();
    let mut iterations = 0;

    for _ in 0..max_iter {
        iterations += 1;
        let (labels, _) = assign(data, &centers);

        let mut sums = vec![vec![0.0; dims]; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (p, &label) in data.iter().zip(&labels) {
            counts[label] += 1;
            for (s, v) in sums[label].iter_mut().zip(p) {
                *s += v;
            }
        }

        let mut shift = 0.0;
        for (c, (sum, count)) in sums.into_iter().zip(counts).enumerate() {
            // An emptied cluster keeps its previous center
            if count == 0 {
                continue;
            }
            let updated: Vec<f64> = sum.iter().map(|s| s / count as f64).collect();
            shift += squared_distance(&updated, &centers[c]);
            centers[c] = updated;
        }
        if shift <= tol {
            break;
        }
    }

    let (labels, inertia) = assign(data, &centers);
    KMeansFit {
        centers,
        labels,
        inertia,
        iterations,
    }
}

/// Principal components of the column-centered data
pub fn pca(data: &Matrix, n_components: usize) -> Pca {
    let n = data.len();
    let dims = data.first().map(|r| r.len()).unwrap_or(0);
    let means: Vec<f64> = (0..dims)
        .map(|j| data.iter().map(|r| r[j]).sum::<f64>() / n.max(1) as f64)
        .collect();
    let centered: Matrix = data
        .iter()
        .map(|r| r.iter().zip(&means).map(|(v, m)| v - m).collect())
        .collect();

    let denom = n.saturating_sub(1).max(1) as f64;
    let covariance: Matrix = (0..dims)
        .map(|i| {
            (0..dims)
                .map(|j| centered.iter().map(|r| r[i] * r[j]).sum::<f64>() / denom)
                .collect()
        })
        .collect();

    let (values, mut vectors) = symmetric_eigen(&covariance);
    let values: Vec<f64> = values.into_iter().map(|v| v.max(0.0)).collect();
    let total: f64 = values.iter().sum();
    let keep = n_components.min(dims);

    // Deterministic orientation: largest-magnitude loading positive
    for v in vectors.iter_mut() {
        let pivot = v.iter().copied().fold(0.0f64, |m, x| if x.abs() > m.abs() { x } else { m });
        if pivot < 0.0 {
            for x in v.iter_mut() {
                *x = -*x;
            }
        }
    }
    vectors.truncate(keep);

    let explained_variance_ratio = values
        .iter()
        .take(keep)
        .map(|v| if total > 0.0 { v / total } else { 0.0 })
        .collect();
    let projection = centered
        .iter()
        .map(|r| {
            vectors
                .iter()
                .map(|axis| r.iter().zip(axis).map(|(a, b)| a * b).sum())
                .collect()
        })
        .collect();

    Pca {
        components: vectors,
        explained_variance_ratio,
        projection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn settings() -> KMeansSettings {
        KMeansSettings {
            n_clusters: 3,
            seed: 42,
            restarts: 10,
            max_iter: 300,
        }
    }

    fn gaussian(rng: &mut StdRng) -> f64 {
        // Box-Muller
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn blobs() -> (Matrix, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(1);
        let centers = [[0.0, 0.0, 0.0], [10.0, 10.0, 0.0], [0.0, 10.0, 10.0]];
        let mut data = Vec::new();
        let mut truth = Vec::new();
        for (label, c) in centers.iter().enumerate() {
            for _ in 0..50 {
                data.push(c.iter().map(|m| m + gaussian(&mut rng)).collect());
                truth.push(label);
            }
        }
        (data, truth)
    }

    /// Best accuracy over all label permutations
    fn permuted_accuracy(labels: &[usize], truth: &[usize]) -> f64 {
        let perms = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        perms
            .iter()
            .map(|p| {
                labels.iter().zip(truth).filter(|(l, t)| p[**l] == **t).count() as f64 / truth.len() as f64
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_kmeans_recovers_blobs() {
        let (data, truth) = blobs();
        let fit = kmeans(&data, settings()).unwrap();
        assert!(permuted_accuracy(&fit.labels, &truth) >= 0.95);
        assert!(fit.inertia.is_finite());
    }

    #[test]
    fn test_kmeans_is_reproducible() {
        let (data, _) = blobs();
        let a = kmeans(&data, settings()).unwrap();
        let b = kmeans(&data, settings()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_pca_explains_dominant_axis() {
        let data: Matrix = (0..20)
            .map(|i| {
                let t = i as f64;
                vec![t, 2.0 * t, if i % 2 == 0 { 0.1 } else { -0.1 }]
            })
            .collect();
        let result = pca(&data, 2);
        assert_eq!(result.explained_variance_ratio.len(), 2);
        assert!(result.explained_variance_ratio[0] > 0.99);
        assert!(result.components[0].iter().all(|v| *v >= -1e-9));
        assert_eq!(result.projection.len(), 20);
    }

    fn fused(count: u64, mean_value: f64, pubs: u64) -> FusedRecord {
        FusedRecord {
            hospital_name: Some("H".to_string()),
            date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            location: Some("X".to_string()),
            surgery_count: Some(count),
            statistics_source: None,
            mean_value: Some(mean_value),
            publication_count: Some(pubs),
            surgery_rate: None,
            surgery_count_std: None,
            mean_value_std: None,
            publication_count_std: None,
        }
    }

    #[test]
    fn test_analyze_reports_sizes_and_projection() {
        let mut rows = Vec::new();
        for i in 0..10 {
            rows.push(fused(10 + i % 3, 1.0, 1));
            rows.push(fused(100 + i % 3, 50.0, 5));
            rows.push(fused(200 + i % 3, 5.0, 20));
        }
        let Outcome::Complete(result) = analyze(&rows, settings()) else {
            panic!("expected complete clustering");
        };
        assert_eq!(result.labels.len(), 30);
        assert_eq!(result.cluster_sizes.iter().sum::<usize>(), 30);
        assert!(result.cluster_sizes.iter().all(|&s| s == 10));
        assert_eq!(result.projection.len(), 30);
        let ratio: f64 = result.explained_variance_ratio.iter().sum();
        assert!(ratio <= 1.0 + 1e-9);
        let back = &result.centers_original;
        assert!(back.iter().any(|c| (c[0] - 100.9).abs() < 1e-6));
    }

    #[test]
    fn test_analyze_insufficient_data() {
        let rows = vec![fused(1, 1.0, 1), fused(2, 2.0, 2)];
        assert!(matches!(
            analyze(&rows, settings()),
            Outcome::InsufficientData { required: 3, available: 2, .. }
        ));

        let rows = vec![fused(1, 1.0, 1); 5];
        assert!(matches!(
            analyze(&rows, settings()),
            Outcome::InsufficientData { required: 3, available: 1, .. }
        ));
    }
}
