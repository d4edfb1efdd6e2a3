//! Small dense linear algebra: least squares and symmetric eigendecomposition.
//!
//! Matrices are row-major `Vec<Vec<f64>>`; the sizes here are a handful of
//! columns, so clarity wins over blocking or SIMD.

pub type Matrix = Vec<Vec<f64>>;

/// Inverse by Gauss-Jordan elimination with partial pivoting.
/// `None` for a singular (or numerically singular) matrix.
pub fn invert(a: &Matrix) -> Option<Matrix> {
    let n = a.len();
    let scale = a
        .iter()
        .flat_map(|r| r.iter())
        .fold(0.0f64, |m, v| m.max(v.abs()))
        .max(1.0);
    let mut aug: Matrix = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&x, &y| aug[x][col].abs().total_cmp(&aug[y][col].abs()))?;
        if aug[pivot][col].abs() < 1e-12 * scale {
            return None;
        }
        aug.swap(col, pivot);
        let p = aug[col][col];
        for v in aug[col].iter_mut() {
            *v /= p;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[row][col];
                if factor != 0.0 {
                    for k in 0..2 * n {
                        aug[row][k] -= factor * aug[col][k];
                    }
                }
            }
        }
    }

    Some(aug.into_iter().map(|r| r[n..].to_vec()).collect())
}

/// Ordinary least squares fit
#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    pub params: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub ssr: f64,
    pub nobs: usize,
    pub aic: f64,
}

impl OlsFit {
    pub fn t_value(&self, index: usize) -> f64 {
        self.params[index] / self.std_errors[index]
    }
}

/// Regress `y` on the columns of `x` (no intercept is added).
/// `None` when there are no residual degrees of freedom or `X'X` is singular.
pub fn ols(y: &[f64], x: &Matrix) -> Option<OlsFit> {
    let n = y.len();
    let k = x.first().map(|r| r.len()).unwrap_or(0);
    if k == 0 || x.len() != n || n <= k {
        return None;
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &yi) in x.iter().zip(y) {
        for i in 0..k {
            xty[i] += row[i] * yi;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    let inv = invert(&xtx)?;
    let params: Vec<f64> = (0..k)
        .map(|i| (0..k).map(|j| inv[i][j] * xty[j]).sum())
        .collect();

    let ssr: f64 = x
        .iter()
        .zip(y)
        .map(|(row, &yi)| {
            let fitted: f64 = row.iter().zip(&params).map(|(a, b)| a * b).sum();
            (yi - fitted).powi(2)
        })
        .sum();

    let sigma2 = ssr / (n - k) as f64;
    let std_errors = (0..k).map(|i| (sigma2 * inv[i][i]).sqrt()).collect();
    let nf = n as f64;
    let llf = -nf / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (ssr / nf).ln() + 1.0);
    let aic = -2.0 * llf + 2.0 * k as f64;

    Some(OlsFit {
        params,
        std_errors,
        ssr,
        nobs: n,
        aic,
    })
}

/// Slope and intercept of `y ≈ slope * x + intercept`
pub fn line_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let design: Matrix = x.iter().map(|&xi| vec![xi, 1.0]).collect();
    if y.len() == 2 && x.len() == 2 {
        // Exact fit; no residual degrees of freedom for `ols`
        let dx = x[1] - x[0];
        if dx == 0.0 {
            return None;
        }
        let slope = (y[1] - y[0]) / dx;
        return Some((slope, y[0] - slope * x[0]));
    }
    ols(y, &design).map(|fit| (fit.params[0], fit.params[1]))
}

/// Eigenvalues (descending) and matching unit eigenvectors (as rows) of a
/// symmetric matrix, by cyclic Jacobi rotations.
pub fn symmetric_eigen(a: &Matrix) -> (Vec<f64>, Matrix) {
    let n = a.len();
    let mut m = a.clone();
    let mut v: Matrix = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for _sweep in 0..100 {
        let off: f64 = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| m[i][j] * m[i][j])
            .sum();
        if off < 1e-22 {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if m[p][q].abs() < 1e-300 {
                    continue;
                }
                let theta = (m[q][q] - m[p][p]) / (2.0 * m[p][q]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let mkp = m[k][p];
                    let mkq = m[k][q];
                    m[k][p] = c * mkp - s * mkq;
                    m[k][q] = s * mkp + c * mkq;
                }
                for k in 0..n {
                    let mpk = m[p][k];
                    let mqk = m[q][k];
                    m[p][k] = c * mpk - s * mqk;
                    m[q][k] = s * mpk + c * mqk;
                }
                for row in v.iter_mut() {
                    let vkp = row[p];
                    let vkq = row[q];
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| m[j][j].total_cmp(&m[i][i]));
    let values = order.iter().map(|&i| m[i][i]).collect();
    let vectors = order
        .iter()
        .map(|&i| (0..n).map(|k| v[k][i]).collect())
        .collect();
    (values, vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invert() {
        let a = vec![vec![4.0, 7.0], vec![2.0, 6.0]];
        let inv = invert(&a).unwrap();
        assert!((inv[0][0] - 0.6).abs() < 1e-12);
        assert!((inv[0][1] + 0.7).abs() < 1e-12);
        assert!((inv[1][0] + 0.2).abs() < 1e-12);
        assert!((inv[1][1] - 0.4).abs() < 1e-12);
        assert!(invert(&vec![vec![1.0, 2.0], vec![2.0, 4.0]]).is_none());
    }

    #[test]
    fn test_ols_recovers_line() {
        let x: Matrix = (0..10).map(|i| vec![1.0, i as f64]).collect();
        let y: Vec<f64> = (0..10)
            .map(|i| 3.0 + 2.0 * i as f64 + if i % 2 == 0 { 0.1 } else { -0.1 })
            .collect();
        let fit = ols(&y, &x).unwrap();
        assert!((fit.params[0] - 3.0).abs() < 0.1);
        assert!((fit.params[1] - 2.0).abs() < 0.05);
        assert!(fit.std_errors.iter().all(|s| s.is_finite() && *s > 0.0));
        assert!(ols(&y[..2], &x[..2].to_vec()).is_none());
    }

    #[test]
    fn test_line_fit() {
        let (slope, intercept) = line_fit(&[0.0, 1.0, 2.0], &[1.0, 3.0, 5.0]).unwrap();
        assert!((slope - 2.0).abs() < 1e-9);
        assert!((intercept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric_eigen() {
        let a = vec![
            vec![2.0, 1.0, 0.0],
            vec![1.0, 2.0, 0.0],
            vec![0.0, 0.0, 5.0],
        ];
        let (values, vectors) = symmetric_eigen(&a);
        assert!((values[0] - 5.0).abs() < 1e-9);
        assert!((values[1] - 3.0).abs() < 1e-9);
        assert!((values[2] - 1.0).abs() < 1e-9);
        // A v = λ v
        for (lambda, vec) in values.iter().zip(&vectors) {
            for i in 0..3 {
                let av: f64 = (0..3).map(|j| a[i][j] * vec[j]).sum();
                assert!((av - lambda * vec[i]).abs() < 1e-9);
            }
        }
    }
}
