//! Per-column standardization.

use crate::features::FeatureMatrix;

/// Column means and scales fitted on one matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit on `matrix` using the population standard deviation. Constant
    /// columns get a scale of 1.
    pub fn fit(matrix: &FeatureMatrix) -> Self {
        let n_cols = matrix.n_cols();
        let n = matrix.n_rows() as f64;
        if matrix.n_rows() == 0 {
            return Self {
                means: vec![0.0; n_cols],
                scales: vec![1.0; n_cols],
            };
        }

        let mut means = vec![0.0; n_cols];
        for row in matrix.rows() {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut variances = vec![0.0; n_cols];
        for row in matrix.rows() {
            for ((var, v), m) in variances.iter_mut().zip(row).zip(&means) {
                *var += (v - m).powi(2);
            }
        }

        let scales = variances
            .into_iter()
            .map(|var| {
                let std = (var / n).sqrt();
                if std > 0.0 && std.is_finite() {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Self { means, scales }
    }

    pub fn transform(&self, matrix: &FeatureMatrix) -> FeatureMatrix {
        let data = matrix
            .rows()
            .flat_map(|row| {
                row.iter()
                    .zip(&self.means)
                    .zip(&self.scales)
                    .map(|((v, m), s)| (v - m) / s)
            })
            .collect();
        matrix.with_data(data)
    }

    pub fn fit_transform(matrix: &FeatureMatrix) -> FeatureMatrix {
        Self::fit(matrix).transform(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mean_unit_variance() {
        let m = FeatureMatrix::from_rows(
            vec![0, 1, 2, 3],
            vec!["a".into(), "b".into()],
            vec![vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0], vec![4.0, 5.0]],
        )
        .unwrap();
        let scaled = StandardScaler::fit_transform(&m);

        let col_a: Vec<f64> = scaled.rows().map(|r| r[0]).collect();
        let mean: f64 = col_a.iter().sum::<f64>() / 4.0;
        let var: f64 = col_a.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);

        // Constant column collapses to zero
        assert!(scaled.rows().all(|r| r[1] == 0.0));
        assert_eq!(scaled.ids(), m.ids());
    }
}
