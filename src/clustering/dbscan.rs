//! Density-based clustering.

use rayon::prelude::*;
use tracing::debug;

use super::squared_distance;
use crate::error::{Result, StreetcareError};
use crate::features::FeatureMatrix;
use crate::models::LabelSet;

/// Label for points not reachable from any core point.
pub const NOISE: i32 = -1;

pub const DEFAULT_EPS: f64 = 0.5;
pub const DEFAULT_MIN_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dbscan {
    /// Neighbourhood radius (inclusive)
    pub eps: f64,
    /// Neighbourhood size that makes a core point. The point itself counts,
    /// so a core point needs `min_samples - 1` other points within `eps`,
    /// not `min_samples` others.
    pub min_samples: usize,
}

impl Default for Dbscan {
    fn default() -> Self {
        Self::new(DEFAULT_EPS, DEFAULT_MIN_SAMPLES)
    }
}

impl Dbscan {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.eps > 0.0 && self.eps.is_finite()) {
            return Err(StreetcareError::InvalidParameter(format!(
                "eps must be a positive finite number, got {}",
                self.eps
            )));
        }
        if self.min_samples == 0 {
            return Err(StreetcareError::InvalidParameter(
                "min_samples must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Cluster ids `0..` in order of their lowest-index core point, [`NOISE`]
    /// elsewhere.
    pub fn fit(&self, data: &FeatureMatrix) -> Result<Vec<i32>> {
        self.validate()?;

        let eps2 = self.eps * self.eps;
        let n = data.n_rows();
        let neighbors: Vec<Vec<usize>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let row = data.row(i);
                (0..n)
                    .filter(|j| squared_distance(row, data.row(*j)) <= eps2)
                    .collect()
            })
            .collect();
        let is_core: Vec<bool> = neighbors
            .iter()
            .map(|nb| nb.len() >= self.min_samples)
            .collect();

        let mut labels = vec![NOISE; n];
        let mut cluster = 0;
        let mut queue = Vec::new();
        for seed in 0..n {
            if labels[seed] != NOISE || !is_core[seed] {
                continue;
            }
            labels[seed] = cluster;
            queue.push(seed);
            while let Some(p) = queue.pop() {
                if !is_core[p] {
                    continue;
                }
                for &q in &neighbors[p] {
                    if labels[q] == NOISE {
                        labels[q] = cluster;
                        queue.push(q);
                    }
                }
            }
            cluster += 1;
        }

        debug!(
            "DBSCAN eps={} min_samples={} found {} clusters, {} noise points",
            self.eps,
            self.min_samples,
            cluster,
            labels.iter().filter(|l| **l == NOISE).count()
        );
        Ok(labels)
    }

    pub fn fit_predict(&self, data: &FeatureMatrix) -> Result<LabelSet> {
        let labels = self.fit(data)?;
        LabelSet::new(data.ids().to_vec(), labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::tests::blobs;

    fn matrix(points: &[[f64; 2]]) -> FeatureMatrix {
        FeatureMatrix::from_rows(
            (0..points.len() as u64).collect(),
            vec!["x".into(), "y".into()],
            points.iter().map(|p| p.to_vec()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_two_groups_and_noise() {
        let data = matrix(&[
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [20.0, 20.0],
        ]);
        let labels = Dbscan::new(0.5, 3).fit(&data).unwrap();
        assert_eq!(labels, vec![0, 0, 0, 1, 1, 1, NOISE]);
    }

    #[test]
    fn test_chain_is_transitive() {
        let data = matrix(&[[0.0, 0.0], [0.4, 0.0], [0.8, 0.0], [1.2, 0.0], [1.6, 0.0]]);
        let labels = Dbscan::new(0.45, 2).fit(&data).unwrap();
        assert!(labels.iter().all(|l| *l == 0));
    }

    #[test]
    fn test_min_samples_counts_the_point_itself() {
        let data = matrix(&[[0.0, 0.0], [0.1, 0.0]]);
        assert_eq!(Dbscan::new(0.5, 2).fit(&data).unwrap(), vec![0, 0]);
        assert_eq!(Dbscan::new(0.5, 3).fit(&data).unwrap(), vec![NOISE, NOISE]);
    }

    #[test]
    fn test_repeat_runs_are_identical() {
        let data = blobs(90);
        let dbscan = Dbscan::new(0.3, 4);
        let first = dbscan.fit_predict(&data).unwrap();
        let second = dbscan.fit_predict(&data).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_parameters() {
        let data = matrix(&[[0.0, 0.0]]);
        assert!(Dbscan::new(0.0, 2).fit(&data).is_err());
        assert!(Dbscan::new(f64::NAN, 2).fit(&data).is_err());
        assert!(Dbscan::new(0.5, 0).fit(&data).is_err());
    }
}
