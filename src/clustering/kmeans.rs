//! Centroid-based clustering (Lloyd's algorithm, k-means++ seeding).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use super::{count_distinct, squared_distance};
use crate::error::{Result, StreetcareError};
use crate::features::FeatureMatrix;
use crate::models::LabelSet;

pub const DEFAULT_N_INIT: usize = 10;
pub const DEFAULT_MAX_ITER: usize = 300;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeans {
    pub k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub seed: u64,
}

/// Result of the best restart
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
    pub iterations: usize,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            n_init: DEFAULT_N_INIT,
            max_iter: DEFAULT_MAX_ITER,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Check the parameters against the data without clustering.
    pub fn validate(&self, data: &FeatureMatrix) -> Result<()> {
        if self.k == 0 {
            return Err(StreetcareError::InvalidParameter("k must be at least 1".into()));
        }
        if self.n_init == 0 || self.max_iter == 0 {
            return Err(StreetcareError::InvalidParameter(
                "n_init and max_iter must be at least 1".into(),
            ));
        }
        let distinct = count_distinct(data);
        if self.k > distinct {
            return Err(StreetcareError::TooManyClusters {
                k: self.k,
                distinct,
            });
        }
        Ok(())
    }

    /// Run `n_init` seeded restarts and keep the lowest inertia.
    ///
    /// Restart `r` uses seed `seed + r`; ties keep the earliest restart, so
    /// the result only depends on the seed and restart count.
    pub fn fit(&self, data: &FeatureMatrix) -> Result<KMeansFit> {
        self.validate(data)?;

        let fits: Vec<KMeansFit> = (0..self.n_init)
            .into_par_iter()
            .map(|run| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(run as u64));
                self.run_once(data, &mut rng)
            })
            .collect();

        let mut best: Option<KMeansFit> = None;
        for fit in fits {
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }
        let best = best.ok_or_else(|| StreetcareError::InvalidParameter("no restarts".into()))?;

        debug!(
            "k-means k={} converged in {} iterations, inertia {:.4}",
            self.k, best.iterations, best.inertia
        );
        Ok(best)
    }

    /// Labels in `[0, k)` keyed by the matrix record ids.
    pub fn fit_predict(&self, data: &FeatureMatrix) -> Result<LabelSet> {
        let fit = self.fit(data)?;
        let labels = fit.labels.into_iter().map(|l| l as i32).collect();
        LabelSet::new(data.ids().to_vec(), labels)
    }

    fn run_once(&self, data: &FeatureMatrix, rng: &mut StdRng) -> KMeansFit {
        let n = data.n_rows();
        let mut centroids = self.init_plus_plus(data, rng);
        let mut labels = vec![usize::MAX; n];
        let mut iterations = 0;

        for _ in 0..self.max_iter {
            iterations += 1;
            let mut changed = false;
            for (i, row) in data.rows().enumerate() {
                let nearest = nearest_centroid(row, &centroids).0;
                if labels[i] != nearest {
                    labels[i] = nearest;
                    changed = true;
                }
            }

            changed |= self.fill_empty_clusters(data, &centroids, &mut labels);

            if !changed {
                break;
            }
            centroids = self.update_centroids(data, &labels);
        }

        let inertia = data
            .rows()
            .zip(&labels)
            .map(|(row, l)| squared_distance(row, &centroids[*l]))
            .sum();

        KMeansFit {
            labels,
            centroids,
            inertia,
            iterations,
        }
    }

    /// k-means++: first center uniform, later ones with probability
    /// proportional to squared distance from the closest chosen center.
    fn init_plus_plus(&self, data: &FeatureMatrix, rng: &mut StdRng) -> Vec<Vec<f64>> {
        let n = data.n_rows();
        let first = rng.random_range(0..n);
        let mut centroids = vec![data.row(first).to_vec()];
        let mut closest: Vec<f64> = data
            .rows()
            .map(|row| squared_distance(row, &centroids[0]))
            .collect();

        while centroids.len() < self.k {
            let total: f64 = closest.iter().sum();
            let mut target = rng.random::<f64>() * total;
            let mut chosen = None;
            for (i, d) in closest.iter().enumerate() {
                if *d <= 0.0 {
                    continue;
                }
                chosen = Some(i);
                target -= d;
                if target <= 0.0 {
                    break;
                }
            }
            // k never exceeds the distinct point count, so some point is
            // still uncovered while centers are missing
            let Some(chosen) = chosen else { break };

            let center = data.row(chosen).to_vec();
            for (d, row) in closest.iter_mut().zip(data.rows()) {
                *d = d.min(squared_distance(row, &center));
            }
            centroids.push(center);
        }

        centroids
    }

    /// Move the point farthest from its centroid into each empty cluster.
    fn fill_empty_clusters(
        &self,
        data: &FeatureMatrix,
        centroids: &[Vec<f64>],
        labels: &mut [usize],
    ) -> bool {
        let mut counts = vec![0usize; self.k];
        for l in labels.iter() {
            counts[*l] += 1;
        }

        let mut changed = false;
        for cluster in 0..self.k {
            if counts[cluster] > 0 {
                continue;
            }
            let donor = data
                .rows()
                .enumerate()
                .filter(|(i, _)| counts[labels[*i]] > 1)
                .map(|(i, row)| (i, squared_distance(row, &centroids[labels[i]])))
                .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                    Some((_, bd)) if bd >= d => best,
                    _ => Some((i, d)),
                });
            if let Some((i, _)) = donor {
                counts[labels[i]] -= 1;
                labels[i] = cluster;
                counts[cluster] += 1;
                changed = true;
            }
        }
        changed
    }

    fn update_centroids(&self, data: &FeatureMatrix, labels: &[usize]) -> Vec<Vec<f64>> {
        let dims = data.n_cols();
        let mut sums = vec![vec![0.0; dims]; self.k];
        let mut counts = vec![0usize; self.k];
        for (row, l) in data.rows().zip(labels) {
            for (s, v) in sums[*l].iter_mut().zip(row) {
                *s += v;
            }
            counts[*l] += 1;
        }
        for (sum, count) in sums.iter_mut().zip(&counts) {
            if *count > 0 {
                sum.iter_mut().for_each(|s| *s /= *count as f64);
            }
        }
        sums
    }
}

/// Index and squared distance of the closest centroid; ties go to the lower index.
fn nearest_centroid(row: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (j, c) in centroids.iter().enumerate() {
        let d = squared_distance(row, c);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}
