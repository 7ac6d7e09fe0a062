//! Clustering of feature matrices.
//!
//! Both algorithms work on standardized features (zero mean, unit variance
//! per column, fitted on the matrix being clustered) and return labels keyed
//! by record id, so re-attaching them never depends on row order.

mod dbscan;
mod kmeans;
mod scale;
mod stats;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::features::FeatureMatrix;
use crate::models::LabelSet;

pub use dbscan::{Dbscan, NOISE};
pub use kmeans::{KMeans, KMeansFit};
pub use scale::StandardScaler;
pub use stats::{cluster_stats, ClusterSummary};

/// Column names for the two label annotations
pub const KMEANS_COLUMN: &str = "kmeans_cluster";
pub const DBSCAN_COLUMN: &str = "dbscan_cluster";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterParams {
    pub k: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub seed: u64,
    pub eps: f64,
    pub min_samples: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            k: 5,
            n_init: kmeans::DEFAULT_N_INIT,
            max_iter: kmeans::DEFAULT_MAX_ITER,
            seed: kmeans::DEFAULT_SEED,
            eps: dbscan::DEFAULT_EPS,
            min_samples: dbscan::DEFAULT_MIN_SAMPLES,
        }
    }
}

impl ClusterParams {
    pub fn kmeans(&self) -> KMeans {
        KMeans::new(self.k)
            .with_n_init(self.n_init)
            .with_max_iter(self.max_iter)
            .with_seed(self.seed)
    }

    pub fn dbscan(&self) -> Dbscan {
        Dbscan::new(self.eps, self.min_samples)
    }
}

/// Labels from both algorithms for one matrix
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOutcome {
    pub kmeans: LabelSet,
    pub dbscan: LabelSet,
}

/// Standardize `features` and run k-means and DBSCAN on the result.
///
/// All parameters are validated before any work starts.
pub fn cluster(features: &FeatureMatrix, params: &ClusterParams) -> Result<ClusterOutcome> {
    let kmeans = params.kmeans();
    let dbscan = params.dbscan();
    kmeans.validate(features)?;
    dbscan.validate()?;

    let scaled = StandardScaler::fit_transform(features);
    let (km, db) = rayon::join(|| kmeans.fit_predict(&scaled), || dbscan.fit_predict(&scaled));
    let outcome = ClusterOutcome {
        kmeans: km?,
        dbscan: db?,
    };

    info!(
        "Clustered {} rows on {:?}: {} k-means clusters, {} DBSCAN groups",
        features.n_rows(),
        features.columns(),
        outcome.kmeans.distinct(),
        outcome.dbscan.distinct()
    );
    Ok(outcome)
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Number of distinct rows (bitwise, with -0.0 folded into 0.0).
pub(crate) fn count_distinct(data: &FeatureMatrix) -> usize {
    data.rows()
        .map(|row| {
            row.iter()
                .map(|v| if *v == 0.0 { 0u64 } else { v.to_bits() })
                .collect::<Vec<u64>>()
        })
        .collect::<HashSet<_>>()
        .len()
}
