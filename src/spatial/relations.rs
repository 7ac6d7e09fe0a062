//! Nearest-point distances and radius counts between two collections.

use geo::Point;
use serde::{Deserialize, Serialize};

use super::{DegreeScale, PointIndex};
use crate::error::{Result, StreetcareError};
use crate::models::PointCollection;

/// Service distance past which a point counts as underserved.
pub const DEFAULT_UNDERSERVED_THRESHOLD_M: f64 = 800.0;

/// Nearest target per source point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Nearest {
    pub distances_m: Vec<f64>,
    pub indices: Vec<usize>,
}

/// Distance/count queries in meters over degree coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationEngine {
    scale: DegreeScale,
}

impl RelationEngine {
    pub fn new(scale: DegreeScale) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> DegreeScale {
        self.scale
    }

    /// Distance to the closest target point for every source point.
    ///
    /// An empty target has no nearest point and is an error.
    pub fn nearest(&self, source: &PointCollection, target: &PointCollection) -> Result<Nearest> {
        let index = PointIndex::build(target.geometry());
        self.nearest_indexed(source, target, &index)
    }

    /// Same as [`RelationEngine::nearest`] with a prebuilt index over `target`.
    pub fn nearest_indexed(
        &self,
        source: &PointCollection,
        target: &PointCollection,
        index: &PointIndex,
    ) -> Result<Nearest> {
        if index.is_empty() {
            return Err(StreetcareError::EmptyTarget {
                source_name: source.dataset().to_string(),
                target_name: target.dataset().to_string(),
            });
        }

        let mut result = Nearest {
            distances_m: Vec::with_capacity(source.len()),
            indices: Vec::with_capacity(source.len()),
        };
        for point in source.geometry() {
            // Index is non-empty, so every query has an answer
            if let Some((row, dist_deg)) = index.nearest(point) {
                result.distances_m.push(self.scale.to_meters(dist_deg));
                result.indices.push(row);
            }
        }
        Ok(result)
    }

    /// Number of target points within `radius_m` (inclusive) of each source point.
    pub fn count_within(
        &self,
        source: &PointCollection,
        target: &PointCollection,
        radius_m: f64,
    ) -> Vec<usize> {
        let index = PointIndex::build(target.geometry());
        self.count_within_indexed(source, &index, radius_m)
    }

    pub fn count_within_indexed(
        &self,
        source: &PointCollection,
        index: &PointIndex,
        radius_m: f64,
    ) -> Vec<usize> {
        source
            .geometry()
            .iter()
            .map(|point| self.count_around(point, index, radius_m))
            .collect()
    }

    fn count_around(&self, point: &Point<f64>, index: &PointIndex, radius_m: f64) -> usize {
        if radius_m < 0.0 {
            return 0;
        }
        // Slightly widened box so rounding in the conversion never drops a
        // point the exact meter comparison would keep.
        let radius_deg = self.scale.to_degrees(radius_m) * (1.0 + 1e-9);
        let query = [point.x(), point.y()];
        index
            .candidates_within(point, radius_deg)
            .filter(|ip| self.scale.to_meters(ip.distance_deg(&query)) <= radius_m)
            .count()
    }
}

/// Strict threshold on nearest-facility distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnderservedRule {
    pub threshold_m: f64,
}

impl Default for UnderservedRule {
    fn default() -> Self {
        Self {
            threshold_m: DEFAULT_UNDERSERVED_THRESHOLD_M,
        }
    }
}

impl UnderservedRule {
    pub fn is_underserved(&self, nearest_facility_m: f64) -> bool {
        nearest_facility_m > self.threshold_m
    }

    pub fn flags(&self, distances_m: &[f64]) -> Vec<bool> {
        distances_m.iter().map(|d| self.is_underserved(*d)).collect()
    }
}
