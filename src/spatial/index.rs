//! R-tree over the points of one collection.

use geo::Point;
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use tracing::debug;

/// A collection point with its row position
#[derive(Debug, Clone, Copy)]
pub struct IndexedPoint {
    pub row: usize,
    coord: [f64; 2],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coord)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.coord[0] - point[0];
        let dy = self.coord[1] - point[1];
        dx * dx + dy * dy
    }
}

impl IndexedPoint {
    /// Planar distance in degrees.
    pub fn distance_deg(&self, point: &[f64; 2]) -> f64 {
        self.distance_2(point).sqrt()
    }
}

/// Spatial index built once per target collection.
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    pub fn build(points: &[Point<f64>]) -> Self {
        let indexed: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .map(|(row, p)| IndexedPoint {
                row,
                coord: [p.x(), p.y()],
            })
            .collect();

        let tree = RTree::bulk_load(indexed);
        debug!("Point index built with {} entries", tree.size());
        Self { tree }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Closest indexed point and its planar distance in degrees.
    pub fn nearest(&self, point: &Point<f64>) -> Option<(usize, f64)> {
        let query = [point.x(), point.y()];
        self.tree
            .nearest_neighbor(&query)
            .map(|ip| (ip.row, ip.distance_deg(&query)))
    }

    /// Indexed points inside the square of half-width `radius_deg` around
    /// `point`. Callers filter the candidates with their exact distance rule.
    pub fn candidates_within(
        &self,
        point: &Point<f64>,
        radius_deg: f64,
    ) -> impl Iterator<Item = &IndexedPoint> {
        let envelope = AABB::from_corners(
            [point.x() - radius_deg, point.y() - radius_deg],
            [point.x() + radius_deg, point.y() + radius_deg],
        );
        self.tree.locate_in_envelope_intersecting(&envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_index() {
        let index = PointIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.nearest(&Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn test_nearest_and_candidates() {
        let points = [Point::new(0.0, 0.0), Point::new(3.0, 4.0), Point::new(10.0, 10.0)];
        let index = PointIndex::build(&points);

        let (row, dist) = index.nearest(&Point::new(3.0, 3.0)).unwrap();
        assert_eq!(row, 1);
        assert!((dist - 1.0).abs() < 1e-12);

        let mut rows: Vec<usize> = index
            .candidates_within(&Point::new(1.0, 1.0), 3.0)
            .map(|ip| ip.row)
            .collect();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 1]);
    }
}
