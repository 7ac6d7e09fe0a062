//! Degree to meter conversion.
//!
//! Distances are measured as planar Euclidean distances in degree space and
//! scaled by `111000 * cos(reference_latitude)`. This is a local
//! approximation, not a geodesic distance: it treats one degree of either
//! axis as the length of a longitude degree at the reference latitude. It is
//! only reasonable for small regions near that latitude and away from the
//! poles.

use serde::{Deserialize, Serialize};

/// Meters per degree of latitude used by the approximation.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Reference latitude of San Francisco.
pub const DEFAULT_REFERENCE_LATITUDE: f64 = 37.77;

/// Latitude span (degrees) past which results get noticeably inaccurate.
pub const MAX_ACCURATE_SPAN_DEG: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegreeScale {
    reference_latitude: f64,
}

impl Default for DegreeScale {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_LATITUDE)
    }
}

impl DegreeScale {
    pub fn new(reference_latitude: f64) -> Self {
        Self { reference_latitude }
    }

    pub fn reference_latitude(&self) -> f64 {
        self.reference_latitude
    }

    pub fn meters_per_degree(&self) -> f64 {
        METERS_PER_DEGREE * self.reference_latitude.to_radians().cos()
    }

    pub fn to_meters(&self, degrees: f64) -> f64 {
        degrees * self.meters_per_degree()
    }

    pub fn to_degrees(&self, meters: f64) -> f64 {
        meters / self.meters_per_degree()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_factor() {
        let scale = DegreeScale::default();
        let expected = 111_000.0 * 37.77_f64.to_radians().cos();
        assert_eq!(scale.meters_per_degree(), expected);
        // Roughly 87.74 km per degree around San Francisco
        assert!((scale.meters_per_degree() - 87_742.8).abs() < 1.0);
    }

    #[test]
    fn test_conversion_inverts() {
        let scale = DegreeScale::new(45.0);
        let deg = scale.to_degrees(500.0);
        assert!((scale.to_meters(deg) - 500.0).abs() < 1e-9);
    }
}
