//! Spatial relationships between point collections.
//!
//! Distances are computed in degree space over an R-tree index and converted
//! to meters with a fixed local scale (see [`projection`]).

pub mod integrate;
mod index;
pub mod projection;
mod relations;

pub use index::{IndexedPoint, PointIndex};
pub use integrate::{integrate, Collections, IntegrationParams, IntegrationSummary};
pub use projection::DegreeScale;
pub use relations::{Nearest, RelationEngine, UnderservedRule};
