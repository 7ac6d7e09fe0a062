//! Core data models for the pipeline.

pub mod collection;
pub mod dataset;
pub mod table;

pub use collection::{LabelSet, PointCollection, RecordId, CRS, LATITUDE, LONGITUDE, RECORD_ID};
pub use dataset::Dataset;
pub use table::{Table, Value};
