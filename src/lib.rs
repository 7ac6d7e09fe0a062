//! Streetcare - spatial analysis of San Francisco street-condition data
//!
//! This library provides shared types and modules for the integrate and
//! cluster binaries: loading and cleaning the three point datasets, nearest
//! facility and co-location annotations, and k-means/DBSCAN clustering.

pub mod clustering;
pub mod config;
pub mod error;
pub mod features;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod spatial;
pub mod store;

pub use error::{Result, StreetcareError};
pub use models::{Dataset, LabelSet, PointCollection, Table, Value};
