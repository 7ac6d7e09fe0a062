//! Error taxonomy for the core library.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreetcareError>;

#[derive(Debug, Error)]
pub enum StreetcareError {
    #[error("column '{column}' not found")]
    MissingColumn { column: String },

    #[error("column '{column}' holds a non-numeric value at row {row}")]
    NonNumeric { column: String, row: usize },

    #[error("column '{column}' already exists")]
    DuplicateColumn { column: String },

    #[error("column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("nearest-point query from '{source_name}' against empty collection '{target_name}'")]
    EmptyTarget {
        source_name: String,
        target_name: String,
    },

    #[error("feature column list is empty")]
    EmptyFeatureList,

    #[error("requested {k} clusters but only {distinct} distinct points")]
    TooManyClusters { k: usize, distinct: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("record id {0} is not part of the collection")]
    UnknownRecord(u64),
}
