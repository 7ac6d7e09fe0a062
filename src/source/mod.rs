//! Raw dataset loading and cleaning.
//!
//! Produces validated tables: standardized column names, finite in-bounds
//! coordinates and parsed timestamps.

mod clean;
mod loader;

pub use clean::{
    clean_coordinates, clean_dataset, coerce_dates, standardize_column_names, CleanReport,
    GeoBounds,
};
pub use loader::{load_dataset, load_table, source_path};
