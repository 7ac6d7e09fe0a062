//! Console summaries of tables, emitted through the logger.

use tracing::info;

use crate::clustering::ClusterSummary;
use crate::models::Table;

const RULE: &str = "==================================================";

/// Shape, columns and per-column missing values.
pub fn log_dataset_info(table: &Table, name: &str) {
    info!("{}", RULE);
    info!("{} Information", name);
    info!("{}", RULE);
    info!("Shape: ({}, {})", table.len(), table.columns().len());
    info!("Columns: {:?}", table.columns());
    info!("Missing values:");
    for (column, missing) in table.missing_counts() {
        info!("  {:<32} {}", column, missing);
    }
    info!("{}", RULE);
}

pub fn log_cluster_stats(name: &str, label_column: &str, stats: &[ClusterSummary]) {
    info!("{} by {}:", name, label_column);
    for s in stats {
        info!(
            "  cluster {:>3}: {:>6} points, center ({:.5}, {:.5})",
            s.label, s.count, s.lat_center, s.lon_center
        );
    }
}
