//! Per-cluster summaries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreetcareError};
use crate::models::{PointCollection, Value};

/// Size and mean position of one label group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub label: i32,
    pub count: usize,
    pub lat_center: f64,
    pub lon_center: f64,
}

/// Group records by the integer labels in `label_column`.
///
/// Noise is reported like any other label. Records with an empty label
/// cell belong to no group. Output is sorted by label.
pub fn cluster_stats(collection: &PointCollection, label_column: &str) -> Result<Vec<ClusterSummary>> {
    let table = collection.table();
    let idx = table.require_column(label_column)?;

    let mut groups: BTreeMap<i32, (usize, f64, f64)> = BTreeMap::new();
    for (row, point) in collection.geometry().iter().enumerate() {
        let label = match table.value(row, idx) {
            Value::Empty => continue,
            Value::Integer(l) => i32::try_from(*l).map_err(|_| StreetcareError::NonNumeric {
                column: label_column.to_string(),
                row,
            })?,
            _ => {
                return Err(StreetcareError::NonNumeric {
                    column: label_column.to_string(),
                    row,
                })
            }
        };
        let entry = groups.entry(label).or_insert((0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += point.y();
        entry.2 += point.x();
    }

    Ok(groups
        .into_iter()
        .map(|(label, (count, lat_sum, lon_sum))| ClusterSummary {
            label,
            count,
            lat_center: lat_sum / count as f64,
            lon_center: lon_sum / count as f64,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::collection::tests::collection;
    use crate::models::{Dataset, LabelSet};

    #[test]
    fn test_noise_is_its_own_group() {
        let mut c = collection(
            Dataset::Encampments,
            &[(37.70, -122.40), (37.72, -122.42), (37.80, -122.50), (37.76, -122.45)],
        );
        let labels = LabelSet::new(vec![0, 1, 2, 3], vec![0, 0, -1, 1]).unwrap();
        c.attach_labels("dbscan_cluster", &labels).unwrap();

        let stats = cluster_stats(&c, "dbscan_cluster").unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].label, -1);
        assert_eq!(stats[0].count, 1);
        assert_eq!(stats[1].label, 0);
        assert_eq!(stats[1].count, 2);
        assert!((stats[1].lat_center - 37.71).abs() < 1e-9);
        assert!((stats[1].lon_center + 122.41).abs() < 1e-9);
        assert_eq!(stats[2].count, 1);
    }

    #[test]
    fn test_missing_label_column() {
        let c = collection(Dataset::Encampments, &[(37.70, -122.40)]);
        assert!(cluster_stats(&c, "kmeans_cluster").is_err());
    }
}
