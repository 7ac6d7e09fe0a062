//! Geolocated point collections.

use geo::Point;
use hashbrown::{HashMap, HashSet};
use tracing::debug;

use super::{Dataset, Table, Value};
use crate::error::{Result, StreetcareError};

/// Coordinate reference system of every collection: geographic WGS84, degrees.
pub const CRS: &str = "EPSG:4326";

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";
/// Stable identifier column carried through persistence and clustering.
pub const RECORD_ID: &str = "record_id";

pub type RecordId = u64;

/// An ordered, geolocated set of records from one dataset.
///
/// `geometry[i]` and `ids[i]` always describe table row `i`.
#[derive(Debug, Clone)]
pub struct PointCollection {
    dataset: Dataset,
    table: Table,
    ids: Vec<RecordId>,
    geometry: Vec<Point<f64>>,
}

impl PointCollection {
    /// Wrap a cleaned table into a point collection with `(longitude, latitude)`
    /// points in [`CRS`].
    ///
    /// Coordinates are assumed already validated; they are only read here.
    /// A `record_id` column is reused when present, otherwise assigned from
    /// row position and appended.
    pub fn geolocate(dataset: Dataset, mut table: Table) -> Result<Self> {
        let lat = table.numeric_column(LATITUDE)?;
        let lon = table.numeric_column(LONGITUDE)?;

        let ids = match table.column_index(RECORD_ID) {
            Some(idx) => read_ids(&table, idx)?,
            None => {
                let ids: Vec<RecordId> = (0..table.len() as RecordId).collect();
                let cells: Vec<Value> = ids.iter().map(|id| Value::Integer(*id as i64)).collect();
                table.add_column(RECORD_ID, cells)?;
                ids
            }
        };

        let geometry = lon
            .into_iter()
            .zip(lat)
            .map(|(x, y)| Point::new(x, y))
            .collect();

        debug!("Geolocated {} {} records", table.len(), dataset);

        Ok(Self {
            dataset,
            table,
            ids,
            geometry,
        })
    }

    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }

    pub fn geometry(&self) -> &[Point<f64>] {
        &self.geometry
    }

    pub fn len(&self) -> usize {
        self.geometry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    /// Difference between the northernmost and southernmost point, in degrees.
    pub fn latitude_span(&self) -> Option<f64> {
        let mut iter = self.geometry.iter().map(|p| p.y());
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(lo, hi), y| (lo.min(y), hi.max(y)));
        Some(max - min)
    }

    /// Append an annotation column, index-aligned to the records.
    pub fn annotate<V: Into<Value>>(&mut self, column: &str, values: Vec<V>) -> Result<()> {
        self.table.add_column(column, values)
    }

    /// Attach a label column by joining on record id.
    ///
    /// Records the label set does not mention get an empty cell.
    pub fn attach_labels(&mut self, column: &str, labels: &LabelSet) -> Result<()> {
        let known: HashSet<RecordId> = self.ids.iter().copied().collect();
        let mut by_id: HashMap<RecordId, i32> = HashMap::with_capacity(labels.len());
        for (id, label) in labels.iter() {
            if !known.contains(&id) {
                return Err(StreetcareError::UnknownRecord(id));
            }
            by_id.insert(id, label);
        }

        let cells: Vec<Value> = self
            .ids
            .iter()
            .map(|id| by_id.get(id).map_or(Value::Empty, |l| Value::from(*l)))
            .collect();
        self.table.add_column(column, cells)
    }
}

fn read_ids(table: &Table, idx: usize) -> Result<Vec<RecordId>> {
    let mut seen = HashSet::with_capacity(table.len());
    let mut ids = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let id = match table.value(row, idx) {
            Value::Integer(i) if *i >= 0 => *i as RecordId,
            _ => {
                return Err(StreetcareError::NonNumeric {
                    column: RECORD_ID.to_string(),
                    row,
                })
            }
        };
        if !seen.insert(id) {
            return Err(StreetcareError::InvalidParameter(format!(
                "duplicate record id {} at row {}",
                id, row
            )));
        }
        ids.push(id);
    }
    Ok(ids)
}

/// Cluster labels keyed by record id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    ids: Vec<RecordId>,
    labels: Vec<i32>,
}

impl LabelSet {
    pub fn new(ids: Vec<RecordId>, labels: Vec<i32>) -> Result<Self> {
        if ids.len() != labels.len() {
            return Err(StreetcareError::LengthMismatch {
                column: "labels".to_string(),
                expected: ids.len(),
                actual: labels.len(),
            });
        }
        Ok(Self { ids, labels })
    }

    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, i32)> + '_ {
        self.ids.iter().copied().zip(self.labels.iter().copied())
    }

    /// Number of distinct labels, noise included.
    pub fn distinct(&self) -> usize {
        self.labels.iter().collect::<HashSet<_>>().len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a collection from `(lat, lon)` pairs.
    pub(crate) fn collection(dataset: Dataset, coords: &[(f64, f64)]) -> PointCollection {
        let mut table = Table::new(vec![LATITUDE.into(), LONGITUDE.into()]);
        for (lat, lon) in coords {
            table.push_row(vec![Value::Number(*lat), Value::Number(*lon)]);
        }
        PointCollection::geolocate(dataset, table).unwrap()
    }

    #[test]
    fn test_geolocate_orders_lon_lat() {
        let c = collection(Dataset::Bathrooms, &[(37.78, -122.41), (37.76, -122.42)]);
        assert_eq!(c.geometry()[0], Point::new(-122.41, 37.78));
        assert_eq!(c.ids(), &[0, 1]);
        assert_eq!(c.table().column_index(RECORD_ID), Some(2));
        assert!((c.latitude_span().unwrap() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_geolocate_reuses_record_ids() {
        let mut table = Table::new(vec![LATITUDE.into(), LONGITUDE.into(), RECORD_ID.into()]);
        table.push_row(vec![Value::Number(37.7), Value::Number(-122.4), Value::Integer(7)]);
        table.push_row(vec![Value::Number(37.8), Value::Number(-122.4), Value::Integer(3)]);
        let c = PointCollection::geolocate(Dataset::Needles, table).unwrap();
        assert_eq!(c.ids(), &[7, 3]);
        assert_eq!(c.table().columns().len(), 3);
    }

    #[test]
    fn test_geolocate_requires_coordinates() {
        let table = Table::new(vec![LATITUDE.into()]);
        assert!(matches!(
            PointCollection::geolocate(Dataset::Needles, table),
            Err(StreetcareError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_attach_labels_joins_by_id() {
        let mut c = collection(Dataset::Needles, &[(37.7, -122.4), (37.71, -122.4), (37.72, -122.4)]);
        // Out of order and missing record 1
        let labels = LabelSet::new(vec![2, 0], vec![5, -1]).unwrap();
        c.attach_labels("dbscan_cluster", &labels).unwrap();

        let idx = c.table().column_index("dbscan_cluster").unwrap();
        assert_eq!(c.table().value(0, idx), &Value::Integer(-1));
        assert_eq!(c.table().value(1, idx), &Value::Empty);
        assert_eq!(c.table().value(2, idx), &Value::Integer(5));
    }

    #[test]
    fn test_attach_labels_rejects_unknown_ids() {
        let mut c = collection(Dataset::Needles, &[(37.7, -122.4)]);
        let labels = LabelSet::new(vec![9], vec![0]).unwrap();
        assert!(matches!(
            c.attach_labels("kmeans_cluster", &labels),
            Err(StreetcareError::UnknownRecord(9))
        ));
    }
}
