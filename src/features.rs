//! Feature matrix extraction.

use crate::error::{Result, StreetcareError};
use crate::models::{PointCollection, RecordId};

/// Dense row-major matrix, one row per record, carrying the record ids.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    ids: Vec<RecordId>,
    columns: Vec<String>,
    data: Vec<f64>,
}

impl FeatureMatrix {
    /// Build from explicit rows; every row must have `columns.len()` values.
    pub fn from_rows(ids: Vec<RecordId>, columns: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(StreetcareError::EmptyFeatureList);
        }
        if ids.len() != rows.len() {
            return Err(StreetcareError::LengthMismatch {
                column: "record ids".to_string(),
                expected: rows.len(),
                actual: ids.len(),
            });
        }
        let mut data = Vec::with_capacity(rows.len() * columns.len());
        for row in rows {
            if row.len() != columns.len() {
                return Err(StreetcareError::LengthMismatch {
                    column: "feature row".to_string(),
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Self { ids, columns, data })
    }

    pub fn ids(&self) -> &[RecordId] {
        &self.ids
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.ids.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.n_cols();
        &self.data[i * n..(i + 1) * n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.n_cols())
    }

    /// Same ids and columns, new values (used by scaling).
    pub(crate) fn with_data(&self, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            ids: self.ids.clone(),
            columns: self.columns.clone(),
            data,
        }
    }
}

/// Extract the requested columns, in order, as a dense matrix.
///
/// No normalization happens here. Integer and boolean cells are read as
/// numbers; anything else without a numeric reading fails.
pub fn prepare_features<S: AsRef<str>>(
    collection: &PointCollection,
    columns: &[S],
) -> Result<FeatureMatrix> {
    if columns.is_empty() {
        return Err(StreetcareError::EmptyFeatureList);
    }

    let table = collection.table();
    let values: Vec<Vec<f64>> = columns
        .iter()
        .map(|c| table.numeric_column(c.as_ref()))
        .collect::<Result<_>>()?;

    let n_cols = columns.len();
    let mut data = Vec::with_capacity(table.len() * n_cols);
    for row in 0..table.len() {
        data.extend(values.iter().map(|col| col[row]));
    }

    Ok(FeatureMatrix {
        ids: collection.ids().to_vec(),
        columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        data,
    })
}
