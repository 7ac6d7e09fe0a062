use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::models::{Dataset, Table, Value, LATITUDE, LONGITUDE};

/// Inclusive coordinate box a record must fall in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Default for GeoBounds {
    /// San Francisco, approximately
    fn default() -> Self {
        Self {
            min_lat: 37.70,
            max_lat: 37.85,
            min_lon: -122.52,
            max_lon: -122.35,
        }
    }
}

impl GeoBounds {
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Rows removed per reason
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub input_rows: usize,
    pub missing_coordinates: usize,
    pub zero_coordinates: usize,
    pub out_of_bounds: usize,
    pub kept: usize,
}

/// Lower-case headers and replace spaces with underscores.
pub fn standardize_column_names(table: &mut Table) {
    table.rename_columns(|c| c.to_lowercase().replace(' ', "_"));
}

/// Coerce `latitude`/`longitude` to numbers and drop rows that are missing,
/// zero, or outside `bounds`. Row order is preserved.
pub fn clean_coordinates(table: &mut Table, bounds: &GeoBounds) -> Result<CleanReport> {
    let lat_idx = table.require_column(LATITUDE)?;
    let lon_idx = table.require_column(LONGITUDE)?;

    for row in 0..table.len() {
        for idx in [lat_idx, lon_idx] {
            let coerced = table
                .value(row, idx)
                .as_f64()
                .filter(|v| v.is_finite())
                .map_or(Value::Empty, Value::Number);
            table.set_value(row, idx, coerced);
        }
    }

    let mut report = CleanReport {
        input_rows: table.len(),
        ..CleanReport::default()
    };
    table.retain_rows(|row| {
        let (Value::Number(lat), Value::Number(lon)) = (&row[lat_idx], &row[lon_idx]) else {
            report.missing_coordinates += 1;
            return false;
        };
        if *lat == 0.0 || *lon == 0.0 {
            report.zero_coordinates += 1;
            return false;
        }
        if !bounds.contains(*lat, *lon) {
            report.out_of_bounds += 1;
            return false;
        }
        true
    });
    report.kept = table.len();

    Ok(report)
}

/// Parse timestamp columns in place; unparseable cells become empty.
/// Columns that are not present are skipped.
pub fn coerce_dates(table: &mut Table, columns: &[&str]) {
    for column in columns {
        let Some(idx) = table.column_index(column) else {
            continue;
        };
        for row in 0..table.len() {
            let parsed = match table.value(row, idx) {
                Value::Date(_) | Value::Empty => continue,
                Value::Text(s) => Value::parse_date(s),
                other => Value::parse_date(&other.render()),
            };
            table.set_value(row, idx, parsed);
        }
    }
}

/// Full cleaning for one raw dataset.
pub fn clean_dataset(dataset: Dataset, table: &mut Table, bounds: &GeoBounds) -> Result<CleanReport> {
    standardize_column_names(table);
    let report = clean_coordinates(table, bounds)?;
    coerce_dates(table, dataset.date_columns());

    info!(
        "Cleaned {}: kept {} of {} rows ({} missing, {} zero, {} out of bounds)",
        dataset,
        report.kept,
        report.input_rows,
        report.missing_coordinates,
        report.zero_coordinates,
        report.out_of_bounds
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreetcareError;

    fn raw() -> Table {
        let mut table = Table::new(vec!["Latitude".into(), "Longitude".into(), "Opened".into()]);
        let rows = [
            ("37.77", "-122.42", "01/15/2019 03:04:05 PM"),
            ("", "-122.42", "2019-01-01"),
            ("0", "-122.42", ""),
            ("40.0", "-122.42", ""),
            ("37.80", "-122.40", "garbage"),
            ("abc", "-122.40", ""),
        ];
        for (lat, lon, opened) in rows {
            table.push_row(vec![Value::infer(lat), Value::infer(lon), Value::infer(opened)]);
        }
        table
    }

    #[test]
    fn test_clean_dataset() {
        let mut table = raw();
        let report = clean_dataset(Dataset::Needles, &mut table, &GeoBounds::default()).unwrap();

        assert_eq!(table.columns(), &["latitude", "longitude", "opened"]);
        assert_eq!(
            report,
            CleanReport {
                input_rows: 6,
                missing_coordinates: 2,
                zero_coordinates: 1,
                out_of_bounds: 1,
                kept: 2,
            }
        );
        assert_eq!(table.numeric_column("latitude").unwrap(), vec![37.77, 37.80]);
        assert!(matches!(table.value(0, 2), Value::Date(_)));
        assert_eq!(table.value(1, 2), &Value::Empty);
    }

    #[test]
    fn test_standardize_column_names() {
        let mut table = Table::new(vec!["Request Type".into(), "Observed Month".into()]);
        standardize_column_names(&mut table);
        assert_eq!(table.columns(), &["request_type", "observed_month"]);
    }

    #[test]
    fn test_missing_coordinate_column() {
        let mut table = Table::new(vec!["lat".into()]);
        assert!(matches!(
            clean_coordinates(&mut table, &GeoBounds::default()),
            Err(StreetcareError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let bounds = GeoBounds::default();
        assert!(bounds.contains(37.70, -122.52));
        assert!(bounds.contains(37.85, -122.35));
        assert!(!bounds.contains(37.6999, -122.40));
    }
}
