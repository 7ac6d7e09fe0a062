//! Raw tabular records as read from and written to delimited text.

use chrono::NaiveDateTime;

use crate::error::{Result, StreetcareError};

/// Timestamp layout used when writing date cells.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Date(NaiveDateTime),
    Text(String),
}

impl Value {
    /// Infer a typed value from a raw cell.
    ///
    /// Dates are not inferred here; they are only produced for columns
    /// known to hold timestamps (see [`Value::parse_date`]).
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return Value::Empty;
        }
        match raw {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Integer(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Number(f);
        }
        Value::Text(raw.to_string())
    }

    /// Parse a timestamp written by [`Value::render`] or by the source feeds.
    /// Unparseable input yields `Value::Empty`.
    pub fn parse_date(raw: &str) -> Self {
        const FORMATS: [&str; 3] = ["%m/%d/%Y %I:%M:%S %p", DATE_FORMAT, "%Y-%m-%dT%H:%M:%S%.f"];
        const DATE_ONLY: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

        let raw = raw.trim();
        for fmt in FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Value::Date(ts);
            }
        }
        for fmt in DATE_ONLY {
            if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, fmt) {
                if let Some(ts) = d.and_hms_opt(0, 0, 0) {
                    return Value::Date(ts);
                }
            }
        }
        Value::Empty
    }

    /// Numeric view of the cell. Booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Empty | Value::Date(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Text form written to CSV. Floats use the debug form so that integral
    /// values keep their decimal point and reload as numbers.
    pub fn render(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Number(f) => format!("{:?}", f),
            Value::Date(ts) => ts.format(DATE_FORMAT).to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Row-oriented table with a header. Row order is the source order and is
/// never changed by annotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; short rows are padded with empty cells, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Empty);
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| StreetcareError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub fn value(&self, row: usize, column: usize) -> &Value {
        &self.rows[row][column]
    }

    /// Read a whole column as `f64`. Fails on the first cell without a
    /// numeric reading.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.require_column(name)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                cells[idx].as_f64().ok_or_else(|| StreetcareError::NonNumeric {
                    column: name.to_string(),
                    row,
                })
            })
            .collect()
    }

    /// Add a new column. Annotation is additive: an existing name is rejected.
    pub fn add_column<V: Into<Value>>(&mut self, name: &str, values: Vec<V>) -> Result<()> {
        if self.column_index(name).is_some() {
            return Err(StreetcareError::DuplicateColumn {
                column: name.to_string(),
            });
        }
        if values.len() != self.rows.len() {
            return Err(StreetcareError::LengthMismatch {
                column: name.to_string(),
                expected: self.rows.len(),
                actual: values.len(),
            });
        }
        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value.into());
        }
        Ok(())
    }

    /// Rename every header in place.
    pub fn rename_columns<F: Fn(&str) -> String>(&mut self, f: F) {
        for column in &mut self.columns {
            *column = f(column);
        }
    }

    /// Replace a cell in place (cleaning only).
    pub fn set_value(&mut self, row: usize, column: usize, value: Value) {
        self.rows[row][column] = value;
    }

    /// Keep only the rows for which `keep` returns true, preserving order.
    pub fn retain_rows<F: FnMut(&[Value]) -> bool>(&mut self, mut keep: F) {
        self.rows.retain(|row| keep(row));
    }

    /// Number of empty cells per column, in header order.
    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let missing = self.rows.iter().filter(|r| r[idx].is_empty()).count();
                (name.clone(), missing)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_keeps_float_type_after_render() {
        let v = Value::Number(5.0);
        assert_eq!(v.render(), "5.0");
        assert_eq!(Value::infer(&v.render()), v);
        assert_eq!(Value::infer("12"), Value::Integer(12));
        assert_eq!(Value::infer("true"), Value::Bool(true));
        assert_eq!(Value::infer("Mission St"), Value::Text("Mission St".into()));
        assert_eq!(Value::infer(""), Value::Empty);
    }

    #[test]
    fn test_parse_date_formats() {
        let Value::Date(ts) = Value::parse_date("01/15/2019 03:04:05 PM") else {
            panic!("expected date");
        };
        let expected = chrono::NaiveDate::from_ymd_opt(2019, 1, 15)
            .and_then(|d| d.and_hms_opt(15, 4, 5))
            .unwrap();
        assert_eq!(ts, expected);
        assert_eq!(Value::parse_date(&Value::Date(ts).render()), Value::Date(ts));
        assert!(matches!(Value::parse_date("2021-06-01"), Value::Date(_)));
        assert_eq!(Value::parse_date("not a date"), Value::Empty);
    }

    #[test]
    fn test_add_column_rejects_duplicates_and_bad_lengths() {
        let mut table = Table::new(vec!["a".into()]);
        table.push_row(vec![Value::Integer(1)]);
        table.push_row(vec![Value::Integer(2)]);

        assert!(matches!(
            table.add_column("a", vec![1.0, 2.0]),
            Err(StreetcareError::DuplicateColumn { .. })
        ));
        assert!(matches!(
            table.add_column("b", vec![1.0]),
            Err(StreetcareError::LengthMismatch { .. })
        ));
        table.add_column("b", vec![1.5, 2.5]).unwrap();
        assert_eq!(table.numeric_column("b").unwrap(), vec![1.5, 2.5]);
    }

    #[test]
    fn test_numeric_column_errors() {
        let mut table = Table::new(vec!["name".into()]);
        table.push_row(vec![Value::Text("x".into())]);
        assert!(matches!(
            table.numeric_column("name"),
            Err(StreetcareError::NonNumeric { row: 0, .. })
        ));
        assert!(matches!(
            table.numeric_column("missing"),
            Err(StreetcareError::MissingColumn { .. })
        ));
    }
}
