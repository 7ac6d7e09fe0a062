use anyhow::{Context, Result};
use csv::ReaderBuilder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{Dataset, Table, Value};

/// Read a delimited file with a header row. `.gz` files are decompressed.
///
/// Cells are typed with [`Value::infer`]; ragged rows are padded.
pub fn load_table(path: &Path) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();
    let mut table = Table::new(headers);

    for result in csv_reader.records() {
        let record = result.with_context(|| format!("Malformed record in {}", path.display()))?;
        table.push_row(record.iter().map(Value::infer).collect());
    }

    Ok(table)
}

/// Location of a dataset's raw export, preferring the plain file over a
/// gzipped copy.
pub fn source_path(data_dir: &Path, dataset: Dataset) -> PathBuf {
    let plain = data_dir.join(dataset.source_file());
    if plain.exists() {
        return plain;
    }
    let gz = data_dir.join(format!("{}.gz", dataset.source_file()));
    if gz.exists() {
        gz
    } else {
        plain
    }
}

/// Load one raw dataset from the data directory. A missing file is fatal.
pub fn load_dataset(data_dir: &Path, dataset: Dataset) -> Result<Table> {
    let path = source_path(data_dir, dataset);
    info!("Loading {} from {}", dataset, path.display());
    let table = load_table(&path).with_context(|| format!("Failed to load {} dataset", dataset))?;
    info!("Loaded {} {} rows", table.len(), dataset);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_load_plain_and_gz() {
        let dir = tempfile::tempdir().unwrap();
        let body = "Latitude,Longitude,Name\n37.77,-122.42,Civic Center\n37.78,-122.41\n";

        let plain = dir.path().join(Dataset::Bathrooms.source_file());
        std::fs::write(&plain, body).unwrap();
        let table = load_dataset(dir.path(), Dataset::Bathrooms).unwrap();
        assert_eq!(table.columns(), &["Latitude", "Longitude", "Name"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, 0), &Value::Number(37.77));
        assert_eq!(table.value(1, 2), &Value::Empty);

        let gz_path = dir.path().join(format!("{}.gz", Dataset::Needles.source_file()));
        let mut encoder = GzEncoder::new(File::create(&gz_path).unwrap(), Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        encoder.finish().unwrap();
        let table = load_dataset(dir.path(), Dataset::Needles).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_missing_source_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_dataset(dir.path(), Dataset::Encampments).is_err());
    }
}
