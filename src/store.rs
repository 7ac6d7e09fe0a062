//! Persistence of annotated collections and the processed-file cache.
//!
//! Every file is written to a temporary file in its destination directory
//! first; nothing is moved into place until all files of a stage have been
//! written successfully.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use xxhash_rust::xxh64::Xxh64;

use crate::models::{Dataset, PointCollection, Table, Value};
use crate::source::{coerce_dates, load_table};
use crate::spatial::IntegrationParams;

pub const MANIFEST_FILE: &str = "manifest.json";

/// A file ready to be written into a stage directory
pub enum Output<'a> {
    Table { file_name: String, table: &'a Table },
    Json { file_name: String, value: serde_json::Value },
}

impl Output<'_> {
    fn file_name(&self) -> &str {
        match self {
            Output::Table { file_name, .. } | Output::Json { file_name, .. } => file_name,
        }
    }
}

/// Write all outputs into `dir`, replacing existing files only once every
/// output has been staged.
///
/// Each file is replaced atomically, but the set is not: if a rename fails
/// midway, earlier files are already new. Tables are therefore moved into
/// place before JSON outputs, so an interrupted stage keeps the previous
/// manifest and `cache_status` reports the mix as stale.
pub fn write_stage(dir: &Path, outputs: &[Output<'_>]) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut staged = Vec::with_capacity(outputs.len());
    for output in outputs {
        let (tmp, is_json) = match output {
            Output::Table { table, .. } => (stage_table(dir, table)?, false),
            Output::Json { value, .. } => (stage_json(dir, value)?, true),
        };
        staged.push((is_json, tmp, dir.join(output.file_name())));
    }
    // stable: tables keep their order, JSON goes last
    staged.sort_by_key(|(is_json, _, _)| *is_json);

    for (_, tmp, path) in staged {
        tmp.persist(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn stage_table(dir: &Path, table: &Table) -> Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(table.columns())?;
        for row in table.rows() {
            writer.write_record(row.iter().map(Value::render))?;
        }
        writer.flush()?;
    }
    Ok(tmp)
}

fn stage_json(dir: &Path, value: &serde_json::Value) -> Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), value)?;
    tmp.as_file_mut().write_all(b"\n")?;
    Ok(tmp)
}

/// Reload a persisted collection, re-parsing its timestamp columns and
/// rebuilding geometry from latitude/longitude.
pub fn read_collection(path: &Path, dataset: Dataset) -> Result<PointCollection> {
    let mut table = load_table(path)?;
    coerce_dates(&mut table, dataset.date_columns());
    let collection = PointCollection::geolocate(dataset, table)
        .with_context(|| format!("Invalid coordinates in {}", path.display()))?;
    debug!("Read {} {} records from {}", collection.len(), dataset, path.display());
    Ok(collection)
}

/// What the processed directory holds relative to the current inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// At least one processed file is absent
    Missing,
    /// Files present without a readable manifest
    Unverified,
    /// Files present and the manifest matches the inputs
    Fresh,
    /// Files present but produced from different inputs or parameters
    Stale,
}

impl CacheStatus {
    /// Presence alone makes a valid cache; a mismatching manifest only
    /// counts when verification is requested.
    pub fn is_usable(&self, verify: bool) -> bool {
        match self {
            CacheStatus::Missing => false,
            CacheStatus::Unverified | CacheStatus::Fresh => true,
            CacheStatus::Stale => !verify,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub params: IntegrationParams,
}

/// Content hash of the cleaned input tables and the spatial parameters.
pub fn cache_key(tables: &[(Dataset, &Table)], params: &IntegrationParams) -> Result<String> {
    let mut hasher = Xxh64::new(0);
    for (dataset, table) in tables {
        hasher.update(dataset.stem().as_bytes());
        for column in table.columns() {
            hasher.update(column.as_bytes());
            hasher.update(&[0x1f]);
        }
        for row in table.rows() {
            for cell in row {
                hasher.update(cell.render().as_bytes());
                hasher.update(&[0x1f]);
            }
            hasher.update(&[0x1e]);
        }
    }
    hasher.update(&serde_json::to_vec(params)?);
    Ok(format!("{:016x}", hasher.digest()))
}

/// Whether every processed file exists in `dir`.
pub fn processed_files_present(dir: &Path) -> bool {
    Dataset::all()
        .iter()
        .all(|d| dir.join(d.processed_file()).exists())
}

pub fn cache_status(dir: &Path, expected_key: &str) -> CacheStatus {
    if !processed_files_present(dir) {
        return CacheStatus::Missing;
    }

    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest: Option<CacheManifest> = fs::read_to_string(&manifest_path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok());
    match manifest {
        None => CacheStatus::Unverified,
        Some(m) if m.key == expected_key => CacheStatus::Fresh,
        Some(m) => {
            warn!(
                "Processed files were built from different inputs (manifest {}, current {})",
                m.key, expected_key
            );
            CacheStatus::Stale
        }
    }
}
