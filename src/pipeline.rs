//! Stage orchestration shared by the `integrate` and `cluster` binaries.
//!
//! Each stage computes all of its results in memory and only then hands the
//! complete set of output files to [`write_stage`], so a failure never leaves
//! a partially written stage behind.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::clustering::{
    cluster, cluster_stats, ClusterParams, ClusterSummary, DBSCAN_COLUMN, KMEANS_COLUMN,
};
use crate::config::PipelineConfig;
use crate::features::prepare_features;
use crate::models::{Dataset, PointCollection, Table};
use crate::report::{log_cluster_stats, log_dataset_info};
use crate::source::{clean_dataset, load_dataset};
use crate::spatial::{integrate, Collections, IntegrationSummary};
use crate::store::{
    cache_key, cache_status, read_collection, write_stage, CacheManifest, Output, MANIFEST_FILE,
};

pub const SUMMARY_FILE: &str = "summary.json";

/// One value per dataset
#[derive(Debug, Clone)]
pub struct PerDataset<T> {
    pub needles: T,
    pub encampments: T,
    pub bathrooms: T,
}

impl<T> PerDataset<T> {
    pub fn try_build<F>(mut f: F) -> Result<Self>
    where
        F: FnMut(Dataset) -> Result<T>,
    {
        Ok(Self {
            needles: f(Dataset::Needles)?,
            encampments: f(Dataset::Encampments)?,
            bathrooms: f(Dataset::Bathrooms)?,
        })
    }

    pub fn get(&self, dataset: Dataset) -> &T {
        match dataset {
            Dataset::Needles => &self.needles,
            Dataset::Encampments => &self.encampments,
            Dataset::Bathrooms => &self.bathrooms,
        }
    }

    pub fn get_mut(&mut self, dataset: Dataset) -> &mut T {
        match dataset {
            Dataset::Needles => &mut self.needles,
            Dataset::Encampments => &mut self.encampments,
            Dataset::Bathrooms => &mut self.bathrooms,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dataset, &T)> + '_ {
        Dataset::all().iter().map(move |d| (*d, self.get(*d)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrateOptions {
    /// Recompute even when processed files exist
    pub force: bool,
    /// Treat processed files built from other inputs as stale
    pub verify_cache: bool,
}

/// Result of the integrate stage
#[derive(Debug)]
pub struct Integrated {
    pub collections: PerDataset<PointCollection>,
    /// `None` when the processed files were reused
    pub summary: Option<IntegrationSummary>,
}

/// Load every raw dataset and clean it, logging a report before and after.
pub fn load_clean(config: &PipelineConfig) -> Result<PerDataset<Table>> {
    PerDataset::try_build(|dataset| {
        let mut table = load_dataset(&config.paths.data_dir, dataset)?;
        log_dataset_info(&table, &format!("{} (raw)", dataset));
        clean_dataset(dataset, &mut table, &config.bounds)
            .with_context(|| format!("Failed to clean {} dataset", dataset))?;
        log_dataset_info(&table, &format!("{} (cleaned)", dataset));
        Ok(table)
    })
}

/// Load, clean and spatially integrate the three datasets, writing the
/// processed files.
///
/// Raw inputs are always loaded and cleaned, so a missing source file is
/// fatal even on a cache hit. Existing processed files are reused unless
/// `force` is set or, with `verify_cache`, the manifest does not match the
/// cleaned inputs.
pub fn run_integration(
    config: &PipelineConfig,
    options: IntegrateOptions,
    progress: &ProgressBar,
) -> Result<Integrated> {
    let dir = &config.paths.processed_dir;
    let params = config.spatial.params();

    let tables = load_clean(config)?;
    let key = cache_key(&table_refs(&tables), &params)?;

    if !options.force && cache_status(dir, &key).is_usable(options.verify_cache) {
        info!(
            "Processed files found in {}; skipping spatial integration",
            dir.display()
        );
        let collections = load_processed(dir)?;
        return Ok(Integrated {
            collections,
            summary: None,
        });
    }

    let PerDataset {
        needles,
        encampments,
        bathrooms,
    } = tables;
    let mut collections = PerDataset {
        needles: geolocate(Dataset::Needles, needles)?,
        encampments: geolocate(Dataset::Encampments, encampments)?,
        bathrooms: geolocate(Dataset::Bathrooms, bathrooms)?,
    };

    info!("Performing spatial integration...");
    let summary = integrate(
        Collections {
            needles: &mut collections.needles,
            encampments: &mut collections.encampments,
            bathrooms: &mut collections.bathrooms,
        },
        &params,
        progress,
    )?;

    let manifest = CacheManifest {
        key,
        created_at: Utc::now(),
        params,
    };
    {
        let mut outputs: Vec<Output> = collections
            .iter()
            .map(|(dataset, c)| Output::Table {
                file_name: dataset.processed_file(),
                table: c.table(),
            })
            .collect();
        outputs.push(Output::Json {
            file_name: MANIFEST_FILE.to_string(),
            value: serde_json::to_value(&manifest)?,
        });
        write_stage(dir, &outputs)?;
    }

    for (dataset, c) in collections.iter() {
        log_dataset_info(c.table(), &format!("{} (spatial)", dataset));
    }

    Ok(Integrated {
        collections,
        summary: Some(summary),
    })
}

fn table_refs(tables: &PerDataset<Table>) -> Vec<(Dataset, &Table)> {
    tables.iter().collect()
}

fn geolocate(dataset: Dataset, table: Table) -> Result<PointCollection> {
    PointCollection::geolocate(dataset, table)
        .with_context(|| format!("Failed to geolocate {} dataset", dataset))
}

/// Reload the processed collections written by the integrate stage.
pub fn load_processed(dir: &Path) -> Result<PerDataset<PointCollection>> {
    PerDataset::try_build(|dataset| {
        let path = dir.join(dataset.processed_file());
        if !path.exists() {
            bail!(
                "{} not found; run the integrate step first",
                path.display()
            );
        }
        read_collection(&path, dataset)
    })
}

/// Labels and statistics for one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetClusters {
    pub dataset: Dataset,
    pub rows: usize,
    pub features: Vec<String>,
    pub kmeans: Vec<ClusterSummary>,
    pub dbscan: Vec<ClusterSummary>,
}

/// Contents of `summary.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringSummary {
    pub created_at: DateTime<Utc>,
    pub params: ClusterParams,
    pub datasets: Vec<DatasetClusters>,
}

/// Cluster every processed collection and write the clustered files plus
/// `summary.json`. Nothing is written unless all three datasets succeed.
pub fn run_clustering(config: &PipelineConfig) -> Result<ClusteringSummary> {
    let mut collections = load_processed(&config.paths.processed_dir)?;
    let params = config.clustering.params;
    let mut datasets = Vec::with_capacity(Dataset::all().len());

    for dataset in Dataset::all().iter().copied() {
        let features = config
            .clustering
            .features_for(dataset, config.spatial.radius_m);
        let collection = collections.get_mut(dataset);
        info!("Clustering {} on {:?}", dataset, features);

        let matrix = prepare_features(collection, &features)
            .with_context(|| format!("Failed to prepare {} features", dataset))?;
        let outcome = cluster(&matrix, &params)
            .with_context(|| format!("Failed to cluster {} dataset", dataset))?;
        collection.attach_labels(KMEANS_COLUMN, &outcome.kmeans)?;
        collection.attach_labels(DBSCAN_COLUMN, &outcome.dbscan)?;

        let kmeans = cluster_stats(collection, KMEANS_COLUMN)?;
        let dbscan = cluster_stats(collection, DBSCAN_COLUMN)?;
        log_cluster_stats(&dataset.to_string(), KMEANS_COLUMN, &kmeans);
        log_cluster_stats(&dataset.to_string(), DBSCAN_COLUMN, &dbscan);

        datasets.push(DatasetClusters {
            dataset,
            rows: collection.len(),
            features,
            kmeans,
            dbscan,
        });
    }

    let summary = ClusteringSummary {
        created_at: Utc::now(),
        params,
        datasets,
    };
    let mut outputs: Vec<Output> = collections
        .iter()
        .map(|(dataset, c)| Output::Table {
            file_name: dataset.clustered_file(),
            table: c.table(),
        })
        .collect();
    outputs.push(Output::Json {
        file_name: SUMMARY_FILE.to_string(),
        value: serde_json::to_value(&summary)?,
    });
    write_stage(&config.paths.clustered_dir, &outputs)?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Value, RECORD_ID};
    use crate::store::processed_files_present;
    use std::fs;
    use std::path::PathBuf;

    const NEEDLES: &str = "Opened,Closed,Updated,Request Type,Latitude,Longitude\n\
        01/15/2019 03:04:05 PM,01/16/2019 09:00:00 AM,,Needle Pickup,37.770,-122.420\n\
        01/17/2019 10:00:00 AM,,,Needle Pickup,37.775,-122.415\n\
        02/01/2019 11:30:00 AM,,,Needle Pickup,37.790,-122.400\n\
        02/02/2019 08:00:00 AM,,,Needle Pickup,0,0\n\
        02/03/2019 08:00:00 AM,,,Needle Pickup,37.772,-122.418\n\
        02/04/2019 08:00:00 AM,,,Needle Pickup,37.791,-122.401\n";
    const ENCAMPMENTS: &str = "Observed Month,Tents,Latitude,Longitude\n\
        2019-01-01,4,37.770,-122.419\n\
        2019-02-01,2,37.790,-122.401\n\
        2019-03-01,1,37.780,-122.430\n";
    const BATHROOMS: &str = "Name,Latitude,Longitude\n\
        Civic Center,37.771,-122.420\n\
        Market St,37.775,-122.410\n\
        Embarcadero,37.795,-122.395\n";

    fn write_raw(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        for (dataset, body) in [
            (Dataset::Needles, NEEDLES),
            (Dataset::Encampments, ENCAMPMENTS),
            (Dataset::Bathrooms, BATHROOMS),
        ] {
            fs::write(dir.join(dataset.source_file()), body).unwrap();
        }
    }

    fn config(root: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.paths.data_dir = root.join("raw");
        config.paths.processed_dir = root.join("processed");
        config.paths.clustered_dir = root.join("clustered");
        config.clustering.params.k = 2;
        config.clustering.params.min_samples = 2;
        config
    }

    fn listing(dir: &Path) -> Vec<PathBuf> {
        match fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn test_integration_writes_processed_files() {
        let root = tempfile::tempdir().unwrap();
        write_raw(&root.path().join("raw"));
        let config = config(root.path());

        let result =
            run_integration(&config, IntegrateOptions::default(), &ProgressBar::hidden()).unwrap();
        let summary = result.summary.unwrap();
        assert_eq!(summary.columns_added, 11);

        let needles = &result.collections.needles;
        // the (0, 0) row is dropped by cleaning
        assert_eq!(needles.len(), 5);
        assert!(needles.table().column_index("dist_to_bathroom_m").is_some());
        assert!(needles.table().column_index("underserved").is_some());
        assert!(matches!(needles.table().value(0, 0), Value::Date(_)));

        let processed = &config.paths.processed_dir;
        for dataset in Dataset::all() {
            assert!(processed.join(dataset.processed_file()).exists());
        }
        assert!(processed.join(MANIFEST_FILE).exists());

        let reloaded = load_processed(processed).unwrap();
        assert_eq!(reloaded.needles.table(), needles.table());
    }

    #[test]
    fn test_processed_files_are_reused() {
        let root = tempfile::tempdir().unwrap();
        let raw = root.path().join("raw");
        write_raw(&raw);
        let config = config(root.path());
        run_integration(&config, IntegrateOptions::default(), &ProgressBar::hidden()).unwrap();

        let reused =
            run_integration(&config, IntegrateOptions::default(), &ProgressBar::hidden()).unwrap();
        assert!(reused.summary.is_none());
        assert_eq!(reused.collections.bathrooms.len(), 3);

        let forced = run_integration(
            &config,
            IntegrateOptions {
                force: true,
                verify_cache: false,
            },
            &ProgressBar::hidden(),
        )
        .unwrap();
        assert!(forced.summary.is_some());
    }

    #[test]
    fn test_missing_source_fails_even_with_cache() {
        let root = tempfile::tempdir().unwrap();
        let raw = root.path().join("raw");
        write_raw(&raw);
        let config = config(root.path());
        run_integration(&config, IntegrateOptions::default(), &ProgressBar::hidden()).unwrap();
        assert!(processed_files_present(&config.paths.processed_dir));

        fs::remove_file(raw.join(Dataset::Bathrooms.source_file())).unwrap();
        let err = run_integration(&config, IntegrateOptions::default(), &ProgressBar::hidden())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("bathrooms"));
    }

    #[test]
    fn test_verify_cache_detects_changed_inputs() {
        let root = tempfile::tempdir().unwrap();
        let raw = root.path().join("raw");
        write_raw(&raw);
        let mut config = config(root.path());
        let verify = IntegrateOptions {
            force: false,
            verify_cache: true,
        };

        run_integration(&config, verify, &ProgressBar::hidden()).unwrap();
        let fresh = run_integration(&config, verify, &ProgressBar::hidden()).unwrap();
        assert!(fresh.summary.is_none());

        config.spatial.radius_m = 250.0;
        let stale = run_integration(&config, verify, &ProgressBar::hidden()).unwrap();
        assert!(stale.summary.is_some());
        assert!(stale
            .collections
            .needles
            .table()
            .column_index("bathrooms_within_250m")
            .is_some());
    }

    #[test]
    fn test_clustering_writes_labels_and_summary() {
        let root = tempfile::tempdir().unwrap();
        write_raw(&root.path().join("raw"));
        let config = config(root.path());
        run_integration(&config, IntegrateOptions::default(), &ProgressBar::hidden()).unwrap();

        let summary = run_clustering(&config).unwrap();
        assert_eq!(summary.datasets.len(), 3);
        let needles = &summary.datasets[0];
        assert_eq!(needles.dataset, Dataset::Needles);
        assert_eq!(needles.rows, 5);
        assert_eq!(needles.kmeans.len(), 2);
        assert_eq!(needles.kmeans.iter().map(|s| s.count).sum::<usize>(), 5);
        assert_eq!(needles.dbscan.iter().map(|s| s.count).sum::<usize>(), 5);

        let clustered = &config.paths.clustered_dir;
        assert!(clustered.join(SUMMARY_FILE).exists());
        let reloaded =
            read_collection(&clustered.join(Dataset::Needles.clustered_file()), Dataset::Needles)
                .unwrap();
        let table = reloaded.table();
        let km = table.column_index(KMEANS_COLUMN).unwrap();
        let db = table.column_index(DBSCAN_COLUMN).unwrap();
        assert!(table.column_index(RECORD_ID).is_some());
        for row in table.rows() {
            assert!(matches!(row[km], Value::Integer(0..=1)));
            assert!(matches!(row[db], Value::Integer(_)));
        }
    }

    #[test]
    fn test_clustering_follows_configured_radius() {
        let root = tempfile::tempdir().unwrap();
        write_raw(&root.path().join("raw"));
        let mut config = config(root.path());
        config.spatial.radius_m = 250.0;
        run_integration(&config, IntegrateOptions::default(), &ProgressBar::hidden()).unwrap();

        let summary = run_clustering(&config).unwrap();
        assert!(summary.datasets[2]
            .features
            .contains(&"needles_within_250m".to_string()));
    }

    #[test]
    fn test_clustering_requires_processed_files() {
        let root = tempfile::tempdir().unwrap();
        let err = run_clustering(&config(root.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("integrate"));
    }

    #[test]
    fn test_failed_clustering_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        write_raw(&root.path().join("raw"));
        let mut config = config(root.path());
        run_integration(&config, IntegrateOptions::default(), &ProgressBar::hidden()).unwrap();

        // bathrooms only have three distinct rows
        config.clustering.params.k = 4;
        assert!(run_clustering(&config).is_err());
        assert!(listing(&config.paths.clustered_dir).is_empty());
    }
}
