use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::clustering::ClusterParams;
use crate::models::{Dataset, LATITUDE, LONGITUDE};
use crate::source::GeoBounds;
use crate::spatial::integrate::{count_column, distance_column};
use crate::spatial::{DegreeScale, IntegrationParams, UnderservedRule};

/// Pipeline settings. Every section is optional in the file; missing values
/// fall back to the built-in constants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub bounds: GeoBounds,
    pub spatial: SpatialConfig,
    pub clustering: ClusteringConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub clustered_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("CSVdata"),
            processed_dir: PathBuf::from("CSVdata/processed"),
            clustered_dir: PathBuf::from("CSVdata/clustered"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub reference_latitude: f64,
    pub radius_m: f64,
    pub underserved_threshold_m: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        let params = IntegrationParams::default();
        Self {
            reference_latitude: params.scale.reference_latitude(),
            radius_m: params.radius_m,
            underserved_threshold_m: params.underserved.threshold_m,
        }
    }
}

impl SpatialConfig {
    pub fn params(&self) -> IntegrationParams {
        IntegrationParams {
            scale: DegreeScale::new(self.reference_latitude),
            radius_m: self.radius_m,
            underserved: UnderservedRule {
                threshold_m: self.underserved_threshold_m,
            },
        }
    }
}

/// Feature columns clustered per dataset.
///
/// A list left out of the file falls back to the default for that dataset,
/// whose distance and count column names follow `spatial.radius_m`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    #[serde(flatten)]
    pub params: ClusterParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needle_features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encampment_features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathroom_features: Option<Vec<String>>,
}

impl ClusteringConfig {
    /// Configured features for `dataset`, or the defaults for `radius_m`.
    pub fn features_for(&self, dataset: Dataset, radius_m: f64) -> Vec<String> {
        let configured = match dataset {
            Dataset::Needles => &self.needle_features,
            Dataset::Encampments => &self.encampment_features,
            Dataset::Bathrooms => &self.bathroom_features,
        };
        match configured {
            Some(features) => features.clone(),
            None => default_features(dataset, radius_m),
        }
    }
}

/// Position plus every relation column the integrate stage adds to `dataset`.
pub fn default_features(dataset: Dataset, radius_m: f64) -> Vec<String> {
    let mut features = vec![LATITUDE.to_string(), LONGITUDE.to_string()];
    match dataset {
        Dataset::Needles => {
            features.push(distance_column(Dataset::Bathrooms));
            features.push(distance_column(Dataset::Encampments));
            features.push(count_column(Dataset::Bathrooms, radius_m));
            features.push(count_column(Dataset::Encampments, radius_m));
        }
        Dataset::Encampments => {
            features.push(distance_column(Dataset::Bathrooms));
            features.push(count_column(Dataset::Bathrooms, radius_m));
            features.push(count_column(Dataset::Needles, radius_m));
        }
        Dataset::Bathrooms => {
            features.push(count_column(Dataset::Needles, radius_m));
            features.push(count_column(Dataset::Encampments, radius_m));
        }
    }
    features
}

impl PipelineConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: PipelineConfig = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Config from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}
