//! The three point datasets handled by the pipeline.

use serde::{Deserialize, Serialize};

/// Which source a point collection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    /// Needle-related 311 incident reports
    Needles,
    /// Quarterly tent/structure/vehicle counts
    Encampments,
    /// Public bathrooms and water fountains
    Bathrooms,
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stem())
    }
}

impl Dataset {
    pub fn all() -> &'static [Dataset] {
        &[Dataset::Needles, Dataset::Encampments, Dataset::Bathrooms]
    }

    /// Position in [`Dataset::all`]
    pub fn ordinal(&self) -> usize {
        match self {
            Dataset::Needles => 0,
            Dataset::Encampments => 1,
            Dataset::Bathrooms => 2,
        }
    }

    /// Plural noun used in annotation column names, e.g. `needles_within_500m`.
    pub fn stem(&self) -> &'static str {
        match self {
            Dataset::Needles => "needles",
            Dataset::Encampments => "encampments",
            Dataset::Bathrooms => "bathrooms",
        }
    }

    /// Singular noun used in distance column names, e.g. `dist_to_bathroom_m`.
    pub fn singular(&self) -> &'static str {
        match self {
            Dataset::Needles => "needle",
            Dataset::Encampments => "encampment",
            Dataset::Bathrooms => "bathroom",
        }
    }

    /// Raw export file name inside the data directory
    pub fn source_file(&self) -> &'static str {
        match self {
            Dataset::Needles => {
                "311_Cases__Needle-related_cases_after_January_1,_2017_20260117.csv"
            }
            Dataset::Encampments => {
                "Quarterly_count_of_tents,_structures,_and_lived-in_vehicles_20260117.csv"
            }
            Dataset::Bathrooms => {
                "San_Francisco_Public_Bathrooms_and_Water_Fountains_20260117.csv"
            }
        }
    }

    /// Base name shared by the processed and clustered files
    pub fn file_stem(&self) -> &'static str {
        match self {
            Dataset::Needles => "needle_cases",
            Dataset::Encampments => "homeless_encampments",
            Dataset::Bathrooms => "bathrooms",
        }
    }

    pub fn processed_file(&self) -> String {
        format!("{}_spatial.csv", self.file_stem())
    }

    pub fn clustered_file(&self) -> String {
        format!("{}_clustered.csv", self.file_stem())
    }

    /// Columns holding timestamps after column standardization
    pub fn date_columns(&self) -> &'static [&'static str] {
        match self {
            Dataset::Needles => &["opened", "closed", "updated"],
            Dataset::Encampments => &["observed_month"],
            Dataset::Bathrooms => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        assert_eq!(Dataset::Needles.processed_file(), "needle_cases_spatial.csv");
        assert_eq!(
            Dataset::Encampments.clustered_file(),
            "homeless_encampments_clustered.csv"
        );
        assert_eq!(Dataset::Bathrooms.to_string(), "bathrooms");
    }
}
