//! Annotates the three collections with their pairwise spatial relations.
//!
//! Needles get distances to the nearest bathroom and encampment,
//! encampments the distance to the nearest bathroom, and every collection
//! gets counts of the other two within the configured radius. Needles and
//! encampments are flagged underserved from their bathroom distance.

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::projection::MAX_ACCURATE_SPAN_DEG;
use super::{DegreeScale, PointIndex, RelationEngine, UnderservedRule};
use crate::error::Result;
use crate::models::{Dataset, PointCollection};

pub const UNDERSERVED: &str = "underserved";

/// Default co-location radius
pub const DEFAULT_RADIUS_M: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationParams {
    pub scale: DegreeScale,
    pub radius_m: f64,
    pub underserved: UnderservedRule,
}

impl Default for IntegrationParams {
    fn default() -> Self {
        Self {
            scale: DegreeScale::default(),
            radius_m: DEFAULT_RADIUS_M,
            underserved: UnderservedRule::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Nearest,
    CountWithin,
}

#[derive(Debug, Clone, Copy)]
struct Job {
    source: Dataset,
    target: Dataset,
    relation: Relation,
}

const fn job(source: Dataset, target: Dataset, relation: Relation) -> Job {
    Job {
        source,
        target,
        relation,
    }
}

const JOBS: [Job; 9] = [
    job(Dataset::Needles, Dataset::Bathrooms, Relation::Nearest),
    job(Dataset::Needles, Dataset::Encampments, Relation::Nearest),
    job(Dataset::Encampments, Dataset::Bathrooms, Relation::Nearest),
    job(Dataset::Needles, Dataset::Bathrooms, Relation::CountWithin),
    job(Dataset::Needles, Dataset::Encampments, Relation::CountWithin),
    job(Dataset::Encampments, Dataset::Bathrooms, Relation::CountWithin),
    job(Dataset::Encampments, Dataset::Needles, Relation::CountWithin),
    job(Dataset::Bathrooms, Dataset::Needles, Relation::CountWithin),
    job(Dataset::Bathrooms, Dataset::Encampments, Relation::CountWithin),
];

/// Column holding the nearest distance from any collection to `target`.
pub fn distance_column(target: Dataset) -> String {
    format!("dist_to_{}_m", target.singular())
}

/// Column holding the count of `target` points within `radius_m`.
pub fn count_column(target: Dataset, radius_m: f64) -> String {
    format!("{}_within_{}m", target.stem(), radius_m)
}

enum Output {
    Distances(Vec<f64>),
    Counts(Vec<usize>),
}

struct JobResult {
    source: Dataset,
    column: String,
    output: Output,
}

/// Outcome of an integration run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrationSummary {
    pub columns_added: usize,
    pub underserved_needles: usize,
    pub underserved_encampments: usize,
}

/// The three collections being integrated
pub struct Collections<'a> {
    pub needles: &'a mut PointCollection,
    pub encampments: &'a mut PointCollection,
    pub bathrooms: &'a mut PointCollection,
}

impl Collections<'_> {
    fn get(&self, dataset: Dataset) -> &PointCollection {
        match dataset {
            Dataset::Needles => &*self.needles,
            Dataset::Encampments => &*self.encampments,
            Dataset::Bathrooms => &*self.bathrooms,
        }
    }

    fn get_mut(&mut self, dataset: Dataset) -> &mut PointCollection {
        match dataset {
            Dataset::Needles => &mut *self.needles,
            Dataset::Encampments => &mut *self.encampments,
            Dataset::Bathrooms => &mut *self.bathrooms,
        }
    }
}

/// Latitude span of `collection` when it is too wide for a single-latitude
/// degree scale.
fn inaccurate_span(collection: &PointCollection) -> Option<f64> {
    collection
        .latitude_span()
        .filter(|span| *span > MAX_ACCURATE_SPAN_DEG)
}

/// Compute all distance/count columns and underserved flags.
///
/// Every relation is computed before any column is attached, so a failing
/// relation leaves all three collections untouched.
pub fn integrate(
    mut collections: Collections<'_>,
    params: &IntegrationParams,
    progress: &ProgressBar,
) -> Result<IntegrationSummary> {
    let engine = RelationEngine::new(params.scale);

    for dataset in Dataset::all() {
        if let Some(span) = inaccurate_span(collections.get(*dataset)) {
            warn!(
                "{} spans {:.2} degrees of latitude; meter conversion around {} is inaccurate",
                dataset,
                span,
                params.scale.reference_latitude()
            );
        }
    }

    let results: Vec<JobResult> = {
        let view = &collections;
        // One index per collection, shared by every job targeting it
        let indexes: Vec<PointIndex> = Dataset::all()
            .par_iter()
            .map(|d| PointIndex::build(view.get(*d).geometry()))
            .collect();

        progress.set_length(JOBS.len() as u64);
        JOBS.par_iter()
            .map(|job| -> Result<JobResult> {
                let source = view.get(job.source);
                let target = view.get(job.target);
                let index = &indexes[job.target.ordinal()];
                let result = match job.relation {
                    Relation::Nearest => JobResult {
                        source: job.source,
                        column: distance_column(job.target),
                        output: Output::Distances(
                            engine.nearest_indexed(source, target, index)?.distances_m,
                        ),
                    },
                    Relation::CountWithin => JobResult {
                        source: job.source,
                        column: count_column(job.target, params.radius_m),
                        output: Output::Counts(engine.count_within_indexed(
                            source,
                            index,
                            params.radius_m,
                        )),
                    },
                };
                progress.inc(1);
                Ok(result)
            })
            .collect::<Result<Vec<_>>>()?
    };

    let mut summary = IntegrationSummary::default();
    let bathroom_distance = distance_column(Dataset::Bathrooms);
    let mut flags: Vec<(Dataset, Vec<bool>)> = Vec::new();

    for result in results {
        if let Output::Distances(ref distances) = result.output {
            if result.column == bathroom_distance {
                flags.push((result.source, params.underserved.flags(distances)));
            }
        }
        let collection = collections.get_mut(result.source);
        match result.output {
            Output::Distances(values) => collection.annotate(&result.column, values)?,
            Output::Counts(values) => collection.annotate(&result.column, values)?,
        }
        summary.columns_added += 1;
    }

    for (dataset, values) in flags {
        let flagged = values.iter().filter(|f| **f).count();
        match dataset {
            Dataset::Needles => summary.underserved_needles = flagged,
            Dataset::Encampments => summary.underserved_encampments = flagged,
            Dataset::Bathrooms => {}
        }
        collections.get_mut(dataset).annotate(UNDERSERVED, values)?;
        summary.columns_added += 1;
    }

    progress.finish_and_clear();
    info!(
        "Spatial integration added {} columns ({} underserved needles, {} underserved encampments)",
        summary.columns_added, summary.underserved_needles, summary.underserved_encampments
    );

    Ok(summary)
}
