//! Clustering stage.
//!
//! Reads the processed files, clusters each dataset with k-means and DBSCAN
//! on standardized features, and writes the labelled files and a summary.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use streetcare::config::PipelineConfig;
use streetcare::pipeline::run_clustering;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "cluster")]
#[command(about = "Cluster processed needle, encampment and bathroom data")]
struct Args {
    /// TOML config file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the processed files
    #[arg(long)]
    processed_dir: Option<PathBuf>,

    /// Output directory for clustered files
    #[arg(long)]
    clustered_dir: Option<PathBuf>,

    /// Number of k-means clusters (overrides config)
    #[arg(short)]
    k: Option<usize>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = PipelineConfig::load_or_default(args.config.as_deref())?;
    if let Some(dir) = args.processed_dir {
        config.paths.processed_dir = dir;
    }
    if let Some(dir) = args.clustered_dir {
        config.paths.clustered_dir = dir;
    }
    if let Some(k) = args.k {
        config.clustering.params.k = k;
    }

    info!("Streetcare Clustering");
    info!("Input: {}", config.paths.processed_dir.display());
    info!("Output: {}", config.paths.clustered_dir.display());

    let summary = run_clustering(&config)?;
    for d in &summary.datasets {
        info!(
            "  {:<12} {} records, {} k-means clusters, {} DBSCAN groups",
            d.dataset.stem(),
            d.rows,
            d.kmeans.len(),
            d.dbscan.len()
        );
    }
    info!("Clustering complete");

    Ok(())
}
