//! Spatial integration stage.
//!
//! Loads and cleans the raw datasets, annotates them with nearest-facility
//! distances, co-location counts and underserved flags, and writes the
//! processed files.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use streetcare::config::PipelineConfig;
use streetcare::pipeline::{run_integration, IntegrateOptions};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "integrate")]
#[command(about = "Annotate needle, encampment and bathroom data with spatial relations")]
struct Args {
    /// TOML config file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the raw CSV exports
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Output directory for processed files
    #[arg(long)]
    processed_dir: Option<PathBuf>,

    /// Recompute even if processed files exist
    #[arg(long)]
    force: bool,

    /// Recompute if processed files were built from different inputs
    #[arg(long)]
    verify_cache: bool,

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
    if let Some(dir) = args.data_dir {
        config.paths.data_dir = dir;
    }
    if let Some(dir) = args.processed_dir {
        config.paths.processed_dir = dir;
    }

    info!("Streetcare Spatial Integration");
    info!("Data: {}", config.paths.data_dir.display());
    info!("Output: {}", config.paths.processed_dir.display());

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} relations")?
            .progress_chars("#>-"),
    );

    let result = run_integration(
        &config,
        IntegrateOptions {
            force: args.force,
            verify_cache: args.verify_cache,
        },
        &pb,
    )?;

    match result.summary {
        Some(summary) => info!(
            "Integration complete: {} columns added, {} underserved needles, {} underserved encampments",
            summary.columns_added, summary.underserved_needles, summary.underserved_encampments
        ),
        None => info!("Integration skipped; reused processed files"),
    }
    for (dataset, collection) in result.collections.iter() {
        info!("  {:<12} {} records", dataset.stem(), collection.len());
    }

    Ok(())
}
