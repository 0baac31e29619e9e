//! CLI for parcel-tiles - partition parcel datasets into grid-indexed
//! GeoJSON tiles.
//!
//! This is a thin wrapper around the parcel-tiles-core library.

use anyhow::{Context, Result};
use clap::Parser;
use parcel_tiles_core::{Config, GeoJsonSource, Tiler};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "parcel-tiles",
    about = "Partition parcel polygons into grid-indexed GeoJSON tiles",
    version
)]
struct Args {
    /// Input GeoJSON feature file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Directory for tiles and the merged index
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Grid cell edge length in degrees
    #[arg(long, default_value = "0.01")]
    grid_size: f64,

    /// Comma-separated attribute fields to keep per feature
    #[arg(long, value_delimiter = ',')]
    properties: Option<Vec<String>>,

    /// Filename of the merged index document
    #[arg(long, default_value = "parcel-index.json")]
    index_name: String,

    /// Projection definition file (defaults to a .prj sidecar next to INPUT)
    #[arg(long)]
    projection_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Read the projection description, preferring an explicit file over the
    /// conventional `.prj` sidecar.
    fn read_projection(&self) -> Result<Option<String>> {
        if let Some(path) = &self.projection_file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read projection file {}", path.display()))?;
            return Ok(Some(text));
        }

        let sidecar = self.input.with_extension("prj");
        if sidecar.exists() {
            let text = std::fs::read_to_string(&sidecar)
                .with_context(|| format!("Failed to read projection sidecar {}", sidecar.display()))?;
            return Ok(Some(text));
        }

        Ok(None)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Build configuration
    let mut config = Config::default()
        .with_grid_size(args.grid_size)
        .with_index_filename(&args.index_name);
    if let Some(properties) = &args.properties {
        config = config.with_properties(properties.iter().cloned());
    }

    let projection = args.read_projection()?;
    let source = GeoJsonSource::new(&args.input);

    // Create tiler and run
    let summary = Tiler::new(config)
        .run(&source, projection.as_deref(), &args.output_dir)
        .context("Failed to partition the dataset")?;

    println!(
        "✓ Wrote {} tiles to {} ({} cells / {} features indexed)",
        summary.tiles_written,
        args.output_dir.display(),
        summary.total_cells,
        summary.total_features
    );

    Ok(())
}
