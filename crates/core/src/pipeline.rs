//! The partitioning pipeline - wires together projection, bounds scanning,
//! grid building, property reduction, cell assignment, tile writing, and the
//! index merge.
//!
//! Data flows strictly forward over two sequential passes of the feature
//! stream: the first computes the global bounds, the second assigns features
//! to cells. Two passes are required because bounds must be known before the
//! grid exists. The whole run is single-threaded and run-to-completion;
//! repeated whole-run invocations (against different inputs) are the
//! supported form of incremental processing.

use std::path::Path;

use chrono::Utc;

use crate::assign;
use crate::grid::Grid;
use crate::index::ParcelIndex;
use crate::projection::PointTransform;
use crate::property_filter::PropertyFilter;
use crate::reader::{self, FeatureSource};
use crate::tiles;
use crate::{Config, Error, Result};

/// Totals from one completed run, for the caller's success reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Features read during the assignment pass.
    pub features_read: usize,
    /// Features that landed in at least one cell.
    pub features_assigned: usize,
    /// Tiles written by this run.
    pub tiles_written: usize,
    /// Cells tracked by the merged index, including prior runs.
    pub total_cells: u64,
    /// Feature occurrences tracked by the merged index, counted per cell.
    pub total_features: u64,
}

/// Run the full pipeline: read features from `source`, partition them into
/// grid tiles under `output_dir`, and merge this run into the index.
pub fn run(
    config: &Config,
    source: &dyn FeatureSource,
    projection: Option<&str>,
    output_dir: &Path,
) -> Result<RunSummary> {
    if !config.grid_size.is_finite() || config.grid_size <= 0.0 {
        return Err(Error::InvalidGridSize(config.grid_size));
    }

    let transform = PointTransform::resolve(projection);
    if transform.is_identity() {
        log::info!("source coordinates treated as geographic");
    } else {
        log::info!("reprojecting source coordinates to WGS84");
    }

    // Pass 1: global bounds
    let bounds = reader::scan_bounds(source, &transform)?;
    if !bounds.is_valid() {
        return Err(Error::EmptyBounds);
    }
    log::info!(
        "dataset bounds: lat [{:.6}, {:.6}], lng [{:.6}, {:.6}]",
        bounds.min_lat,
        bounds.max_lat,
        bounds.min_lng,
        bounds.max_lng
    );

    let mut grid = Grid::build(&bounds, config.grid_size)?;
    log::info!("grid: {} cells at {}°", grid.len(), config.grid_size);

    // Pass 2: project, reduce, assign
    let filter = PropertyFilter::new(config.properties.iter().cloned());
    let mut features_read = 0usize;
    let mut features_assigned = 0usize;

    for feature in source.features()? {
        let mut feature = feature?;
        features_read += 1;

        transform.apply(&mut feature.geometry);
        feature.properties = filter.reduce(&feature.properties);

        if assign::assign(&mut grid, &feature) > 0 {
            features_assigned += 1;
        }
    }
    log::info!(
        "assigned {features_assigned} of {features_read} features ({} empty or outside the grid)",
        features_read - features_assigned
    );

    let written = tiles::write_tiles(grid, output_dir)?;

    let index_path = output_dir.join(&config.index_filename);
    let prior = ParcelIndex::load(&index_path);
    if prior.is_some() {
        log::info!("merging into existing index {}", index_path.display());
    }
    let index = ParcelIndex::merge(prior, config.grid_size, &written, Utc::now());
    index.write(&index_path)?;
    log::info!(
        "index now tracks {} cells / {} features",
        index.metadata.total_cells,
        index.metadata.total_features
    );

    Ok(RunSummary {
        features_read,
        features_assigned,
        tiles_written: written.len(),
        total_cells: index.metadata.total_cells,
        total_features: index.metadata.total_features,
    })
}
