//! Core library for partitioning parcel polygon datasets into a uniform
//! geographic grid of GeoJSON tiles.
//!
//! Given a vector dataset of property boundaries (in any projection), the
//! pipeline reprojects to WGS84, computes the dataset bounds, lays a lattice
//! of square cells over them, assigns every feature to each cell its
//! bounding box touches, writes one GeoJSON tile per non-empty cell, and
//! merges the run into a persistent index that a map client uses to fetch
//! only the tiles overlapping its viewport.
//!
//! # Examples
//!
//! ```no_run
//! use parcel_tiles_core::{Config, GeoJsonSource, Tiler};
//! use std::path::Path;
//!
//! let config = Config::default().with_grid_size(0.01);
//! let source = GeoJsonSource::new("parcels.json");
//!
//! let tiler = Tiler::new(config);
//! let summary = tiler.run(&source, None, Path::new("tiles/")).unwrap();
//! println!("{} tiles written", summary.tiles_written);
//! ```

use std::path::Path;

use thiserror::Error;

pub mod assign;
pub mod grid;
pub mod index;
pub mod pipeline;
pub mod projection;
pub mod property_filter;
pub mod reader;
pub mod tiles;

pub use grid::{CellKey, GeoBounds, Grid, GridCell};
pub use index::{CellEntry, IndexMetadata, ParcelIndex};
pub use pipeline::RunSummary;
pub use projection::PointTransform;
pub use property_filter::PropertyFilter;
pub use reader::{Feature, FeatureSource, GeoJsonSource};
pub use tiles::WrittenTile;

/// Errors that abort a partitioning run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read feature source: {0}")]
    SourceRead(String),

    #[error("Grid size must be a positive number of degrees, got {0}")]
    InvalidGridSize(f64),

    #[error("No area-bearing features found, cannot size the grid")]
    EmptyBounds,

    #[error("Failed to write tile {filename}: {reason}")]
    TileWrite { filename: String, reason: String },

    #[error("Failed to write index {path}: {reason}")]
    IndexWrite { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Default lattice cell edge length, in degrees.
pub const DEFAULT_GRID_SIZE: f64 = 0.01;

/// Default attribute allow-list retained per feature.
pub const DEFAULT_PROPERTIES: &[&str] = &[
    "APN",
    "StreetNumb",
    "StreetName",
    "StreetType",
    "StreetDir",
    "City",
    "ZipCode",
];

/// Default filename of the merged index artifact.
pub const DEFAULT_INDEX_FILENAME: &str = "parcel-index.json";

/// Configuration for a partitioning run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Lattice cell edge length in degrees.
    pub grid_size: f64,
    /// Attribute fields retained per feature.
    pub properties: Vec<String>,
    /// Filename of the merged index artifact inside the output directory.
    pub index_filename: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            properties: DEFAULT_PROPERTIES.iter().map(|s| s.to_string()).collect(),
            index_filename: DEFAULT_INDEX_FILENAME.to_string(),
        }
    }
}

impl Config {
    /// Set the grid size in degrees.
    pub fn with_grid_size(mut self, grid_size: f64) -> Self {
        self.grid_size = grid_size;
        self
    }

    /// Replace the attribute allow-list.
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties = properties.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Set the index filename.
    pub fn with_index_filename(mut self, name: impl Into<String>) -> Self {
        self.index_filename = name.into();
        self
    }
}

/// Main entry point: runs the partitioning pipeline for one dataset.
pub struct Tiler {
    config: Config,
}

impl Tiler {
    /// Create a new tiler with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Partition `source` into grid tiles under `output_dir` and merge the
    /// run into the index.
    ///
    /// `projection` is the optional textual CRS description of the source
    /// coordinates (e.g. the contents of a `.prj` sidecar); `None` or an
    /// unrecognized description treats coordinates as already geographic.
    pub fn run(
        &self,
        source: &dyn FeatureSource,
        projection: Option<&str>,
        output_dir: &Path,
    ) -> Result<RunSummary> {
        pipeline::run(&self.config, source, projection, output_dir)
    }
}
