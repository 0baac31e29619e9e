//! Grid cell math and the uniform cell lattice.
//!
//! This module provides the geographic bounding box type, the canonical cell
//! key derivation (floor-division of a coordinate pair by the grid size), and
//! the grid builder that covers a bounding box with square cells in degrees.
//!
//! The cell key derivation is part of the wire contract: a map client computes
//! the same keys from its viewport to decide which tiles to fetch, so the
//! formula and the fixed 6-decimal formatting must never change.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reader::Feature;
use crate::{Error, Result};

/// Cell counts above this trigger a capacity warning. The lattice grows
/// quadratically as the grid size shrinks and no internal cap is imposed.
const CELL_COUNT_WARN_THRESHOLD: i64 = 250_000;

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl GeoBounds {
    /// Create a new bounding box.
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }
    }

    /// Create an empty bounding box. Widening it with any real point makes
    /// it valid.
    pub fn empty() -> Self {
        Self {
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            min_lng: f64::INFINITY,
            max_lng: f64::NEG_INFINITY,
        }
    }

    /// Check if this is a valid bounding box: finite, with min <= max on
    /// both axes.
    pub fn is_valid(&self) -> bool {
        self.min_lat.is_finite()
            && self.max_lat.is_finite()
            && self.min_lng.is_finite()
            && self.max_lng.is_finite()
            && self.min_lat <= self.max_lat
            && self.min_lng <= self.max_lng
    }

    /// Widen this bounding box to include a point.
    pub fn expand_point(&mut self, lat: f64, lng: f64) {
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lng = self.min_lng.min(lng);
        self.max_lng = self.max_lng.max(lng);
    }

    /// Check whether a point falls inside this bounding box (inclusive).
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::empty()
    }
}

/// Floor-division step of a coordinate for a given grid size.
///
/// `cell_step(33.1215, 0.01) == 3312`, so the owning cell origin is `33.12`.
pub(crate) fn cell_step(coord: f64, grid_size: f64) -> i64 {
    (coord / grid_size).floor() as i64
}

/// Format a cell origin coordinate with the fixed 6-decimal precision the
/// wire contract requires. Negative zero normalizes to `0.000000`.
fn format_origin(origin: f64) -> String {
    let origin = if origin == 0.0 { 0.0 } else { origin };
    format!("{origin:.6}")
}

/// Canonical identifier for a grid cell.
///
/// Derived from the floor-division of a coordinate pair by the grid size;
/// both components are formatted with fixed 6-decimal precision so equality
/// is exact and the key is usable in string maps and filenames.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    lat: String,
    lng: String,
}

impl CellKey {
    /// Derive the key of the cell owning a point.
    pub fn for_point(lat: f64, lng: f64, grid_size: f64) -> Self {
        Self::from_steps(cell_step(lat, grid_size), cell_step(lng, grid_size), grid_size)
    }

    /// Build a key from integer lattice steps. Going through integer steps
    /// rather than repeated float addition keeps enumerated keys identical
    /// to keys derived from points inside the same cell.
    pub(crate) fn from_steps(lat_step: i64, lng_step: i64, grid_size: f64) -> Self {
        Self {
            lat: format_origin(lat_step as f64 * grid_size),
            lng: format_origin(lng_step as f64 * grid_size),
        }
    }

    /// The latitude component, e.g. `"33.120000"`.
    pub fn lat_key(&self) -> &str {
        &self.lat
    }

    /// The longitude component, e.g. `"-112.130000"`.
    pub fn lng_key(&self) -> &str {
        &self.lng
    }

    /// Deterministic tile filename for this cell.
    pub fn tile_filename(&self) -> String {
        format!("parcels_{}_{}.json", self.lat, self.lng)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.lat, self.lng)
    }
}

/// One cell of the lattice: its exact one-cell bounds and the features
/// assigned to it so far. The feature buffer is transient; the tile writer
/// discards it once the cell is serialized.
#[derive(Debug, Clone, Default)]
pub struct GridCell {
    pub bounds: GeoBounds,
    pub features: Vec<Feature>,
}

/// Uniform lattice of square cells covering a bounding box plus a one-cell
/// buffer on every side.
#[derive(Debug)]
pub struct Grid {
    grid_size: f64,
    cells: HashMap<CellKey, GridCell>,
}

impl Grid {
    /// Build the lattice for the given bounds.
    ///
    /// The bounds are expanded outward by one grid unit on every side as a
    /// buffer against floating-point edge alignment, then aligned to grid
    /// multiples, and every cell on the resulting lattice is initialized with
    /// an empty feature list and its exact sub-bounds.
    ///
    /// # Errors
    ///
    /// `Error::InvalidGridSize` for a non-positive or non-finite grid size,
    /// `Error::EmptyBounds` when the bounds never saw a feature.
    pub fn build(bounds: &GeoBounds, grid_size: f64) -> Result<Self> {
        if !grid_size.is_finite() || grid_size <= 0.0 {
            return Err(Error::InvalidGridSize(grid_size));
        }
        if !bounds.is_valid() {
            return Err(Error::EmptyBounds);
        }

        let lat_start = cell_step(bounds.min_lat - grid_size, grid_size);
        let lat_end = ((bounds.max_lat + grid_size) / grid_size).ceil() as i64;
        let lng_start = cell_step(bounds.min_lng - grid_size, grid_size);
        let lng_end = ((bounds.max_lng + grid_size) / grid_size).ceil() as i64;

        let cell_count = (lat_end - lat_start) as i128 * (lng_end - lng_start) as i128;
        if cell_count > CELL_COUNT_WARN_THRESHOLD as i128 {
            log::warn!(
                "grid has {} cells at {}°; cell count grows quadratically as the grid size shrinks",
                cell_count,
                grid_size
            );
        }

        let mut cells =
            HashMap::with_capacity(cell_count.clamp(0, CELL_COUNT_WARN_THRESHOLD as i128) as usize);
        for lat_step in lat_start..lat_end {
            for lng_step in lng_start..lng_end {
                let lat_origin = lat_step as f64 * grid_size;
                let lng_origin = lng_step as f64 * grid_size;
                cells.insert(
                    CellKey::from_steps(lat_step, lng_step, grid_size),
                    GridCell {
                        bounds: GeoBounds::new(
                            lat_origin,
                            lat_origin + grid_size,
                            lng_origin,
                            lng_origin + grid_size,
                        ),
                        features: Vec::new(),
                    },
                );
            }
        }

        Ok(Self { grid_size, cells })
    }

    /// The cell edge length in degrees.
    pub fn grid_size(&self) -> f64 {
        self.grid_size
    }

    /// Number of cells on the lattice.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the lattice has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Look up a cell by key.
    pub fn cell(&self, key: &CellKey) -> Option<&GridCell> {
        self.cells.get(key)
    }

    pub(crate) fn cell_mut(&mut self, key: &CellKey) -> Option<&mut GridCell> {
        self.cells.get_mut(key)
    }

    /// Iterate over all cells.
    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &GridCell)> {
        self.cells.iter()
    }

    pub(crate) fn into_cells(self) -> HashMap<CellKey, GridCell> {
        self.cells
    }
}
