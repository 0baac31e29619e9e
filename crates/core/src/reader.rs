//! Feature sources and the first-pass bounds scan.
//!
//! The pipeline needs two full passes over the feature stream: bounds must be
//! known before the grid exists, and assignment needs the grid. A
//! `FeatureSource` therefore hands out a fresh iterator per call rather than
//! a single one-shot stream. The bundled `GeoJsonSource` parses its whole
//! file into memory at the start of each pass and holds nothing between
//! passes, paying the parse twice rather than retaining the document.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use geo::{CoordsIter, Geometry};
use geojson::{FeatureCollection, GeoJson, JsonObject};

use crate::grid::GeoBounds;
use crate::projection::PointTransform;
use crate::{Error, Result};

/// One record of the dataset: a geometry plus its attribute mapping.
///
/// Geometry coordinates are (longitude, latitude) ordered, `geo::Coord.x`
/// being longitude throughout the pipeline.
#[derive(Debug, Clone)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub properties: JsonObject,
}

/// A finite, restartable sequence of features.
///
/// Every call to `features` starts a fresh pass over the same records in the
/// same order. Implementations may re-open the underlying storage or buffer
/// in memory, as long as each pass is complete and identically ordered.
pub trait FeatureSource {
    /// Start a new pass over the feature stream.
    fn features(&self) -> Result<Box<dyn Iterator<Item = Result<Feature>> + '_>>;
}

/// Feature source backed by a GeoJSON file containing a Feature or
/// FeatureCollection document.
#[derive(Debug, Clone)]
pub struct GeoJsonSource {
    path: PathBuf,
}

impl GeoJsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeatureSource for GeoJsonSource {
    fn features(&self) -> Result<Box<dyn Iterator<Item = Result<Feature>> + '_>> {
        let file = File::open(&self.path).map_err(|e| {
            Error::SourceRead(format!("failed to open {}: {e}", self.path.display()))
        })?;
        let document = GeoJson::from_reader(BufReader::new(file)).map_err(|e| {
            Error::SourceRead(format!("failed to parse {}: {e}", self.path.display()))
        })?;

        let collection = match document {
            GeoJson::FeatureCollection(fc) => fc,
            GeoJson::Feature(feature) => FeatureCollection {
                bbox: None,
                features: vec![feature],
                foreign_members: None,
            },
            GeoJson::Geometry(_) => {
                return Err(Error::SourceRead(format!(
                    "{} is a bare geometry, expected a Feature or FeatureCollection",
                    self.path.display()
                )))
            }
        };

        Ok(Box::new(
            collection.features.into_iter().filter_map(convert_feature),
        ))
    }
}

/// Convert a GeoJSON feature to the pipeline currency. Features without a
/// geometry are skipped, not errors.
fn convert_feature(feature: geojson::Feature) -> Option<Result<Feature>> {
    let Some(geometry) = feature.geometry else {
        log::debug!("skipping feature without geometry");
        return None;
    };

    match Geometry::<f64>::try_from(geometry) {
        Ok(geometry) => Some(Ok(Feature {
            geometry,
            properties: feature.properties.unwrap_or_default(),
        })),
        Err(e) => Some(Err(Error::SourceRead(format!("invalid geometry: {e}")))),
    }
}

/// Pass 1: compute the global geographic bounding box of the dataset.
///
/// Only area-bearing geometries (Polygon, MultiPolygon) contribute, matching
/// the parcel domain; every vertex is projected and min/max-folded into the
/// running bounds. The returned bounds stay empty when no area-bearing
/// feature was seen, and the grid builder treats that as fatal.
pub fn scan_bounds(source: &dyn FeatureSource, transform: &PointTransform) -> Result<GeoBounds> {
    let mut bounds = GeoBounds::empty();
    let mut contributing = 0usize;

    for feature in source.features()? {
        let feature = feature?;
        match &feature.geometry {
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => {
                for coord in feature.geometry.coords_iter() {
                    let (lng, lat) = transform.transform(coord.x, coord.y);
                    bounds.expand_point(lat, lng);
                }
                contributing += 1;
            }
            _ => {}
        }
    }

    log::debug!("bounds scan folded {contributing} area-bearing features");
    Ok(bounds)
}
