//! Coordinate reprojection to geographic WGS84.
//!
//! Parcel datasets usually arrive in a projected CRS (state plane, UTM) with
//! the definition carried as WKT in a `.prj` sidecar. This module resolves
//! that textual description into a point transform to longitude/latitude, or
//! the identity when the source is already geographic.
//!
//! Resolution never fails the run: an unparseable or unsupported description
//! degrades to the identity transform with a warning, favoring pipeline
//! completion over strict correctness. Callers that need strict correctness
//! must validate the CRS out of band.

use std::fmt;

use geo::{Geometry, MapCoordsInPlace};
use proj4rs::Proj;

/// Proj definition of the geographic target every transform maps into.
const WGS84_PROJ_STRING: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Point transform from source CRS coordinates to (longitude, latitude).
pub enum PointTransform {
    /// Source coordinates are already geographic; points pass through.
    Identity,
    /// Resolved projection pipeline into WGS84.
    Projected {
        source: Proj,
        target: Proj,
        source_is_latlong: bool,
    },
}

impl fmt::Debug for PointTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("PointTransform::Identity"),
            Self::Projected { .. } => f.write_str("PointTransform::Projected"),
        }
    }
}

impl PointTransform {
    /// Resolve a textual CRS description into a point transform.
    ///
    /// Recognized geographic descriptions (and absent ones) resolve to the
    /// identity. Anything else is parsed as a proj string, or as WKT first
    /// when it does not look like one. Parse failures warn and fall back to
    /// the identity rather than aborting the run.
    pub fn resolve(description: Option<&str>) -> Self {
        let Some(text) = description else {
            return Self::Identity;
        };
        let text = text.trim();
        if text.is_empty() || describes_geographic_crs(text) {
            return Self::Identity;
        }

        match Self::from_description(text) {
            Ok(transform) => transform,
            Err(reason) => {
                log::warn!(
                    "unrecognized projection description, treating coordinates as geographic: {reason}"
                );
                Self::Identity
            }
        }
    }

    fn from_description(text: &str) -> Result<Self, String> {
        let proj_string = if text.starts_with('+') {
            text.to_string()
        } else {
            proj4wkt::wkt_to_projstring(text)
                .map_err(|e| format!("could not translate WKT: {e:?}"))?
        };

        let source = Proj::from_proj_string(&proj_string)
            .map_err(|e| format!("invalid projection {proj_string:?}: {e:?}"))?;
        let target = Proj::from_proj_string(WGS84_PROJ_STRING)
            .map_err(|e| format!("invalid WGS84 target: {e:?}"))?;
        let source_is_latlong = source.is_latlong();

        Ok(Self::Projected {
            source,
            target,
            source_is_latlong,
        })
    }

    /// True when points pass through unchanged.
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Transform one coordinate pair from source CRS to (longitude, latitude).
    ///
    /// Pure per call, so it can be applied to vertices in any order. A failed
    /// per-point transform warns and returns the input pair unchanged rather
    /// than aborting the batch.
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Self::Identity => (x, y),
            Self::Projected {
                source,
                target,
                source_is_latlong,
            } => match project_point(source, target, *source_is_latlong, x, y) {
                Ok(pair) => pair,
                Err(reason) => {
                    log::warn!("could not transform point ({x}, {y}): {reason}");
                    (x, y)
                }
            },
        }
    }

    /// Reproject every vertex of a geometry in place, preserving the
    /// (longitude, latitude) axis order throughout.
    pub fn apply(&self, geometry: &mut Geometry<f64>) {
        if self.is_identity() {
            return;
        }
        geometry.map_coords_in_place(|coord| {
            let (x, y) = self.transform(coord.x, coord.y);
            geo::Coord { x, y }
        });
    }
}

fn project_point(
    source: &Proj,
    target: &Proj,
    source_is_latlong: bool,
    x: f64,
    y: f64,
) -> Result<(f64, f64), String> {
    // proj4rs works in radians for geographic CRS
    let (in_x, in_y) = if source_is_latlong {
        (x.to_radians(), y.to_radians())
    } else {
        (x, y)
    };

    let mut point = (in_x, in_y, 0.0);
    proj4rs::transform::transform(source, target, &mut point)
        .map_err(|e| format!("{e:?}"))?;

    let (lng, lat) = (point.0.to_degrees(), point.1.to_degrees());
    if !lng.is_finite() || !lat.is_finite() {
        return Err("non-finite result".to_string());
    }
    Ok((lng, lat))
}

/// Substring detection of descriptions that already denote a geographic CRS.
///
/// A projected definition embeds a GEOGCS clause (and so also names like
/// `GCS_WGS_1984`), so projected shapes are ruled out before the substring
/// checks run.
fn describes_geographic_crs(text: &str) -> bool {
    let upper = text.to_uppercase();
    if upper.starts_with("PROJCS") {
        return false;
    }
    if upper.contains("+PROJ=") && !upper.contains("+PROJ=LONGLAT") {
        return false;
    }

    upper.starts_with("GEOGCS")
        || upper.contains("EPSG:4326")
        || upper.contains("CRS84")
        || upper.contains("WGS84")
        || upper.contains("WGS 84")
        || upper.contains("WGS_1984")
}
