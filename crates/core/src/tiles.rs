//! Tile serialization: one GeoJSON FeatureCollection per non-empty cell.
//!
//! Filenames derive deterministically from the cell key, so repeated runs
//! with the same grid size and bounds overwrite their own tiles in place.
//! Empty cells produce no artifact and never reach the index. A failed tile
//! write is fatal to the run; re-running the whole pipeline is the recovery
//! mechanism.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::FeatureCollection;

use crate::grid::{CellKey, GeoBounds, Grid};
use crate::reader::Feature;
use crate::{Error, Result};

/// A finalized non-empty cell: what the index needs to reference its tile.
/// The in-memory feature buffer is released once this record exists.
#[derive(Debug, Clone)]
pub struct WrittenTile {
    pub key: CellKey,
    pub bounds: GeoBounds,
    pub filename: String,
    pub feature_count: u64,
}

/// Serialize every non-empty cell of the grid into the output directory.
///
/// Consumes the grid; per-cell feature buffers are dropped as each tile is
/// written. Returns the finalized cell records for the index merger.
pub fn write_tiles(grid: Grid, output_dir: &Path) -> Result<Vec<WrittenTile>> {
    std::fs::create_dir_all(output_dir)?;

    let mut written = Vec::new();
    for (key, cell) in grid.into_cells() {
        if cell.features.is_empty() {
            continue;
        }

        let filename = key.tile_filename();
        let feature_count = cell.features.len() as u64;
        let collection = to_feature_collection(cell.features);

        let path = output_dir.join(&filename);
        let file = File::create(&path).map_err(|e| Error::TileWrite {
            filename: filename.clone(),
            reason: e.to_string(),
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &collection).map_err(|e| Error::TileWrite {
            filename: filename.clone(),
            reason: e.to_string(),
        })?;
        writer.flush().map_err(|e| Error::TileWrite {
            filename: filename.clone(),
            reason: e.to_string(),
        })?;

        log::debug!("wrote {filename}: {feature_count} features");
        written.push(WrittenTile {
            key,
            bounds: cell.bounds,
            filename,
            feature_count,
        });
    }

    log::info!("wrote {} tiles to {}", written.len(), output_dir.display());
    Ok(written)
}

fn to_feature_collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features
            .into_iter()
            .map(|feature| geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(
                    &feature.geometry,
                ))),
                id: None,
                properties: Some(feature.properties),
                foreign_members: None,
            })
            .collect(),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Geometry};
    use geojson::JsonObject;
    use serde_json::json;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("parcel-tiles-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_feature() -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("APN".to_string(), json!("302-44-117"));
        Feature {
            geometry: Geometry::Polygon(polygon![
                (x: -112.1248, y: 33.1242),
                (x: -112.1242, y: 33.1242),
                (x: -112.1242, y: 33.1248),
                (x: -112.1248, y: 33.1242),
            ]),
            properties,
        }
    }

    fn populated_grid() -> Grid {
        let bounds = GeoBounds::new(33.12, 33.13, -112.13, -112.12);
        let mut grid = Grid::build(&bounds, 0.01).unwrap();
        crate::assign::assign(&mut grid, &sample_feature());
        grid
    }

    #[test]
    fn test_write_tiles_skips_empty_cells() {
        let dir = temp_dir("skip-empty");
        let grid = populated_grid();
        let total_cells = grid.len();

        let written = write_tiles(grid, &dir).unwrap();
        assert_eq!(written.len(), 1);
        assert!(total_cells > 1, "grid should have had empty cells too");

        // Exactly one tile file on disk
        let files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_written_tile_is_valid_feature_collection() {
        let dir = temp_dir("valid-collection");
        let written = write_tiles(populated_grid(), &dir).unwrap();

        let tile = &written[0];
        assert_eq!(tile.feature_count, 1);
        assert_eq!(tile.filename, tile.key.tile_filename());

        let contents = std::fs::read_to_string(dir.join(&tile.filename)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["features"].as_array().unwrap().len(), 1);
        assert_eq!(value["features"][0]["properties"]["APN"], "302-44-117");
        assert_eq!(value["features"][0]["geometry"]["type"], "Polygon");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_rerun_overwrites_same_filename() {
        let dir = temp_dir("overwrite");

        let first = write_tiles(populated_grid(), &dir).unwrap();
        let second = write_tiles(populated_grid(), &dir).unwrap();

        assert_eq!(first[0].filename, second[0].filename);
        let files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_tiles_creates_output_dir() {
        let dir = temp_dir("create-dir").join("nested").join("out");
        let written = write_tiles(populated_grid(), &dir).unwrap();
        assert_eq!(written.len(), 1);
        assert!(dir.join(&written[0].filename).exists());

        let _ = std::fs::remove_dir_all(dir.parent().unwrap().parent().unwrap());
    }
}
