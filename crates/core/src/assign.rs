//! Cell assignment: appending each feature to every grid cell it spans.
//!
//! A feature's own bounding box decides its cells, using the same
//! floor-division key scheme as the grid builder. A feature whose box spans
//! several cells is intentionally duplicated into all of them so every tile
//! is self-sufficient for display; consumers that need exact cross-tile
//! counts must deduplicate by a stable feature identifier.

use geo::{BoundingRect, Geometry};

use crate::grid::{cell_step, CellKey, GeoBounds, Grid};
use crate::reader::Feature;

/// Geographic bounding box of a single geometry, recursing through nested
/// collections. `None` for a geometry with no vertices.
pub fn feature_bounds(geometry: &Geometry<f64>) -> Option<GeoBounds> {
    let rect = geometry.bounding_rect()?;
    Some(GeoBounds::new(
        rect.min().y,
        rect.max().y,
        rect.min().x,
        rect.max().x,
    ))
}

/// Append a feature to every existing grid cell its bounding box intersects.
///
/// Keys are enumerated inclusively between the floor-division cells of the
/// box corners. Keys absent from the grid (buffering mismatch) are silently
/// skipped. Returns the number of cells the feature landed in; zero for
/// empty geometry.
pub fn assign(grid: &mut Grid, feature: &Feature) -> usize {
    let Some(bounds) = feature_bounds(&feature.geometry) else {
        return 0;
    };

    let grid_size = grid.grid_size();
    let mut cells_hit = 0;

    for lat_step in cell_step(bounds.min_lat, grid_size)..=cell_step(bounds.max_lat, grid_size) {
        for lng_step in cell_step(bounds.min_lng, grid_size)..=cell_step(bounds.max_lng, grid_size)
        {
            let key = CellKey::from_steps(lat_step, lng_step, grid_size);
            if let Some(cell) = grid.cell_mut(&key) {
                cell.features.push(feature.clone());
                cells_hit += 1;
            }
        }
    }

    cells_hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, GeometryCollection, MultiPolygon};
    use geojson::JsonObject;

    fn feature(geometry: Geometry<f64>) -> Feature {
        Feature {
            geometry,
            properties: JsonObject::new(),
        }
    }

    fn grid_around(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Grid {
        Grid::build(&GeoBounds::new(min_lat, max_lat, min_lng, max_lng), 0.01).unwrap()
    }

    #[test]
    fn test_feature_bounds_of_polygon() {
        let poly = feature(Geometry::Polygon(polygon![
            (x: -112.1225, y: 33.1205),
            (x: -112.1195, y: 33.1205),
            (x: -112.1195, y: 33.1215),
            (x: -112.1225, y: 33.1205),
        ]));

        let bounds = feature_bounds(&poly.geometry).unwrap();
        assert_eq!(bounds.min_lng, -112.1225);
        assert_eq!(bounds.max_lng, -112.1195);
        assert_eq!(bounds.min_lat, 33.1205);
        assert_eq!(bounds.max_lat, 33.1215);
    }

    #[test]
    fn test_feature_bounds_recurses_into_collections() {
        let collection = Geometry::GeometryCollection(GeometryCollection::from(vec![
            Geometry::Point(geo::point!(x: -112.15, y: 33.10)),
            Geometry::GeometryCollection(GeometryCollection::from(vec![Geometry::Point(
                geo::point!(x: -112.10, y: 33.14),
            )])),
        ]));

        let bounds = feature_bounds(&collection).unwrap();
        assert_eq!(bounds.min_lng, -112.15);
        assert_eq!(bounds.max_lng, -112.10);
        assert_eq!(bounds.min_lat, 33.10);
        assert_eq!(bounds.max_lat, 33.14);
    }

    #[test]
    fn test_feature_bounds_empty_geometry_is_none() {
        let empty = Geometry::GeometryCollection(GeometryCollection::<f64>::default());
        assert!(feature_bounds(&empty).is_none());

        let empty_multi = Geometry::MultiPolygon(MultiPolygon::<f64>(vec![]));
        assert!(feature_bounds(&empty_multi).is_none());
    }

    #[test]
    fn test_assign_single_cell() {
        let mut grid = grid_around(33.12, 33.13, -112.13, -112.12);
        let poly = feature(Geometry::Polygon(polygon![
            (x: -112.1248, y: 33.1242),
            (x: -112.1242, y: 33.1242),
            (x: -112.1242, y: 33.1248),
            (x: -112.1248, y: 33.1242),
        ]));

        assert_eq!(assign(&mut grid, &poly), 1);

        let key = CellKey::for_point(33.1245, -112.1245, 0.01);
        assert_eq!(grid.cell(&key).unwrap().features.len(), 1);
    }

    #[test]
    fn test_assign_duplicates_across_2x2_cells() {
        let mut grid = grid_around(33.11, 33.14, -112.14, -112.11);

        // Bounding box straddles one lat boundary (33.13) and one lng
        // boundary (-112.12), so exactly 4 cells must receive the feature.
        let poly = feature(Geometry::Polygon(polygon![
            (x: -112.1225, y: 33.1295),
            (x: -112.1195, y: 33.1295),
            (x: -112.1195, y: 33.1305),
            (x: -112.1225, y: 33.1305),
            (x: -112.1225, y: 33.1295),
        ]));

        assert_eq!(assign(&mut grid, &poly), 4);

        let expected = [
            (33.1295, -112.1225),
            (33.1295, -112.1195),
            (33.1305, -112.1225),
            (33.1305, -112.1195),
        ];
        for (lat, lng) in expected {
            let key = CellKey::for_point(lat, lng, 0.01);
            assert_eq!(
                grid.cell(&key).unwrap().features.len(),
                1,
                "cell {key} missing the feature"
            );
        }

        // And no other cell got it
        let total: usize = grid.cells().map(|(_, c)| c.features.len()).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_assign_skips_cells_outside_grid() {
        let mut grid = grid_around(33.12, 33.13, -112.13, -112.12);

        // Far away from the grid entirely
        let poly = feature(Geometry::Polygon(polygon![
            (x: 10.0, y: 50.0),
            (x: 10.001, y: 50.0),
            (x: 10.001, y: 50.001),
            (x: 10.0, y: 50.0),
        ]));

        assert_eq!(assign(&mut grid, &poly), 0);
        let total: usize = grid.cells().map(|(_, c)| c.features.len()).sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn test_assign_empty_geometry_hits_nothing() {
        let mut grid = grid_around(33.12, 33.13, -112.13, -112.12);
        let empty = feature(Geometry::GeometryCollection(
            GeometryCollection::<f64>::default(),
        ));

        assert_eq!(assign(&mut grid, &empty), 0);
    }

    #[test]
    fn test_assign_point_feature_lands_in_owning_cell() {
        let mut grid = grid_around(33.12, 33.13, -112.13, -112.12);
        let point = feature(Geometry::Point(geo::point!(x: -112.1245, y: 33.1245)));

        assert_eq!(assign(&mut grid, &point), 1);
    }
}
