// src/map/coords.rs v1
//! Web Mercator slippy tile coordinate math
//!
//! See <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>.

use crate::error::{MapError, Result};
use serde::Serialize;
use std::f64::consts::PI;
use std::fmt;

/// Largest latitude the Web Mercator projection can represent, in degrees.
pub const MAX_LATITUDE: f64 = 85.0511;

/// Highest zoom level whose tile indices still fit the `u32` arithmetic below.
pub const MAX_ZOOM: u8 = 30;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Address of one tile in the slippy-map pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Top-left corner of this tile.
    pub fn corner(&self) -> GeoPoint {
        tile_to_deg(self.x, self.y, self.zoom)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

fn tiles_per_axis(zoom: u8) -> f64 {
    2_f64.powi(zoom as i32)
}

/// Calculate the tile containing a lat/lon at the given zoom level.
///
/// The latitude must lie strictly inside `(-MAX_LATITUDE, MAX_LATITUDE)`:
/// beyond it the tangent/secant term diverges, so such input is rejected with
/// [`MapError::LatitudeDomain`] rather than clamped. The longitude must lie
/// in `[-180, 180]`, otherwise [`MapError::LongitudeDomain`] is returned; `180`
/// maps to index `2^zoom`, which is only meaningful as an exclusive grid bound.
pub fn deg_to_tile(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord> {
    if !lat.is_finite() || lat.abs() >= MAX_LATITUDE {
        return Err(MapError::LatitudeDomain(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(MapError::LongitudeDomain(lon));
    }

    let n = tiles_per_axis(zoom);
    let x = ((lon + 180.0) / 360.0 * n).floor();
    let lat_rad = lat.to_radians();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    Ok(TileCoord::new(zoom, x.max(0.0) as u32, y.max(0.0) as u32))
}

/// Calculate the top-left corner of a tile.
///
/// Pass `(x + 1, y + 1)` to get the bottom-right corner of tile `(x, y)`.
pub fn tile_to_deg(x: u32, y: u32, zoom: u8) -> GeoPoint {
    let n = tiles_per_axis(zoom);
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat_rad = ((1.0 - 2.0 * y as f64 / n) * PI).sinh().atan();
    GeoPoint::new(lat_rad.to_degrees(), lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_coordinates() {
        // Test known coordinates
        let tile = deg_to_tile(42.438878, -71.119277, 12).unwrap();
        assert_eq!((tile.x, tile.y), (1238, 1513));

        // Test conversion back
        let corner = tile_to_deg(tile.x, tile.y, 12);
        assert!((corner.latitude - 42.438878).abs() < 0.1);
        assert!((corner.longitude - (-71.119277)).abs() < 0.1);
    }

    #[test]
    fn test_round_trip_within_one_tile() {
        let points = [
            (52.05, 5.05),
            (-33.87, 151.21),
            (0.0, 0.0),
            (84.9, -179.9),
            (-84.9, 179.9),
            (40.7128, -74.006),
        ];

        for zoom in [0u8, 1, 5, 10, 15, 18] {
            let n = 2_f64.powi(zoom as i32);
            for &(lat, lon) in &points {
                let tile = deg_to_tile(lat, lon, zoom).unwrap();
                let top_left = tile_to_deg(tile.x, tile.y, zoom);
                let bottom_right = tile_to_deg(tile.x + 1, tile.y + 1, zoom);

                // The input point lies inside the tile it was mapped to
                assert!(lon >= top_left.longitude - 1e-9 && lon < bottom_right.longitude + 1e-9);
                assert!(lat <= top_left.latitude + 1e-9 && lat > bottom_right.latitude - 1e-9);

                // and therefore within one tile's width of its corner
                assert!((lon - top_left.longitude).abs() <= 360.0 / n);
                assert!((lat - top_left.latitude).abs() <= top_left.latitude - bottom_right.latitude);
            }
        }
    }

    #[test]
    fn test_near_poles_stay_in_range() {
        for zoom in 0..=MAX_ZOOM {
            let n = 1u64 << zoom;
            let north = deg_to_tile(85.0, 0.0, zoom).unwrap();
            let south = deg_to_tile(-85.0, 0.0, zoom).unwrap();
            assert!((north.x as u64) < n && (north.y as u64) < n);
            assert!((south.x as u64) < n && (south.y as u64) < n);
            assert!(north.y <= south.y);
        }
    }

    #[test]
    fn test_outside_mercator_rejected() {
        for zoom in [0u8, 3, 12] {
            assert!(matches!(
                deg_to_tile(86.0, 0.0, zoom),
                Err(MapError::LatitudeDomain(lat)) if lat == 86.0
            ));
            assert!(matches!(
                deg_to_tile(-86.0, 0.0, zoom),
                Err(MapError::LatitudeDomain(_))
            ));
        }
        assert!(deg_to_tile(f64::NAN, 0.0, 4).is_err());
    }

    #[test]
    fn test_longitude_outside_range_rejected() {
        for lon in [-180.5, 180.5, 540.0, f64::NAN, f64::NEG_INFINITY] {
            assert!(
                matches!(deg_to_tile(10.0, lon, 6), Err(MapError::LongitudeDomain(_))),
                "{}",
                lon
            );
        }

        // Both edges are accepted; 180 is the exclusive column bound
        assert_eq!(deg_to_tile(10.0, -180.0, 6).unwrap().x, 0);
        assert_eq!(deg_to_tile(10.0, 180.0, 6).unwrap().x, 64);
    }

    #[test]
    fn test_tile_to_deg_corners() {
        let origin = tile_to_deg(0, 0, 0);
        assert_eq!(origin.longitude, -180.0);
        assert!((origin.latitude - 85.0511).abs() < 1e-3);

        let far = tile_to_deg(1, 1, 0);
        assert_eq!(far.longitude, 180.0);
        assert!((far.latitude + 85.0511).abs() < 1e-3);

        let center = tile_to_deg(1, 1, 1);
        assert_eq!(center.longitude, 0.0);
        assert!(center.latitude.abs() < 1e-9);
    }

    #[test]
    fn test_display() {
        assert_eq!(TileCoord::new(10, 526, 337).to_string(), "10/526/337");
    }
}
