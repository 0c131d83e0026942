// src/map/grid.rs v1
//! Tile grid covering a bounding box

use super::coords::{deg_to_tile, GeoPoint, TileCoord, MAX_ZOOM};
use crate::error::{MapError, Result};
use serde::Serialize;

/// Geographic rectangle in degrees.
///
/// Boxes crossing the antimeridian (`west > east`) are not supported and
/// produce an empty grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self { north, south, east, west }
    }

    pub fn north_west(&self) -> GeoPoint {
        GeoPoint::new(self.north, self.west)
    }

    pub fn south_east(&self) -> GeoPoint {
        GeoPoint::new(self.south, self.east)
    }
}

/// The tiles to download for one bounding box at one zoom level.
///
/// Both tile ranges are half-open: `bottom_right` is the first column/row
/// that is *not* part of the grid, so the tile holding the south-east corner
/// of the bounding box is never rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    zoom: u8,
    top_left: TileCoord,
    bottom_right: TileCoord,
    tiles: Vec<TileCoord>,
}

impl TileGrid {
    /// Enumerate the tiles covering `bbox`, x-major then y.
    pub fn new(bbox: &BoundingBox, zoom: u8) -> Result<Self> {
        if zoom > MAX_ZOOM {
            return Err(MapError::Config(format!(
                "zoom {} exceeds the maximum of {}",
                zoom, MAX_ZOOM
            )));
        }

        // Both corners are validated before anything is enumerated
        let top_left = deg_to_tile(bbox.north, bbox.west, zoom)?;
        let bottom_right = deg_to_tile(bbox.south, bbox.east, zoom)?;

        let columns = bottom_right.x as i64 - top_left.x as i64;
        let rows = bottom_right.y as i64 - top_left.y as i64;
        if columns <= 0 || rows <= 0 {
            return Err(MapError::EmptyGrid { columns, rows });
        }

        let tiles = (top_left.x..bottom_right.x)
            .flat_map(|x| (top_left.y..bottom_right.y).map(move |y| TileCoord::new(zoom, x, y)))
            .collect();

        Ok(Self {
            zoom,
            top_left,
            bottom_right,
            tiles,
        })
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn top_left(&self) -> TileCoord {
        self.top_left
    }

    /// Exclusive bottom-right bound of the grid.
    pub fn bottom_right(&self) -> TileCoord {
        self.bottom_right
    }

    pub fn tiles(&self) -> &[TileCoord] {
        &self.tiles
    }

    pub fn columns(&self) -> u32 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn rows(&self) -> u32 {
        self.bottom_right.y - self.top_left.y
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Column and row of `tile` relative to the grid origin.
    pub fn offset_of(&self, tile: &TileCoord) -> Option<(u32, u32)> {
        let inside = tile.zoom == self.zoom
            && (self.top_left.x..self.bottom_right.x).contains(&tile.x)
            && (self.top_left.y..self.bottom_right.y).contains(&tile.y);
        inside.then(|| (tile.x - self.top_left.x, tile.y - self.top_left.y))
    }
}
