// src/map/compositor.rs v1
//! Stitching decoded tiles into one canvas

use super::coords::TileCoord;
use super::grid::TileGrid;
use crate::error::{MapError, Result};
use image::{imageops, ImageFormat, RgbImage};
use std::path::Path;
use tracing::debug;

/// Edge length of a standard slippy tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// The assembled map: opaque RGB, origin top-left.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbImage,
}

impl Canvas {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Interleaved RGB bytes, row by row.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| MapError::Export(format!("Failed to write {}: {}", path.display(), e)))
    }
}

/// Decode every tile of `grid` and paste it at its grid offset.
///
/// `tile_bytes` is asked once per tile, in grid order. Alpha is dropped, and
/// a tile that is not `tile_size` pixels square is rejected.
pub fn composite<'a, F>(grid: &TileGrid, tile_size: u32, mut tile_bytes: F) -> Result<Canvas>
where
    F: FnMut(&TileCoord) -> Result<&'a [u8]>,
{
    let width = grid.columns() * tile_size;
    let height = grid.rows() * tile_size;
    debug!(width, height, tiles = grid.len(), "Allocating canvas");

    let mut image = RgbImage::new(width, height);
    let origin = grid.top_left();

    for tile in grid.tiles() {
        let bytes = tile_bytes(tile)?;
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| MapError::Decode(format!("tile {}: {}", tile, e)))?
            .to_rgb8();

        if decoded.dimensions() != (tile_size, tile_size) {
            return Err(MapError::Decode(format!(
                "tile {} is {}x{}, expected {}x{}",
                tile,
                decoded.width(),
                decoded.height(),
                tile_size,
                tile_size
            )));
        }

        let x = (tile.x - origin.x) * tile_size;
        let y = (tile.y - origin.y) * tile_size;
        imageops::replace(&mut image, &decoded, x as i64, y as i64);
    }

    Ok(Canvas { image })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::coords::{tile_to_deg, GeoPoint};
    use crate::map::grid::BoundingBox;
    use image::{Rgb, Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::io::Cursor;

    fn solid_png(size: u32, color: [u8; 3]) -> Vec<u8> {
        let tile = RgbImage::from_pixel(size, size, Rgb(color));
        let mut bytes = Vec::new();
        tile.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn inside(x: u32, y: u32, zoom: u8) -> GeoPoint {
        let a = tile_to_deg(x, y, zoom);
        let b = tile_to_deg(x + 1, y + 1, zoom);
        GeoPoint::new((a.latitude + b.latitude) / 2.0, (a.longitude + b.longitude) / 2.0)
    }

    /// Grid of `columns` x `rows` tiles starting at (300, 400) on zoom 11.
    fn grid(columns: u32, rows: u32) -> TileGrid {
        let nw = inside(300, 400, 11);
        let se = inside(300 + columns, 400 + rows, 11);
        TileGrid::new(&BoundingBox::new(nw.latitude, se.latitude, se.longitude, nw.longitude), 11)
            .unwrap()
    }

    #[test]
    fn test_quadrants_match_source_tiles() {
        let grid = grid(2, 2);
        let colors: HashMap<(u32, u32), [u8; 3]> = [
            ((0, 0), [255, 0, 0]),
            ((1, 0), [0, 255, 0]),
            ((0, 1), [0, 0, 255]),
            ((1, 1), [255, 255, 0]),
        ]
        .into_iter()
        .collect();

        let tiles: HashMap<TileCoord, Vec<u8>> = grid
            .tiles()
            .iter()
            .map(|t| (*t, solid_png(TILE_SIZE, colors[&grid.offset_of(t).unwrap()])))
            .collect();

        let canvas = composite(&grid, TILE_SIZE, |t| Ok(tiles[t].as_slice())).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (512, 512));

        for (x, y, pixel) in canvas.image().enumerate_pixels() {
            let expected = colors[&(x / TILE_SIZE, y / TILE_SIZE)];
            assert_eq!(pixel.0, expected, "pixel ({}, {})", x, y);
        }
    }

    #[test]
    fn test_canvas_size_follows_grid() {
        let grid = grid(3, 1);
        let png = solid_png(16, [10, 20, 30]);
        let canvas = composite(&grid, 16, |_| Ok(png.as_slice())).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (48, 16));
        assert_eq!(canvas.as_raw().len(), 48 * 16 * 3);
    }

    #[test]
    fn test_transparency_flattened() {
        let grid = grid(1, 1);
        let tile = RgbaImage::from_pixel(8, 8, Rgba([40, 50, 60, 0]));
        let mut png = Vec::new();
        tile.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let canvas = composite(&grid, 8, |_| Ok(png.as_slice())).unwrap();
        assert_eq!(canvas.image().get_pixel(3, 3).0, [40, 50, 60]);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let grid = grid(1, 1);
        let result = composite(&grid, TILE_SIZE, |_| Ok(b"<html>rate limited</html>".as_slice()));
        assert!(matches!(result, Err(MapError::Decode(_))));
    }

    #[test]
    fn test_wrong_tile_size_rejected() {
        let grid = grid(1, 1);
        let png = solid_png(512, [0, 0, 0]);
        let result = composite(&grid, TILE_SIZE, |_| Ok(png.as_slice()));
        assert!(matches!(result, Err(MapError::Decode(ref msg)) if msg.contains("512x512")));
    }

    #[test]
    fn test_missing_tile_propagates() {
        let grid = grid(2, 1);
        let result = composite(&grid, TILE_SIZE, |t| {
            Err(MapError::Fetch(format!("tile {} unavailable", t)))
        });
        assert!(matches!(result, Err(MapError::Fetch(_))));
    }
}
