// src/map/mod.rs v2
//! Slippy map tiles: coordinates, grids, downloading and stitching

mod compositor;
mod coords;
mod export;
mod grid;
mod template;
mod tile_cache;

pub use compositor::{composite, Canvas, TILE_SIZE};
pub use coords::{deg_to_tile, tile_to_deg, GeoPoint, TileCoord, MAX_LATITUDE, MAX_ZOOM};
pub use export::{
    export, export_corners, GeoTiffTranscoder, MapMetadata, RasterTranscoder, OUTPUT_SRS,
};
pub use grid::{BoundingBox, TileGrid};
pub use template::UrlTemplate;
pub use tile_cache::{ByteFetcher, CacheStats, HttpFetcher, TileCache, TileOrigin};
