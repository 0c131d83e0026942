// src/lib.rs
//! Tile Stitch Library
//!
//! Downloads the slippy-map tiles covering a bounding box, stitches them into
//! one image and georeferences the result.

pub mod config;
pub mod creator;
pub mod error;
pub mod logging;
pub mod map;

// Re-export main types for convenience
pub use config::MapConfig;
pub use creator::{MapCreator, MapReport};
pub use error::{MapError, Result};
pub use map::{BoundingBox, GeoPoint, TileCoord, TileGrid};
