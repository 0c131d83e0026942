// src/map/export.rs v1
//! Georeferencing the stitched canvas
//!
//! The exporter only knows the canvas and its two geographic corners; writing
//! an actual georeferenced container is left to a [`RasterTranscoder`]. The
//! bundled [`GeoTiffTranscoder`] writes a plain GeoTIFF with the `tiff` crate.

use super::compositor::Canvas;
use super::coords::{tile_to_deg, GeoPoint};
use super::grid::TileGrid;
use crate::error::{MapError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tracing::info;

/// Spatial reference handed to the transcoder.
pub const OUTPUT_SRS: &str = "EPSG:4326";

// GeoTIFF tag IDs
const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
const GEOTIFF_MODELTIEPOINT: u16 = 33922;
const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;
const GEOTIFF_GEOASCIIPARAMS: u16 = 34737;

// GeoKey IDs and values
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const GT_CITATION_GEO_KEY: u16 = 1026;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Geographic corners of the canvas.
///
/// The bottom-right corner is the top-left corner of the grid's exclusive
/// `bottom_right` tile, which matches the half-open tile range the canvas was
/// built from.
pub fn export_corners(grid: &TileGrid) -> (GeoPoint, GeoPoint) {
    let tl = grid.top_left();
    let br = grid.bottom_right();
    (
        tile_to_deg(tl.x, tl.y, grid.zoom()),
        tile_to_deg(br.x, br.y, grid.zoom()),
    )
}

/// Writes a flat canvas plus corner coordinates into a georeferenced file.
pub trait RasterTranscoder {
    fn transcode(
        &self,
        canvas: &Canvas,
        top_left: GeoPoint,
        bottom_right: GeoPoint,
        srs: &str,
        path: &Path,
    ) -> Result<()>;
}

/// Compute the corners of `grid` and hand `canvas` to `transcoder`.
pub fn export<T: RasterTranscoder + ?Sized>(
    canvas: &Canvas,
    grid: &TileGrid,
    transcoder: &T,
    path: &Path,
) -> Result<(GeoPoint, GeoPoint)> {
    let (top_left, bottom_right) = export_corners(grid);
    transcoder.transcode(canvas, top_left, bottom_right, OUTPUT_SRS, path)?;
    info!(path = %path.display(), srs = OUTPUT_SRS, "Georeferenced raster written");
    Ok((top_left, bottom_right))
}

/// Uncompressed RGB GeoTIFF writer for geographic (lat/lon) references.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffTranscoder;

impl GeoTiffTranscoder {
    pub fn new() -> Self {
        Self
    }

    /// Write to any writer that implements Write + Seek
    pub fn write_to<W: Write + Seek>(
        &self,
        writer: W,
        canvas: &Canvas,
        top_left: GeoPoint,
        bottom_right: GeoPoint,
        epsg: u16,
    ) -> Result<()> {
        if canvas.width() == 0 || canvas.height() == 0 {
            return Err(MapError::Export("Canvas has zero dimensions".to_string()));
        }

        let mut encoder = TiffEncoder::new(writer)?;
        let mut image = encoder.new_image::<colortype::RGB8>(canvas.width(), canvas.height())?;

        // ModelPixelScale: [ScaleX, ScaleY, ScaleZ] in degrees per pixel
        let pixel_scale = [
            (bottom_right.longitude - top_left.longitude) / canvas.width() as f64,
            (top_left.latitude - bottom_right.latitude) / canvas.height() as f64,
            0.0,
        ];
        // ModelTiepoint ties pixel (0, 0) to the top-left corner
        let tiepoint = [0.0, 0.0, 0.0, top_left.longitude, top_left.latitude, 0.0];

        let dir = image.encoder();
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELPIXELSCALE), &pixel_scale[..])?;
        dir.write_tag(Tag::Unknown(GEOTIFF_MODELTIEPOINT), &tiepoint[..])?;
        dir.write_tag(
            Tag::Unknown(GEOTIFF_GEOKEYDIRECTORY),
            &geokey_directory(epsg)[..],
        )?;
        let citation = format!("EPSG:{}|", epsg);
        dir.write_tag(Tag::Unknown(GEOTIFF_GEOASCIIPARAMS), citation.as_str())?;

        image.write_data(canvas.as_raw())?;
        Ok(())
    }
}

impl RasterTranscoder for GeoTiffTranscoder {
    fn transcode(
        &self,
        canvas: &Canvas,
        top_left: GeoPoint,
        bottom_right: GeoPoint,
        srs: &str,
        path: &Path,
    ) -> Result<()> {
        let epsg = parse_epsg(srs)?;
        let file = File::create(path)
            .map_err(|e| MapError::Export(format!("Failed to create {}: {}", path.display(), e)))?;
        self.write_to(BufWriter::new(file), canvas, top_left, bottom_right, epsg)
    }
}

/// Parse a geographic `EPSG:<code>` identifier.
fn parse_epsg(srs: &str) -> Result<u16> {
    let code = srs
        .strip_prefix("EPSG:")
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| MapError::Export(format!("Unsupported spatial reference '{}'", srs)))?;

    // Geographic 2D CRS codes live in 4000..5000
    if !(4000..5000).contains(&code) {
        return Err(MapError::Export(format!(
            "Spatial reference {} is not a geographic CRS",
            srs
        )));
    }
    Ok(code)
}

#[rustfmt::skip]
fn geokey_directory(epsg: u16) -> Vec<u16> {
    // [KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys,
    //  KeyID, TIFFTagLocation, Count, Value_Offset, ...]
    let citation_len = format!("EPSG:{}|", epsg).len() as u16;
    vec![
        1, 1, 0, 4,
        GT_MODEL_TYPE_GEO_KEY, 0, 1, MODEL_TYPE_GEOGRAPHIC,
        GT_RASTER_TYPE_GEO_KEY, 0, 1, RASTER_PIXEL_IS_AREA,
        GT_CITATION_GEO_KEY, GEOTIFF_GEOASCIIPARAMS, citation_len, 0,
        GEOGRAPHIC_TYPE_GEO_KEY, 0, 1, epsg,
    ]
}

/// Sidecar describing where the stitched PNG sits on the globe.
#[derive(Debug, Clone, Serialize)]
pub struct MapMetadata {
    pub name: String,
    pub zoom: u8,
    pub columns: u32,
    pub rows: u32,
    pub tile_size: u32,
    pub width: u32,
    pub height: u32,
    pub top_left: GeoPoint,
    pub bottom_right: GeoPoint,
    pub srs: String,
    pub generated_at: DateTime<Utc>,
}

impl MapMetadata {
    pub fn new(name: &str, grid: &TileGrid, canvas: &Canvas, tile_size: u32) -> Self {
        let (top_left, bottom_right) = export_corners(grid);
        Self {
            name: name.to_string(),
            zoom: grid.zoom(),
            columns: grid.columns(),
            rows: grid.rows(),
            tile_size,
            width: canvas.width(),
            height: canvas.height(),
            top_left,
            bottom_right,
            srs: OUTPUT_SRS.to_string(),
            generated_at: Utc::now(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| MapError::Export(format!("Failed to write {}: {}", path.display(), e)))
    }
}
