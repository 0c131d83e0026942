// src/error.rs
//! Error types for the map creator

use std::fmt;

pub type Result<T> = std::result::Result<T, MapError>;

#[derive(Debug)]
pub enum MapError {
    Io(std::io::Error),
    /// Missing or malformed settings section, key or value.
    Config(String),
    /// Latitude outside the range Web Mercator can represent.
    LatitudeDomain(f64),
    /// Longitude outside [-180, 180].
    LongitudeDomain(f64),
    /// The bounding box rounds to zero tile columns or rows.
    EmptyGrid { columns: i64, rows: i64 },
    Fetch(String),
    Decode(String),
    Export(String),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Io(e) => write!(f, "IO error: {}", e),
            MapError::Config(msg) => write!(f, "Config error: {}", msg),
            MapError::LatitudeDomain(lat) => write!(
                f,
                "Latitude {} is outside the Web Mercator range (-{max}, {max})",
                lat,
                max = crate::map::MAX_LATITUDE
            ),
            MapError::LongitudeDomain(lon) => {
                write!(f, "Longitude {} is outside the range [-180, 180]", lon)
            }
            MapError::EmptyGrid { columns, rows } => write!(
                f,
                "Bounding box covers no tiles ({} columns x {} rows)",
                columns, rows
            ),
            MapError::Fetch(msg) => write!(f, "Fetch error: {}", msg),
            MapError::Decode(msg) => write!(f, "Decode error: {}", msg),
            MapError::Export(msg) => write!(f, "Export error: {}", msg),
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MapError {
    fn from(error: std::io::Error) -> Self {
        MapError::Io(error)
    }
}

impl From<serde_json::Error> for MapError {
    fn from(error: serde_json::Error) -> Self {
        MapError::Export(format!("metadata serialization failed: {}", error))
    }
}

impl From<tiff::TiffError> for MapError {
    fn from(error: tiff::TiffError) -> Self {
        MapError::Export(format!("TIFF encoding failed: {}", error))
    }
}
