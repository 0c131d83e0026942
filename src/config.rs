// src/config.rs v3
//! Map settings read from an INI file
//!
//! Each section describes one map:
//!
//! ```ini
//! [utrecht]
//! source = https://tile.openstreetmap.org/{}/{}/{}.png
//! zoom = 14
//! dest = maps
//! tilestore = tiles
//! bbox = "5.1" "52.1" "52.0" "5.0"
//! ```
//!
//! `bbox` is read from its double-quoted tokens only, in the order east,
//! north, south, west. Keys missing from a section fall back to `[DEFAULT]`.

use crate::error::{MapError, Result};
use crate::map::{BoundingBox, UrlTemplate, MAX_ZOOM};
use ini::{Ini, ParseOption, Properties};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.ini";

const DEFAULT_SECTION: &str = "DEFAULT";
const DEFAULT_WORKERS: usize = 1;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = concat!(
    "tile-stitch/",
    env!("CARGO_PKG_VERSION"),
    " (Rust slippy map stitcher)"
);

/// Everything one run needs, resolved up front.
#[derive(Debug, Clone, Serialize)]
pub struct MapConfig {
    /// Section name, used in output file names.
    pub name: String,
    pub source: UrlTemplate,
    pub zoom: u8,
    pub dest: PathBuf,
    pub tilestore: PathBuf,
    pub bbox: BoundingBox,
    /// Concurrent tile downloads; 1 downloads in grid order.
    pub workers: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl MapConfig {
    /// Load the named section from an INI file.
    pub fn load(path: &Path, section: &str) -> Result<Self> {
        // Quotes and backslashes are kept verbatim: bbox relies on the quotes
        // and Windows paths on the backslashes.
        let option = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..Default::default()
        };
        let ini = Ini::load_from_file_opt(path, option).map_err(|e| {
            MapError::Config(format!("Failed to read settings file {}: {}", path.display(), e))
        })?;

        Self::from_ini(&ini, section)
    }

    pub fn from_ini(ini: &Ini, section: &str) -> Result<Self> {
        let props = ini
            .section(Some(section))
            .ok_or_else(|| MapError::Config(format!("Section [{}] not found", section)))?;
        let reader = SectionReader {
            name: section,
            props,
            defaults: ini.section(Some(DEFAULT_SECTION)),
        };

        let source = UrlTemplate::parse(reader.require("source")?)?;

        let zoom: u8 = reader.parse("zoom", reader.require("zoom")?)?;
        if zoom > MAX_ZOOM {
            let reason = format!("must be at most {}", MAX_ZOOM);
            return Err(reader.invalid("zoom", &zoom.to_string(), &reason));
        }

        let dest = PathBuf::from(reader.require("dest")?);
        let tilestore = PathBuf::from(reader.require("tilestore")?);
        let bbox_text = reader.require("bbox")?;
        let bbox = parse_bbox(bbox_text).map_err(|reason| reader.invalid("bbox", bbox_text, &reason))?;

        let workers = match reader.get("workers") {
            Some(v) => reader.parse::<usize>("workers", v)?,
            None => DEFAULT_WORKERS,
        };
        if workers == 0 {
            return Err(reader.invalid("workers", "0", "must be at least 1"));
        }

        let timeout_secs = match reader.get("timeout") {
            Some(v) => reader.parse::<u64>("timeout", v)?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(reader.invalid("timeout", "0", "must be at least 1 second"));
        }

        let user_agent = reader
            .get("user_agent")
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_USER_AGENT)
            .to_string();

        Ok(Self {
            name: section.to_string(),
            source,
            zoom,
            dest,
            tilestore,
            bbox,
            workers,
            timeout: Duration::from_secs(timeout_secs),
            user_agent,
        })
    }

    /// `{dest}/{name}_zoom{zoom}.png`
    pub fn png_path(&self) -> PathBuf {
        self.dest.join(format!("{}_zoom{}.png", self.name, self.zoom))
    }

    /// `{dest}/{name}_zoom{zoom}.json`
    pub fn metadata_path(&self) -> PathBuf {
        self.dest.join(format!("{}_zoom{}.json", self.name, self.zoom))
    }

    /// `{dest}/map.tiff`
    pub fn tiff_path(&self) -> PathBuf {
        self.dest.join("map.tiff")
    }
}

struct SectionReader<'a> {
    name: &'a str,
    props: &'a Properties,
    defaults: Option<&'a Properties>,
}

impl<'a> SectionReader<'a> {
    fn get(&self, key: &str) -> Option<&'a str> {
        self.props
            .get(key)
            .or_else(|| self.defaults.and_then(|d| d.get(key)))
            .map(str::trim)
    }

    fn require(&self, key: &str) -> Result<&'a str> {
        match self.get(key) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(MapError::Config(format!(
                "[{}] is missing required key '{}'",
                self.name, key
            ))),
        }
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, value: &str) -> Result<T> {
        value
            .parse()
            .map_err(|_| self.invalid(key, value, "not a valid number"))
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> MapError {
        MapError::Config(format!(
            "[{}] {} = '{}': {}",
            self.name, key, value, reason
        ))
    }
}

/// Extract east, north, south, west from the quoted tokens of `text`.
fn parse_bbox(text: &str) -> std::result::Result<BoundingBox, String> {
    // Every odd piece between double quotes is a token
    let tokens: Vec<&str> = text.split('"').skip(1).step_by(2).collect();
    if tokens.len() != 4 {
        return Err(format!(
            "expected 4 quoted values (east, north, south, west), found {}",
            tokens.len()
        ));
    }

    let mut values = [0.0f64; 4];
    for (value, token) in values.iter_mut().zip(&tokens) {
        *value = token
            .trim()
            .parse()
            .map_err(|_| format!("'{}' is not a number", token))?;
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err("values must be finite".to_string());
    }

    let [east, north, south, west] = values;
    if !(-180.0..=180.0).contains(&east) || !(-180.0..=180.0).contains(&west) {
        return Err("longitudes must lie within [-180, 180]".to_string());
    }

    Ok(BoundingBox::new(north, south, east, west))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SETTINGS: &str = r#"
[DEFAULT]
tilestore = cache/tiles

[utrecht]
source = https://tile.openstreetmap.org/{}/{}/{}.png
zoom = 14
dest = out
bbox = "5.1" "52.1" "52.0" "5.0"

[tuned]
source = https://tiles.test/{z}/{x}/{y}.png
zoom = 3
dest = C:\maps\out
tilestore = C:\maps\tiles
bbox = east="10.5", north="50", south="40", west="-3.25"
workers = 8
timeout = 5
user_agent = my-agent/1.0
"#;

    fn ini() -> Ini {
        let option = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..Default::default()
        };
        Ini::load_from_str_opt(SETTINGS, option).unwrap()
    }

    #[test]
    fn test_basic_section() {
        let config = MapConfig::from_ini(&ini(), "utrecht").unwrap();
        assert_eq!(config.name, "utrecht");
        assert_eq!(config.zoom, 14);
        assert_eq!(config.dest, PathBuf::from("out"));
        assert_eq!(config.tilestore, PathBuf::from("cache/tiles"));
        assert_eq!(config.bbox, BoundingBox::new(52.1, 52.0, 5.1, 5.0));
        assert_eq!(config.workers, 1);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("tile-stitch/"));
        assert_eq!(config.png_path(), PathBuf::from("out").join("utrecht_zoom14.png"));
        assert_eq!(config.tiff_path(), PathBuf::from("out").join("map.tiff"));
    }

    #[test]
    fn test_optional_keys_and_verbatim_values() {
        let config = MapConfig::from_ini(&ini(), "tuned").unwrap();
        assert_eq!(config.bbox, BoundingBox::new(50.0, 40.0, 10.5, -3.25));
        assert_eq!(config.tilestore, PathBuf::from(r"C:\maps\tiles"));
        assert_eq!(config.workers, 8);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "my-agent/1.0");
    }

    #[test]
    fn test_missing_section() {
        let err = MapConfig::from_ini(&ini(), "nowhere").unwrap_err();
        assert!(matches!(err, MapError::Config(ref msg) if msg.contains("nowhere")));
    }

    #[test]
    fn test_missing_key() {
        let mut ini = ini();
        ini.delete_from(Some("utrecht"), "source");
        let err = MapConfig::from_ini(&ini, "utrecht").unwrap_err();
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("zoom", "fourteen"),
            ("zoom", "31"),
            ("source", "https://tiles.test/{}/{}.png"),
            ("bbox", "\"5.1\" \"52.1\" \"52.0\""),
            ("bbox", "\"east\" \"52.1\" \"52.0\" \"5.0\""),
            ("bbox", "\"190\" \"52.1\" \"52.0\" \"5.0\""),
            ("workers", "0"),
            ("timeout", "-1"),
        ];

        for (key, value) in cases {
            let mut ini = ini();
            ini.with_section(Some("utrecht")).set(key, value);
            let result = MapConfig::from_ini(&ini, "utrecht");
            assert!(matches!(result, Err(MapError::Config(_))), "{} = {}", key, value);
        }
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.ini");
        std::fs::write(&path, SETTINGS).unwrap();

        let config = MapConfig::load(&path, "tuned").unwrap();
        assert_eq!(config.dest, PathBuf::from(r"C:\maps\out"));

        let missing = MapConfig::load(&temp_dir.path().join("absent.ini"), "tuned");
        assert!(matches!(missing, Err(MapError::Config(_))));
    }
}
