// src/map/template.rs v1
//! Tile server URL templates
//!
//! A template carries exactly three substitution slots, filled with the
//! tile's zoom, x and y in that order. Slots are written as `{}` (taken in
//! order), `{0}`/`{1}`/`{2}` (explicit position) or `{z}`/`{x}`/`{y}`.
//! `{{` and `}}` produce literal braces.

use super::coords::TileCoord;
use crate::error::{MapError, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// 0 = zoom, 1 = x, 2 = y
    Slot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    /// Parse and validate a template.
    pub fn parse(source: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            MapError::Config(format!("invalid URL template '{}': {}", source, reason))
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut next_auto = 0;
        let mut used_auto = false;
        let mut used_explicit = false;

        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(invalid("unmatched '}'")),
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err(invalid("unterminated '{'")),
                        }
                    }

                    let index = match name.trim() {
                        "" => {
                            used_auto = true;
                            next_auto += 1;
                            next_auto - 1
                        }
                        "z" | "zoom" => {
                            used_explicit = true;
                            0
                        }
                        "x" => {
                            used_explicit = true;
                            1
                        }
                        "y" => {
                            used_explicit = true;
                            2
                        }
                        other => {
                            used_explicit = true;
                            other.parse::<usize>().map_err(|_| {
                                invalid(&format!("unknown slot '{{{}}}'", other))
                            })?
                        }
                    };
                    if index > 2 {
                        return Err(invalid(&format!(
                            "slot {} out of range, only zoom, x and y are available",
                            index
                        )));
                    }

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(index));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if used_auto && used_explicit {
            return Err(invalid("cannot mix '{}' with numbered or named slots"));
        }

        let mut slots: Vec<usize> = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Slot(i) => Some(*i),
                Segment::Literal(_) => None,
            })
            .collect();
        if slots.len() != 3 {
            return Err(invalid(&format!(
                "expected 3 slots for zoom, x and y, found {}",
                slots.len()
            )));
        }
        slots.sort_unstable();
        if slots != [0, 1, 2] {
            return Err(invalid("each of zoom, x and y must appear exactly once"));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The URL for one tile.
    pub fn format(&self, tile: &TileCoord) -> String {
        let mut url = String::with_capacity(self.source.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => url.push_str(text),
                Segment::Slot(0) => url.push_str(&tile.zoom.to_string()),
                Segment::Slot(1) => url.push_str(&tile.x.to_string()),
                Segment::Slot(_) => url.push_str(&tile.y.to_string()),
            }
        }
        url
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for UrlTemplate {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for UrlTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile() -> TileCoord {
        TileCoord::new(10, 526, 337)
    }

    #[test]
    fn test_positional_slots() {
        let template = UrlTemplate::parse("https://tile.openstreetmap.org/{}/{}/{}.png").unwrap();
        assert_eq!(template.format(&tile()), "https://tile.openstreetmap.org/10/526/337.png");
    }

    #[test]
    fn test_numbered_slots_any_order() {
        let template = UrlTemplate::parse("https://example.com/{0}/{2}/{1}.jpg").unwrap();
        assert_eq!(template.format(&tile()), "https://example.com/10/337/526.jpg");
    }

    #[test]
    fn test_named_slots() {
        let template = UrlTemplate::parse("https://example.com/tiles?z={z}&x={x}&y={y}").unwrap();
        assert_eq!(template.format(&tile()), "https://example.com/tiles?z=10&x=526&y=337");
    }

    #[test]
    fn test_escaped_braces() {
        let template = UrlTemplate::parse("https://example.com/{{raw}}/{}/{}/{}").unwrap();
        assert_eq!(template.format(&tile()), "https://example.com/{raw}/10/526/337");
    }

    #[test]
    fn test_wrong_slot_count() {
        for source in [
            "https://example.com/{}/{}.png",
            "https://example.com/{}/{}/{}/{}.png",
            "https://example.com/static.png",
        ] {
            assert!(matches!(UrlTemplate::parse(source), Err(MapError::Config(_))), "{}", source);
        }
    }

    #[test]
    fn test_malformed_templates() {
        for source in [
            "https://example.com/{0}/{0}/{1}",
            "https://example.com/{3}/{1}/{2}",
            "https://example.com/{}/{1}/{2}",
            "https://example.com/{q}/{x}/{y}",
            "https://example.com/{z}/{x}/{y",
            "https://example.com/z}/{x}/{y}",
        ] {
            assert!(UrlTemplate::parse(source).is_err(), "{}", source);
        }
    }

    #[test]
    fn test_from_str_and_display() {
        let template: UrlTemplate = "https://example.com/{}/{}/{}.png".parse().unwrap();
        assert_eq!(template.to_string(), "https://example.com/{}/{}/{}.png");
    }
}
