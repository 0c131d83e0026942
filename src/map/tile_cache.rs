// src/map/tile_cache.rs v3
//! Tile downloading with a read-through disk cache

use super::coords::TileCoord;
use super::template::UrlTemplate;
use crate::error::{MapError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retrieves the raw bytes behind a URL.
pub trait ByteFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| MapError::Fetch(format!("HTTP client error: {}", e)))?;

        Ok(Self { client })
    }
}

impl ByteFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| MapError::Fetch(format!("Download of {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(MapError::Fetch(format!(
                "HTTP error {} for {}",
                response.status(),
                url
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| MapError::Fetch(format!("Failed to read response from {}: {}", url, e)))?
            .to_vec();

        Ok(bytes)
    }
}

/// Where a tile's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOrigin {
    Cached,
    Downloaded,
}

/// Disk cache in front of a tile server.
///
/// Tiles are stored flat as `{zoom}_{x}_{y}.png`. A file's existence is the
/// cache hit; entries never expire. Distinct tiles may be fetched from several
/// threads at once.
pub struct TileCache {
    cache_dir: PathBuf,
    template: UrlTemplate,
    fetcher: Arc<dyn ByteFetcher>,
    hits: AtomicUsize,
    downloads: AtomicUsize,
    bytes_downloaded: AtomicU64,
}

impl TileCache {
    /// Create the cache, making `cache_dir` and its parents if needed.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        template: UrlTemplate,
        fetcher: Arc<dyn ByteFetcher>,
    ) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|e| {
            MapError::Fetch(format!(
                "Failed to create cache directory {}: {}",
                cache_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            cache_dir,
            template,
            fetcher,
            hits: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            bytes_downloaded: AtomicU64::new(0),
        })
    }

    /// Get tile bytes from disk, downloading and storing them on a miss.
    pub fn fetch(&self, tile: &TileCoord) -> Result<Vec<u8>> {
        self.fetch_with_origin(tile).map(|(bytes, _)| bytes)
    }

    pub fn fetch_with_origin(&self, tile: &TileCoord) -> Result<(Vec<u8>, TileOrigin)> {
        let path = self.tile_path(tile);

        // Cached bytes are trusted as-is
        if path.exists() {
            let bytes = fs::read(&path).map_err(|e| {
                MapError::Fetch(format!("Failed to read cached tile {}: {}", path.display(), e))
            })?;
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok((bytes, TileOrigin::Cached));
        }

        let url = self.template.format(tile);
        debug!(%tile, %url, "Requesting tile");

        let bytes = self.fetcher.fetch(&url).map_err(|e| match e {
            MapError::Fetch(msg) => MapError::Fetch(format!("tile {}: {}", tile, msg)),
            other => other,
        })?;

        Self::persist(&path, &bytes)?;
        self.downloads.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);

        Ok((bytes, TileOrigin::Downloaded))
    }

    /// Write to a side file, then rename it into place so a cache entry is
    /// either absent or complete.
    fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
        let partial = path.with_extension("png.part");

        let committed = fs::write(&partial, bytes).and_then(|_| fs::rename(&partial, path));
        if let Err(e) = committed {
            if let Err(cleanup) = fs::remove_file(&partial) {
                warn!(path = %partial.display(), error = %cleanup, "Could not remove partial tile");
            }
            return Err(MapError::Fetch(format!(
                "Failed to store tile {}: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }

    pub fn tile_path(&self, tile: &TileCoord) -> PathBuf {
        Self::path_in(&self.cache_dir, tile)
    }

    fn path_in(cache_dir: &Path, tile: &TileCoord) -> PathBuf {
        cache_dir.join(format!("{}_{}_{}.png", tile.zoom, tile.x, tile.y))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get cache statistics
    pub fn get_stats(&self) -> CacheStats {
        let mut disk_tiles = 0;
        let mut disk_size = 0u64;
        if let Ok(entries) = fs::read_dir(&self.cache_dir) {
            for entry in entries.flatten() {
                let is_tile = entry.path().extension().is_some_and(|ext| ext == "png");
                if let Ok(metadata) = entry.metadata() {
                    if metadata.is_file() && is_tile {
                        disk_tiles += 1;
                        disk_size += metadata.len();
                    }
                }
            }
        }

        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            downloads: self.downloads.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            disk_tiles,
            disk_size_mb: disk_size as f64 / 1_048_576.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub downloads: usize,
    pub bytes_downloaded: u64,
    pub disk_tiles: usize,
    pub disk_size_mb: f64,
}
