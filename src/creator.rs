// src/creator.rs v2
//! Main map creation coordination

use crate::{
    config::MapConfig,
    error::{MapError, Result},
    map::{
        composite, export, ByteFetcher, CacheStats, GeoPoint, GeoTiffTranscoder, HttpFetcher,
        MapMetadata, RasterTranscoder, TileCache, TileCoord, TileGrid, TileOrigin, TILE_SIZE,
    },
};
use rayon::prelude::*;
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tracing::{debug, info};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct MapReport {
    pub grid: TileGrid,
    pub png_path: PathBuf,
    pub metadata_path: PathBuf,
    pub tiff_path: Option<PathBuf>,
    pub top_left: GeoPoint,
    pub bottom_right: GeoPoint,
    pub cache: CacheStats,
}

/// Downloads, stitches and georeferences one map.
pub struct MapCreator {
    fetcher: Arc<dyn ByteFetcher>,
    transcoder: Option<Box<dyn RasterTranscoder>>,
    tile_size: u32,
}

impl MapCreator {
    /// Create a creator that fetches through `fetcher` and writes GeoTIFF.
    pub fn new(fetcher: Arc<dyn ByteFetcher>) -> Self {
        Self {
            fetcher,
            transcoder: Some(Box::new(GeoTiffTranscoder::new())),
            tile_size: TILE_SIZE,
        }
    }

    /// Create a creator downloading over HTTP with the configured client settings.
    pub fn from_config(config: &MapConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.user_agent, config.timeout)?;
        Ok(Self::new(Arc::new(fetcher)))
    }

    pub fn with_transcoder(mut self, transcoder: Box<dyn RasterTranscoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Skip writing the georeferenced raster.
    pub fn without_georef(mut self) -> Self {
        self.transcoder = None;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Run the whole pipeline for one configuration.
    ///
    /// Any error aborts the run. Tiles cached before the failure stay on
    /// disk, so a rerun only downloads what is still missing.
    pub fn run(&self, config: &MapConfig) -> Result<MapReport> {
        let grid = TileGrid::new(&config.bbox, config.zoom)?;
        let (top_left, bottom_right) = crate::map::export_corners(&grid);

        info!(
            section = %config.name,
            zoom = config.zoom,
            columns = grid.columns(),
            rows = grid.rows(),
            "Nr tiles: {}",
            grid.len()
        );
        info!(lon = top_left.longitude, lat = top_left.latitude, "top-left");
        info!(lon = bottom_right.longitude, lat = bottom_right.latitude, "bottom-right");
        debug!(
            bottom_right = %grid.bottom_right(),
            "Last tile column and row of the bounding box are excluded"
        );

        fs::create_dir_all(&config.dest)?;
        let cache = TileCache::new(&config.tilestore, config.source.clone(), Arc::clone(&self.fetcher))?;

        let tiles = Self::fetch_all(&grid, &cache, config.workers)?;

        let canvas = composite(&grid, self.tile_size, |tile| {
            tiles
                .get(tile)
                .map(Vec::as_slice)
                .ok_or_else(|| MapError::Fetch(format!("tile {} was not fetched", tile)))
        })?;

        let png_path = config.png_path();
        info!(path = %png_path.display(), "Saving to");
        canvas.save_png(&png_path)?;

        let metadata_path = config.metadata_path();
        MapMetadata::new(&config.name, &grid, &canvas, self.tile_size).save(&metadata_path)?;

        let tiff_path = match &self.transcoder {
            Some(transcoder) => {
                let path = config.tiff_path();
                export(&canvas, &grid, transcoder.as_ref(), &path)?;
                Some(path)
            }
            None => None,
        };

        let stats = cache.get_stats();
        info!(
            cached = stats.hits,
            downloaded = stats.downloads,
            bytes = stats.bytes_downloaded,
            "Map complete"
        );
        info!(
            tiles = stats.disk_tiles,
            size_mb = stats.disk_size_mb,
            path = %cache.cache_dir().display(),
            "Tile store"
        );

        Ok(MapReport {
            grid,
            png_path,
            metadata_path,
            tiff_path,
            top_left,
            bottom_right,
            cache: stats,
        })
    }

    /// Fetch every grid tile, in grid order when `workers` is 1, otherwise on
    /// a pool of `workers` threads. The first failure aborts the rest.
    fn fetch_all(
        grid: &TileGrid,
        cache: &TileCache,
        workers: usize,
    ) -> Result<HashMap<TileCoord, Vec<u8>>> {
        let total = grid.len();
        let done = AtomicUsize::new(0);

        let fetch_one = |tile: &TileCoord| -> Result<(TileCoord, Vec<u8>)> {
            let (bytes, origin) = cache.fetch_with_origin(tile)?;
            let index = done.fetch_add(1, Ordering::Relaxed) + 1;
            match origin {
                TileOrigin::Cached => info!("[{}/{}] {} cached", index, total, tile),
                TileOrigin::Downloaded => {
                    info!("[{}/{}] {} ok ({} bytes)", index, total, tile, bytes.len())
                }
            }
            Ok((*tile, bytes))
        };

        if workers <= 1 {
            return grid.tiles().iter().map(fetch_one).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("tile-fetch-{}", i))
            .build()
            .map_err(|e| MapError::Fetch(format!("Failed to start download pool: {}", e)))?;

        pool.install(|| grid.tiles().par_iter().map(fetch_one).collect())
    }
}
