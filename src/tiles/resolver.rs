// SPDX-License-Identifier: MPL-2.0
//! Visible-tile resolution and streaming for tiled images.
//!
//! One resolver pass computes the tile set covering the viewport,
//! requests missing tiles in a single batched URL round trip, prunes the
//! cache, and returns the descriptors for the render path. Fetch/decode
//! completions land asynchronously: they mutate the shared cache and
//! fire the repaint callback, provided the image is still loaded.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};

use crate::backend::TileSource;
use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::item::WindowLevels;

use super::{LevelMap, LoadedTiledImage, RenderableImage, Tile, TileCache, TileCacheEntry, TileKey};

/// Scheduled by the resolver whenever new pixel data becomes renderable.
pub type RepaintCallback = Arc<dyn Fn() + Send + Sync>;

/// Zoom level for a camera scale: each halving of the scale moves one
/// level up, clamped to the level map's range.
///
/// Level 0 (1px = 1px) covers scales in (50%, 100%], level 1 covers
/// (25%, 50%], and so on.
pub fn current_zoom_level(scale: f64, max_level: u32) -> u32 {
    let level = (-scale.log2()).round();
    level.clamp(0.0, f64::from(max_level)) as u32
}

/// Tile descriptors of one zoom level covering the viewport, clipped to
/// the level's tile grid.
fn tiles_for_zoom_level(levels: &LevelMap, camera: &Camera, zoom_level: u32) -> Vec<Tile> {
    let Some(geometry) = levels.get(zoom_level) else {
        return Vec::new();
    };

    let scale = camera.scale();
    let offset = camera.offset();
    // Surface-space footprint of one tile at this level.
    let footprint_w = f64::from(geometry.tile_width) * scale * geometry.pixel_ratio;
    let footprint_h = f64::from(geometry.tile_height) * scale * geometry.pixel_ratio;

    let left = (offset.x / footprint_w).floor() as i64;
    let right = ((camera.width + offset.x) / footprint_w).ceil() as i64 - 1;
    let top = (offset.y / footprint_h).floor() as i64;
    let bottom = ((camera.height + offset.y) / footprint_h).ceil() as i64 - 1;

    let mut tiles = Vec::new();
    for x in left..=right {
        if x < 0 || x >= i64::from(geometry.x_tiles) {
            continue;
        }
        for y in top..=bottom {
            if y < 0 || y >= i64::from(geometry.y_tiles) {
                continue;
            }
            tiles.push(Tile {
                key: TileKey::new(zoom_level, x as u32, y as u32),
                surface_x: x as f64 * footprint_w,
                surface_y: y as f64 * footprint_h,
                width: footprint_w,
                height: footprint_h,
            });
        }
    }

    tiles
}

/// Computes the visible tile set for `image` under `camera`, requesting
/// missing tiles of the current zoom level in one batched round trip.
///
/// Already-decoded tiles from levels above the current one are included
/// in the returned set (without being re-requested) so stale
/// lower-resolution pixels stay visible during zoom transitions.
/// Eviction of invisible resolved entries runs after the visible set is
/// computed, bounding the cache to `cache_slack + |visible|`.
///
/// Must be called from within a tokio runtime: the batch request and the
/// per-tile decodes are spawned tasks.
pub fn get_visible_tiles(
    image: &LoadedTiledImage,
    camera: &Camera,
    source: Arc<dyn TileSource>,
    repaint: RepaintCallback,
    cache_slack: usize,
) -> Result<Vec<Tile>> {
    let Some(max_level) = image.levels.max_level() else {
        return Err(Error::Item("tiled image has an empty level map".into()));
    };
    if camera.scale() <= 0.0 {
        return Err(Error::Item("camera scale must be positive".into()));
    }

    let current_level = current_zoom_level(camera.scale(), max_level);

    let mut visible: Vec<Tile> = Vec::new();
    let mut batch: Vec<TileKey> = Vec::new();
    {
        let mut cache = image.cache.lock().expect("tile cache poisoned");

        if current_level < max_level {
            for level in ((current_level + 1)..=max_level).rev() {
                for tile in tiles_for_zoom_level(&image.levels, camera, level) {
                    let decoded = cache.get(&tile.key).is_some_and(TileCacheEntry::is_loaded);
                    if decoded {
                        visible.push(tile);
                    }
                }
            }
        }

        for tile in tiles_for_zoom_level(&image.levels, camera, current_level) {
            if cache.needs_request(&tile.key) {
                cache.set(tile.key, TileCacheEntry::Loading);
                batch.push(tile.key);
            }
            visible.push(tile);
        }

        let visible_keys: HashSet<TileKey> = visible.iter().map(|tile| tile.key).collect();
        cache.evict_invisible(&visible_keys, cache_slack);
    }

    if !batch.is_empty() {
        spawn_batch_request(
            Arc::downgrade(&image.cache),
            source,
            batch,
            repaint,
            image.default_window,
        );
    }

    Ok(visible)
}

/// Resolves one batch of tile URLs, then fans out per-tile fetch/decode
/// tasks. A batch-level failure marks every requested tile errored so
/// the next visibility pass retries them.
fn spawn_batch_request(
    cache: Weak<Mutex<TileCache>>,
    source: Arc<dyn TileSource>,
    batch: Vec<TileKey>,
    repaint: RepaintCallback,
    default_window: WindowLevels,
) {
    tokio::spawn(async move {
        let urls = match source.resolve_tile_urls(batch.clone()).await {
            Ok(urls) => urls,
            Err(err) => {
                tracing::warn!(error = %err, "tile url batch request failed");
                mark_all(&cache, &batch, TileCacheEntry::Error);
                return;
            }
        };

        for key in batch {
            match urls.get(&key) {
                Some(url) => {
                    tokio::spawn(load_tile(
                        cache.clone(),
                        Arc::clone(&source) as Arc<dyn TileSource>,
                        key,
                        url.clone(),
                        repaint.clone(),
                        default_window,
                    ));
                }
                None => {
                    tracing::warn!(?key, "tile missing from url batch response");
                    mark_all(&cache, &[key], TileCacheEntry::Error);
                }
            }
        }
    });
}

async fn load_tile(
    cache: Weak<Mutex<TileCache>>,
    source: Arc<dyn TileSource>,
    key: TileKey,
    url: String,
    repaint: RepaintCallback,
    default_window: WindowLevels,
) {
    let bytes = match source.fetch_tile(url).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(?key, error = %err, "tile fetch failed");
            mark_all(&cache, &[key], TileCacheEntry::Error);
            return;
        }
    };

    match image_rs::load_from_memory(&bytes) {
        Ok(decoded) => {
            let entry = TileCacheEntry::Loaded(RenderableImage::new(
                decoded.to_rgba8(),
                default_window,
            ));
            if mark_all(&cache, &[key], entry) {
                repaint();
            }
        }
        Err(err) => {
            tracing::debug!(?key, error = %err, "tile decode failed");
            mark_all(&cache, &[key], TileCacheEntry::ImageError);
        }
    }
}

/// Applies `entry` to every key, unless the image has been unloaded in
/// the meantime. Returns whether the cache was still alive.
fn mark_all(cache: &Weak<Mutex<TileCache>>, keys: &[TileKey], entry: TileCacheEntry) -> bool {
    let Some(cache) = cache.upgrade() else {
        return false;
    };
    let mut cache = cache.lock().expect("tile cache poisoned");
    for key in keys {
        cache.set(*key, entry.clone());
    }
    true
}
