// SPDX-License-Identifier: MPL-2.0
//! Tiled image model: multi-resolution level maps, the composite tile
//! key and the per-image tile cache.
//!
//! The cache is owned by one image's loaded state and mutated only by
//! the [`resolver`]; the render path reads it on the UI thread.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::item::WindowLevels;

pub mod resolver;

pub use resolver::{get_visible_tiles, RepaintCallback};

/// Color map applied to freshly decoded pixel data.
pub const DEFAULT_COLOR_MAP: &str = "default";

/// Geometry of one zoom level of a tiled image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub tile_width: u32,
    pub tile_height: u32,
    pub x_tiles: u32,
    pub y_tiles: u32,
    /// Content units covered by one source pixel at this level.
    pub pixel_ratio: f64,
}

impl Level {
    pub fn new(tile_width: u32, tile_height: u32, x_tiles: u32, y_tiles: u32, pixel_ratio: f64) -> Self {
        Self {
            tile_width,
            tile_height,
            x_tiles,
            y_tiles,
            pixel_ratio,
        }
    }
}

/// Ordered map from zoom-level index to level geometry. Level 0 is the
/// native resolution; each higher level halves the scale range it covers.
/// Immutable once loaded from the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelMap {
    levels: BTreeMap<u32, Level>,
}

impl LevelMap {
    pub fn insert(&mut self, level: u32, geometry: Level) {
        self.levels.insert(level, geometry);
    }

    pub fn get(&self, level: u32) -> Option<&Level> {
        self.levels.get(&level)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The most zoomed-out level. `None` for an empty map, which callers
    /// must treat as a hard error.
    pub fn max_level(&self) -> Option<u32> {
        self.levels.keys().next_back().copied()
    }
}

/// Composite tile address: zoom level plus tile grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileKey {
    pub level: u32,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// Wire form used by the tile URL endpoint: `#z#y#x`.
    pub fn wire_key(&self) -> String {
        format!("#{}#{}#{}", self.level, self.y, self.x)
    }
}

/// A decoded, renderable tile or frame with its display metadata.
#[derive(Debug, Clone)]
pub struct RenderableImage {
    pub image: Arc<image_rs::RgbaImage>,
    pub window_levels: WindowLevels,
    pub color_map: String,
}

impl RenderableImage {
    pub fn new(image: image_rs::RgbaImage, window_levels: WindowLevels) -> Self {
        Self {
            image: Arc::new(image),
            window_levels,
            color_map: DEFAULT_COLOR_MAP.to_string(),
        }
    }
}

/// State of one tile cache slot.
#[derive(Debug, Clone)]
pub enum TileCacheEntry {
    /// A URL/fetch request is in flight. At most one per key.
    Loading,
    /// The URL batch or tile fetch failed; eligible for retry on the
    /// next visibility pass.
    Error,
    /// The fetched bytes could not be decoded.
    ImageError,
    Loaded(RenderableImage),
}

impl TileCacheEntry {
    pub fn is_loading(&self) -> bool {
        matches!(self, TileCacheEntry::Loading)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, TileCacheEntry::Loaded(_))
    }
}

/// Per-image tile cache.
#[derive(Debug, Default)]
pub struct TileCache {
    entries: HashMap<TileKey, TileCacheEntry>,
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &TileKey) -> Option<&TileCacheEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a request should be created for this key. Errored entries
    /// do not block a new attempt: the retry policy is a silent re-request
    /// on the next visibility pass.
    pub fn needs_request(&self, key: &TileKey) -> bool {
        !matches!(
            self.entries.get(key),
            Some(TileCacheEntry::Loading) | Some(TileCacheEntry::Loaded(_))
        )
    }

    pub fn set(&mut self, key: TileKey, entry: TileCacheEntry) {
        self.entries.insert(key, entry);
    }

    /// Number of entries that are resolved, i.e. not in flight.
    pub fn resolved_len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.is_loading())
            .count()
    }

    /// Prunes resolved entries outside the visible set once the cache
    /// exceeds `slack + |visible|`. In-flight entries are never evicted.
    pub fn evict_invisible(&mut self, visible: &HashSet<TileKey>, slack: usize) {
        if self.entries.len() <= slack + visible.len() {
            return;
        }
        self.entries
            .retain(|key, entry| entry.is_loading() || visible.contains(key));
    }
}

/// Loaded state of one tiled image: level map plus the shared tile cache.
///
/// The cache is behind a mutex because resolution/decode tasks complete
/// off the UI thread; liveness of in-flight requests follows the `Arc`.
#[derive(Debug, Clone)]
pub struct LoadedTiledImage {
    pub levels: LevelMap,
    pub cache: Arc<Mutex<TileCache>>,
    pub default_window: WindowLevels,
}

impl LoadedTiledImage {
    pub fn new(levels: LevelMap, default_window: WindowLevels) -> Self {
        Self {
            levels,
            cache: Arc::new(Mutex::new(TileCache::new())),
            default_window,
        }
    }
}

/// A visible tile descriptor: grid coordinates plus the surface-space
/// footprint the renderer draws it into. Pixel data is looked up in the
/// image's cache by `key`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub key: TileKey,
    /// Surface-space position of the tile's top-left corner.
    pub surface_x: f64,
    pub surface_y: f64,
    /// Surface-space footprint.
    pub width: f64,
    pub height: f64,
}
