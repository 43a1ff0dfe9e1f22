// SPDX-License-Identifier: MPL-2.0
//! Engine defaults, grouped so tuning values live in one place.

/// Number of resolved tiles kept in the cache beyond the visible set.
/// 15 tiles is roughly 100 MB of decoded pixel data.
pub const DEFAULT_TILE_CACHE_SLACK: usize = 15;

/// Number of section descriptors fetched per backend page request.
pub const DEFAULT_SECTIONS_PAGE_SIZE: usize = 500;

/// Parallel frame fetches the frames loader keeps in flight.
pub const DEFAULT_FRAME_FETCH_PARALLELISM: usize = 2;

/// Capacity of the decoded-frame LRU inside the frames loader worker.
pub const DEFAULT_FRAME_CACHE_CAPACITY: usize = 2048;

/// Upper bound for the camera zoom factor.
pub const DEFAULT_MAX_SCALE: f64 = 50.0;
