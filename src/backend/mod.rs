// SPDX-License-Identifier: MPL-2.0
//! Backend seams the engine streams content through.
//!
//! The traits return boxed futures so implementations can be stored as
//! trait objects behind `Arc` and their work spawned onto the runtime.
//! Production implementations live in [`http`]; tests substitute mocks.

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::item::SectionDescriptor;
use crate::tiles::TileKey;

pub mod http;

pub use http::HttpBackend;

/// Page window of a section request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: usize,
    pub size: usize,
}

/// Resolves tile coordinates to signed URLs and fetches tile bytes.
pub trait TileSource: Send + Sync {
    /// One round trip resolving a batch of tile coordinates into
    /// per-tile signed URLs.
    fn resolve_tile_urls(
        &self,
        tiles: Vec<TileKey>,
    ) -> BoxFuture<'static, Result<HashMap<TileKey, String>>>;

    /// Fetches the raw encoded bytes of one tile.
    fn fetch_tile(&self, url: String) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// Loads pages of section descriptors for a video-like slot.
pub trait SectionSource: Send + Sync {
    fn load_page(
        &self,
        item_id: String,
        slot_name: String,
        page: PageRequest,
    ) -> BoxFuture<'static, Result<Vec<SectionDescriptor>>>;
}

/// Fetches the raw encoded bytes of one frame by its signed URL.
pub trait FrameSource: Send + Sync {
    fn fetch_frame(&self, url: String) -> BoxFuture<'static, Result<Vec<u8>>>;
}

/// Wire body of the tile URL resolution request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileUrlRequest {
    pub content_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub tiles: Vec<WireTileCoord>,
}

/// Tile coordinate as the backend expects it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireTileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl From<TileKey> for WireTileCoord {
    fn from(key: TileKey) -> Self {
        Self {
            x: key.x,
            y: key.y,
            z: key.level,
        }
    }
}

/// Wire body of a section page response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionPageResponse {
    pub sections: Vec<SectionDescriptor>,
}
