// SPDX-License-Identifier: MPL-2.0
//! Data items bound to views: images, tiled images and video-like
//! sequences, plus the per-slot metadata delivered by the backend.

use serde::{Deserialize, Serialize};

use crate::tiles::LevelMap;

/// Default playback rate when the backend reports none.
pub const DEFAULT_FPS: f64 = 24.0;

/// Workflow status of an item. `Complete` items are read-only-ish: only
/// a safe subset of tools stays available for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    New,
    Annotate,
    Review,
    Complete,
}

/// The underlying media kind of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Image,
    Video,
    Dicom,
    Pdf,
}

/// Default window-level range applied to freshly decoded tiles/frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WindowLevels {
    pub min: i32,
    pub max: i32,
}

/// Per-slot metadata supplied by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotMetadata {
    #[serde(default)]
    pub native_fps: Option<f64>,
    #[serde(default)]
    pub default_window: Option<WindowLevels>,
    /// Present only for tiled (multi-resolution) images.
    #[serde(default)]
    pub levels: Option<LevelMap>,
}

/// One slot of a data item: the unit a view binds to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    pub file_name: String,
    pub slot_name: String,
    pub kind: ItemKind,
    pub total_sections: usize,
    #[serde(default)]
    pub metadata: Option<SlotMetadata>,
}

impl Slot {
    pub fn is_image(&self) -> bool {
        self.kind == ItemKind::Image
    }

    pub fn is_video(&self) -> bool {
        self.kind == ItemKind::Video
    }

    /// A tiled image is an image slot whose metadata carries a level map.
    pub fn is_tiled(&self) -> bool {
        self.kind == ItemKind::Image
            && self
                .metadata
                .as_ref()
                .is_some_and(|m| m.levels.is_some())
    }

    /// Video, DICOM and PDF slots all stream frame sequences.
    pub fn is_processed_as_video(&self) -> bool {
        matches!(self.kind, ItemKind::Video | ItemKind::Dicom | ItemKind::Pdf)
    }

    pub fn fps(&self) -> f64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.native_fps)
            .unwrap_or(DEFAULT_FPS)
    }

    pub fn level_map(&self) -> Option<&LevelMap> {
        self.metadata.as_ref().and_then(|m| m.levels.as_ref())
    }

    pub fn default_window(&self) -> WindowLevels {
        self.metadata
            .as_ref()
            .and_then(|m| m.default_window)
            .unwrap_or_default()
    }
}

/// An annotatable data item together with the slot a view binds to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub status: ItemStatus,
    pub slot: Slot,
}

/// One section of a paginated video-like sequence: dimensions plus the
/// low/high quality frame URLs consumed by the frames loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionDescriptor {
    pub section_index: usize,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub hq_url: Option<String>,
    #[serde(default)]
    pub lq_url: Option<String>,
}
