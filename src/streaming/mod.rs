// SPDX-License-Identifier: MPL-2.0
//! Frame streaming for video-like slots: paginated section metadata,
//! background frame prefetch and quality-aware frame access.

pub mod frames_loader;
pub mod manager;

pub use frames_loader::{FrameQuality, FramesLoader, LoaderCommand, LoaderEvent, LoaderOptions};
pub use manager::{FrameStreamManager, StreamEvent};
