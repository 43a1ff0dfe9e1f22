// SPDX-License-Identifier: MPL-2.0
//! Workview is the viewport engine of an image/video annotation
//! workstation: tiled-image streaming with a bounded tile cache,
//! paginated frame streaming for video-like items, tool arbitration
//! with keybindings and commands, and a multi-view layout where
//! exactly one view is active.
//!
//! The crate is backend-agnostic: rendering surfaces and HTTP APIs
//! plug in through the traits in [`backend`] and the repaint callback.

pub mod annotation;
pub mod backend;
pub mod camera;
pub mod commands;
pub mod config;
pub mod editor;
pub mod error;
pub mod handles;
pub mod item;
pub mod layout;
pub mod streaming;
pub mod tiles;
pub mod tools;

pub use config::Config;
pub use editor::Editor;
pub use error::{Error, Result};
