// SPDX-License-Identifier: MPL-2.0
//! Viewport layout: which views exist, what they show and which one
//! receives input.
//!
//! Rebinding a view to a new item reuses the view when the item's class
//! matches (camera and content survive the swap) and replaces it
//! otherwise. Exactly one view is active, and only the active view has
//! its listeners attached.

pub mod view;

pub use view::{View, ViewClass, ViewContent};

use std::sync::Arc;

use crate::backend::{FrameSource, SectionSource, TileSource};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::item::Item;
use crate::streaming::FrameStreamManager;
use crate::tiles::{LoadedTiledImage, RepaintCallback};

/// Arrangement of the layout's views on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutKind {
    #[default]
    Single,
    Vertical,
    Horizontal,
    Grid,
}

/// Backend sources views pull their pixel data from.
#[derive(Clone)]
pub struct ViewSources {
    pub tiles: Arc<dyn TileSource>,
    pub sections: Arc<dyn SectionSource>,
    pub frames: Arc<dyn FrameSource>,
}

/// What [`Layout::set_view_config`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewUpdate {
    /// Same item already bound; nothing happened.
    Unchanged,
    /// Same view class; the existing view was rebound in place.
    Reused,
    /// Different view class; the view was torn down and recreated.
    Replaced,
    /// A new view slot was filled.
    Created,
}

pub struct Layout {
    kind: LayoutKind,
    views: Vec<View>,
    active: Option<u64>,
    next_view_id: u64,
    sources: ViewSources,
    config: Config,
    repaint: RepaintCallback,
}

impl Layout {
    pub fn new(
        kind: LayoutKind,
        sources: ViewSources,
        config: Config,
        repaint: RepaintCallback,
    ) -> Self {
        Self {
            kind,
            views: Vec::new(),
            active: None,
            next_view_id: 0,
            sources,
            config,
            repaint,
        }
    }

    pub fn kind(&self) -> LayoutKind {
        self.kind
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn view_at(&self, index: usize) -> Option<&View> {
        self.views.get(index)
    }

    pub fn view_at_mut(&mut self, index: usize) -> Option<&mut View> {
        self.views.get_mut(index)
    }

    pub fn active_view(&self) -> Option<&View> {
        let id = self.active?;
        self.views.iter().find(|view| view.id == id)
    }

    pub fn active_view_mut(&mut self) -> Option<&mut View> {
        let id = self.active?;
        self.views.iter_mut().find(|view| view.id == id)
    }

    /// Binds `item` to the view slot at `index`, creating the slot when
    /// it is one past the end. Newly created or replaced views become
    /// active.
    pub fn set_view_config(&mut self, index: usize, item: Item) -> Result<ViewUpdate> {
        if index > self.views.len() {
            return Err(Error::Item(format!(
                "view index {index} out of range ({} views)",
                self.views.len()
            )));
        }

        if index == self.views.len() {
            let view = self.create_view(item)?;
            let id = view.id;
            self.views.push(view);
            self.set_active_view(id);
            return Ok(ViewUpdate::Created);
        }

        let existing = &self.views[index];
        if existing.item().id == item.id {
            return Ok(ViewUpdate::Unchanged);
        }

        if existing.class == ViewClass::for_slot(&item.slot) {
            let content = self.create_content(&item)?;
            let view = &mut self.views[index];
            view.annotations.clear();
            view.set_item(item, content);
            return Ok(ViewUpdate::Reused);
        }

        let mut replacement = self.create_view(item)?;
        let id = replacement.id;
        std::mem::swap(&mut self.views[index], &mut replacement);
        replacement.destroy();
        if self.active == Some(replacement.id) {
            self.active = None;
        }
        self.set_active_view(id);
        Ok(ViewUpdate::Replaced)
    }

    /// Makes `id` the active view. Returns whether the active view
    /// changed; listeners move over when it did.
    pub fn set_active_view(&mut self, id: u64) -> bool {
        if self.active == Some(id) {
            return false;
        }
        if !self.views.iter().any(|view| view.id == id) {
            tracing::warn!(view = id, "cannot activate unknown view");
            return false;
        }
        for view in &mut self.views {
            if view.id == id {
                view.attach_listeners();
            } else {
                view.detach_listeners();
            }
        }
        self.active = Some(id);
        true
    }

    /// Destroys every view.
    pub fn cleanup(&mut self) {
        for view in &mut self.views {
            view.destroy();
        }
        self.views.clear();
        self.active = None;
    }

    fn create_view(&mut self, item: Item) -> Result<View> {
        let content = self.create_content(&item)?;
        let id = self.next_view_id;
        self.next_view_id += 1;
        Ok(View::new(
            id,
            item,
            content,
            self.config.max_scale(),
            self.repaint.clone(),
        ))
    }

    fn create_content(&self, item: &Item) -> Result<ViewContent> {
        match ViewClass::for_slot(&item.slot) {
            ViewClass::Image => Ok(ViewContent::Image { image: None }),
            ViewClass::Tiled => {
                let levels = item
                    .slot
                    .level_map()
                    .cloned()
                    .ok_or_else(|| Error::Item("tiled slot without level map".into()))?;
                Ok(ViewContent::Tiled(LoadedTiledImage::new(
                    levels,
                    item.slot.default_window(),
                )))
            }
            ViewClass::Stream => Ok(ViewContent::Stream(FrameStreamManager::new(
                item,
                Arc::clone(&self.sources.sections),
                Arc::clone(&self.sources.frames),
                &self.config,
                self.repaint.clone(),
            ))),
        }
    }
}

impl std::fmt::Debug for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layout")
            .field("kind", &self.kind)
            .field("views", &self.views)
            .field("active", &self.active)
            .finish()
    }
}
