// SPDX-License-Identifier: MPL-2.0
//! A single viewport bound to one item slot.

use std::sync::Arc;

use crate::annotation::AnnotationLayer;
use crate::backend::TileSource;
use crate::camera::Camera;
use crate::error::{Error, Result};
use crate::handles::Handle;
use crate::item::{Item, Slot};
use crate::streaming::FrameStreamManager;
use crate::tiles::{get_visible_tiles, LoadedTiledImage, RepaintCallback, Tile};

/// The closed set of view kinds. A slot maps to exactly one of these;
/// switching between kinds replaces the view instead of rebinding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewClass {
    /// Plain raster image.
    Image,
    /// Multi-resolution tiled image.
    Tiled,
    /// Video-like frame sequence.
    Stream,
}

impl ViewClass {
    pub fn for_slot(slot: &Slot) -> Self {
        if slot.is_tiled() {
            ViewClass::Tiled
        } else if slot.is_processed_as_video() {
            ViewClass::Stream
        } else {
            ViewClass::Image
        }
    }
}

/// Pixel source backing a view, matching its [`ViewClass`].
pub enum ViewContent {
    Image {
        image: Option<Arc<crate::tiles::RenderableImage>>,
    },
    Tiled(LoadedTiledImage),
    Stream(FrameStreamManager),
}

impl std::fmt::Debug for ViewContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewContent::Image { image } => f
                .debug_struct("Image")
                .field("loaded", &image.is_some())
                .finish(),
            ViewContent::Tiled(_) => f.debug_tuple("Tiled").finish(),
            ViewContent::Stream(_) => f.debug_tuple("Stream").finish(),
        }
    }
}

/// One viewport: camera, annotation layer and the content it renders.
pub struct View {
    pub id: u64,
    pub class: ViewClass,
    pub camera: Camera,
    pub annotations: AnnotationLayer,
    item: Item,
    content: ViewContent,
    event_subscription: Option<Handle>,
    repaint: RepaintCallback,
}

impl View {
    pub(super) fn new(
        id: u64,
        item: Item,
        content: ViewContent,
        max_scale: f64,
        repaint: RepaintCallback,
    ) -> Self {
        Self {
            id,
            class: ViewClass::for_slot(&item.slot),
            camera: Camera::new(max_scale),
            annotations: AnnotationLayer::default(),
            item,
            content,
            event_subscription: None,
            repaint,
        }
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn stream(&self) -> Option<&FrameStreamManager> {
        match &self.content {
            ViewContent::Stream(manager) => Some(manager),
            _ => None,
        }
    }

    pub fn tiled(&self) -> Option<&LoadedTiledImage> {
        match &self.content {
            ViewContent::Tiled(image) => Some(image),
            _ => None,
        }
    }

    pub fn set_image(&mut self, image: Arc<crate::tiles::RenderableImage>) {
        if let ViewContent::Image { image: slot } = &mut self.content {
            let (width, height) = (image.image.width(), image.image.height());
            *slot = Some(image);
            self.camera
                .set_content_size(f64::from(width), f64::from(height), true);
            (self.repaint)();
        }
    }

    /// Rebinds the view to a new same-class item, dropping old content.
    pub(super) fn set_item(&mut self, item: Item, content: ViewContent) {
        debug_assert_eq!(self.class, ViewClass::for_slot(&item.slot));
        self.release_content();
        self.item = item;
        self.content = content;
        (self.repaint)();
    }

    /// Visible tiles of a tiled view, streaming missing ones.
    pub fn visible_tiles(
        &self,
        tiles: &Arc<dyn TileSource>,
        cache_slack: usize,
    ) -> Result<Vec<Tile>> {
        match &self.content {
            ViewContent::Tiled(image) => get_visible_tiles(
                image,
                &self.camera,
                Arc::clone(tiles),
                self.repaint.clone(),
                cache_slack,
            ),
            _ => Err(Error::Item("view has no tiled content".into())),
        }
    }

    /// Attaches this view's event listeners. Only the active view has
    /// them attached.
    pub(super) fn attach_listeners(&mut self) {
        if self.event_subscription.is_some() {
            return;
        }
        self.event_subscription = Some(match &self.content {
            ViewContent::Stream(manager) => {
                let repaint = self.repaint.clone();
                manager.on_event(move |_| repaint())
            }
            _ => Handle::noop(),
        });
    }

    pub(super) fn detach_listeners(&mut self) {
        if let Some(mut subscription) = self.event_subscription.take() {
            subscription.release();
        }
    }

    pub fn has_listeners(&self) -> bool {
        self.event_subscription.is_some()
    }

    /// Tears the view down. Streaming content stops and drops its
    /// caches.
    pub(super) fn destroy(&mut self) {
        self.detach_listeners();
        self.annotations.clear();
        self.release_content();
    }

    fn release_content(&mut self) {
        if let ViewContent::Stream(manager) = &self.content {
            manager.cleanup();
        }
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("item", &self.item.id)
            .field("content", &self.content)
            .finish()
    }
}
