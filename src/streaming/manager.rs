// SPDX-License-Identifier: MPL-2.0
//! Paginated section loading and frame access for one video-like slot.
//!
//! The manager owns the section page cache and an off-thread
//! [`FramesLoader`]. Section pages load through a single-flight guard so
//! concurrent requests for the same page produce one backend round
//! trip. Frame readiness is tracked here and surfaced through
//! [`StreamEvent`] subscriptions plus the repaint callback.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{mpsc, oneshot};

use crate::backend::{FrameSource, PageRequest, SectionSource};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::handles::{Handle, Listeners};
use crate::item::{Item, SectionDescriptor, Slot};
use crate::tiles::{RenderableImage, RepaintCallback};

use super::frames_loader::{
    FrameQuality, FramesLoader, LoaderCommand, LoaderEvent, LoaderOptions,
};

/// Lifecycle events of a streaming slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// Section metadata started loading.
    FileLoading,
    /// The initial section page is in.
    FileLoaded,
    /// A frame's pixel data became renderable.
    FrameLoaded { index: usize, is_hq: bool },
}

/// Frame stream manager for one item slot. Cheap to clone.
#[derive(Clone)]
pub struct FrameStreamManager {
    inner: Arc<Inner>,
}

struct Inner {
    item_id: String,
    slot: Slot,
    section_source: Arc<dyn SectionSource>,
    page_size: usize,

    sections: Mutex<HashMap<usize, SectionDescriptor>>,
    loaded_pages: Mutex<HashSet<usize>>,
    /// Serializes page loads: one backend request per page, ever.
    page_guard: tokio::sync::Mutex<()>,

    lq_loaded: Mutex<HashSet<usize>>,
    hq_loaded: Mutex<HashSet<usize>>,

    events: Listeners<StreamEvent>,
    loader: FramesLoader,
    pending: Mutex<HashMap<u64, oneshot::Sender<Option<Arc<RenderableImage>>>>>,
    next_request_id: AtomicU64,
    repaint: RepaintCallback,
}

impl FrameStreamManager {
    /// Creates the manager and spawns its loader and event-routing
    /// tasks. Must be called within a tokio runtime.
    pub fn new(
        item: &Item,
        section_source: Arc<dyn SectionSource>,
        frame_source: Arc<dyn FrameSource>,
        config: &Config,
        repaint: RepaintCallback,
    ) -> Self {
        let slot = item.slot.clone();
        let (loader, event_rx) = FramesLoader::spawn(
            frame_source,
            LoaderOptions {
                total_frames: slot.total_sections,
                parallelism: config.frame_fetch_parallelism(),
                cache_capacity: config.frame_cache_capacity(),
                default_window: slot.default_window(),
            },
        );

        let inner = Arc::new(Inner {
            item_id: item.id.clone(),
            slot,
            section_source,
            page_size: config.sections_page_size(),
            sections: Mutex::new(HashMap::new()),
            loaded_pages: Mutex::new(HashSet::new()),
            page_guard: tokio::sync::Mutex::new(()),
            lq_loaded: Mutex::new(HashSet::new()),
            hq_loaded: Mutex::new(HashSet::new()),
            events: Listeners::new(),
            loader,
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(0),
            repaint,
        });

        tokio::spawn(route_loader_events(Arc::downgrade(&inner), event_rx));
        Self { inner }
    }

    /// Subscribes to stream lifecycle events.
    pub fn on_event(&self, callback: impl Fn(&StreamEvent) + Send + Sync + 'static) -> Handle {
        self.inner.events.subscribe(callback)
    }

    pub fn fps(&self) -> f64 {
        self.inner.slot.fps()
    }

    pub fn total_sections(&self) -> usize {
        self.inner.slot.total_sections
    }

    /// Starts streaming: loads the first section page and kicks off
    /// background prefetch.
    pub async fn load_frames(&self) -> Result<()> {
        if self.inner.slot.is_tiled() {
            return Err(Error::Item(
                "tiled images are viewed through tiles, not frame streaming".into(),
            ));
        }
        // Subscribers can only attach after construction, so this is
        // the earliest point a loading notification can be observed.
        self.inner.events.emit(&StreamEvent::FileLoading);
        self.load_page(0).await?;
        self.inner.loader.send(LoaderCommand::StartPrefetch);
        self.inner.events.emit(&StreamEvent::FileLoaded);
        (self.inner.repaint)();
        Ok(())
    }

    /// The section descriptor for `index`, loading its page on demand.
    pub async fn get_section(&self, index: usize) -> Result<SectionDescriptor> {
        if index >= self.inner.slot.total_sections {
            return Err(Error::Item(format!(
                "section {index} out of range (total {})",
                self.inner.slot.total_sections
            )));
        }
        if let Some(section) = self.lookup_section(index) {
            return Ok(section);
        }

        let offset = (index / self.inner.page_size) * self.inner.page_size;
        self.load_page(offset).await?;

        self.lookup_section(index)
            .ok_or_else(|| Error::Item(format!("section {index} missing from loaded page")))
    }

    /// Low-quality frame. `Ok(None)` means the frame failed to load;
    /// with `fallback_hq` the high-quality variant is tried instead.
    pub async fn get_lq_frame(
        &self,
        index: usize,
        fallback_hq: bool,
    ) -> Result<Option<Arc<RenderableImage>>> {
        self.get_section(index).await?;
        match self.request_frame(index, FrameQuality::Low).await {
            Some(frame) => Ok(Some(frame)),
            None if fallback_hq => {
                tracing::warn!(index, "low quality frame failed, falling back to high quality");
                self.get_hq_frame(index).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// High-quality frame. Unlike the LQ path a failure here is an
    /// error.
    pub async fn get_hq_frame(&self, index: usize) -> Result<Arc<RenderableImage>> {
        self.get_section(index).await?;
        self.request_frame(index, FrameQuality::High)
            .await
            .ok_or_else(|| Error::Decode(format!("high quality frame {index} failed to load")))
    }

    /// Re-aims background prefetch, typically on seek.
    pub fn set_next_frame_to_load(&self, index: usize) {
        self.inner.loader.send(LoaderCommand::SetNextFrameToLoad(index));
    }

    pub fn is_frame_loaded(&self, index: usize) -> bool {
        self.inner
            .lq_loaded
            .lock()
            .expect("frame index set poisoned")
            .contains(&index)
    }

    pub fn is_hq_frame_loaded(&self, index: usize) -> bool {
        self.inner
            .hq_loaded
            .lock()
            .expect("frame index set poisoned")
            .contains(&index)
    }

    /// Drops all cached sections, readiness state and listeners.
    /// Outstanding frame requests resolve as failed.
    pub fn cleanup(&self) {
        self.inner.sections.lock().expect("section map poisoned").clear();
        self.inner
            .loaded_pages
            .lock()
            .expect("page set poisoned")
            .clear();
        self.inner
            .lq_loaded
            .lock()
            .expect("frame index set poisoned")
            .clear();
        self.inner
            .hq_loaded
            .lock()
            .expect("frame index set poisoned")
            .clear();
        self.inner.pending.lock().expect("pending map poisoned").clear();
        self.inner.events.clear();
        self.inner.loader.send(LoaderCommand::Cleanup);
    }

    fn lookup_section(&self, index: usize) -> Option<SectionDescriptor> {
        self.inner
            .sections
            .lock()
            .expect("section map poisoned")
            .get(&index)
            .cloned()
    }

    async fn load_page(&self, offset: usize) -> Result<()> {
        let already = self
            .inner
            .loaded_pages
            .lock()
            .expect("page set poisoned")
            .contains(&offset);
        if already {
            return Ok(());
        }

        let _guard = self.inner.page_guard.lock().await;
        // Another caller may have loaded the page while we waited.
        let already = self
            .inner
            .loaded_pages
            .lock()
            .expect("page set poisoned")
            .contains(&offset);
        if already {
            return Ok(());
        }

        let page = self
            .inner
            .section_source
            .load_page(
                self.inner.item_id.clone(),
                self.inner.slot.slot_name.clone(),
                PageRequest {
                    offset,
                    size: self.inner.page_size,
                },
            )
            .await?;

        {
            let mut sections = self.inner.sections.lock().expect("section map poisoned");
            for section in &page {
                sections.insert(section.section_index, section.clone());
            }
        }
        self.inner.loader.send(LoaderCommand::PushSections(page));
        self.inner
            .loaded_pages
            .lock()
            .expect("page set poisoned")
            .insert(offset);
        Ok(())
    }

    async fn request_frame(
        &self,
        index: usize,
        quality: FrameQuality,
    ) -> Option<Arc<RenderableImage>> {
        let request_id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .expect("pending map poisoned")
            .insert(request_id, tx);
        self.inner.loader.send(LoaderCommand::LoadFrame {
            index,
            quality,
            request_id,
        });
        rx.await.ok().flatten()
    }
}

/// Routes loader events into manager state until the manager is
/// dropped.
async fn route_loader_events(
    inner: Weak<Inner>,
    mut event_rx: mpsc::UnboundedReceiver<LoaderEvent>,
) {
    while let Some(event) = event_rx.recv().await {
        let Some(inner) = inner.upgrade() else { break };
        match event {
            LoaderEvent::FrameLoaded { index, is_hq } => {
                inner
                    .lq_loaded
                    .lock()
                    .expect("frame index set poisoned")
                    .insert(index);
                if is_hq {
                    inner
                        .hq_loaded
                        .lock()
                        .expect("frame index set poisoned")
                        .insert(index);
                }
                inner.events.emit(&StreamEvent::FrameLoaded { index, is_hq });
                (inner.repaint)();
            }
            LoaderEvent::FrameResponse { request_id, frame } => {
                let sender = inner
                    .pending
                    .lock()
                    .expect("pending map poisoned")
                    .remove(&request_id);
                if let Some(sender) = sender {
                    let _ = sender.send(frame);
                }
            }
            LoaderEvent::SectionNeeded { index } => {
                let manager = FrameStreamManager { inner };
                tokio::spawn(async move {
                    if let Err(err) = manager.get_section(index).await {
                        tracing::warn!(index, error = %err, "section load for prefetch failed");
                    }
                });
            }
        }
    }
}
