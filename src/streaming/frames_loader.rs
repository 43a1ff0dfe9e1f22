// SPDX-License-Identifier: MPL-2.0
//! Background frame loader for video-like sequences.
//!
//! The loader runs as a spawned task driven by a command channel and
//! reports back over an event channel, keeping fetches and decodes off
//! the caller's thread. It prefetches low-quality frames outward from a
//! movable playback cursor, serves explicit frame requests matched by
//! correlation id, and asks for section descriptors it does not have.

use std::collections::{HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::mpsc;

use crate::backend::FrameSource;
use crate::error::{Error, Result};
use crate::item::{SectionDescriptor, WindowLevels};
use crate::tiles::RenderableImage;

/// Requested decode quality of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameQuality {
    Low,
    High,
}

/// Commands accepted by the loader task.
#[derive(Debug)]
pub enum LoaderCommand {
    /// Section descriptors for frames the loader asked about (or that
    /// arrived with a page load).
    PushSections(Vec<SectionDescriptor>),
    /// Starts background prefetch. Until this arrives only explicit
    /// [`LoaderCommand::LoadFrame`] requests are served.
    StartPrefetch,
    /// Moves the prefetch cursor, typically on seek.
    SetNextFrameToLoad(usize),
    /// Explicit frame request. Answered with a
    /// [`LoaderEvent::FrameResponse`] carrying the same `request_id`.
    LoadFrame {
        index: usize,
        quality: FrameQuality,
        request_id: u64,
    },
    /// Drops all cached pixel data and pending work.
    Cleanup,
}

/// Events emitted by the loader task.
#[derive(Debug)]
pub enum LoaderEvent {
    /// A frame's pixel data became available.
    FrameLoaded { index: usize, is_hq: bool },
    /// Answer to a [`LoaderCommand::LoadFrame`]. `None` means the fetch
    /// or decode failed.
    FrameResponse {
        request_id: u64,
        frame: Option<Arc<RenderableImage>>,
    },
    /// The loader needs the section descriptor for `index` before it
    /// can fetch the frame.
    SectionNeeded { index: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    /// Total number of frames in the sequence.
    pub total_frames: usize,
    /// Concurrent fetches.
    pub parallelism: usize,
    /// Decoded-frame store capacity.
    pub cache_capacity: usize,
    /// Window applied to freshly decoded frames.
    pub default_window: WindowLevels,
}

/// Handle to a spawned loader task. Dropping it closes the command
/// channel and shuts the task down once in-flight fetches settle.
#[derive(Debug, Clone)]
pub struct FramesLoader {
    command_tx: mpsc::UnboundedSender<LoaderCommand>,
}

impl FramesLoader {
    /// Spawns the loader task. Must be called within a tokio runtime.
    pub fn spawn(
        source: Arc<dyn FrameSource>,
        options: LoaderOptions,
    ) -> (Self, mpsc::UnboundedReceiver<LoaderEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_loader(source, options, command_rx, event_tx));
        (Self { command_tx }, event_rx)
    }

    /// Sends a command, ignoring failures after shutdown.
    pub fn send(&self, command: LoaderCommand) {
        let _ = self.command_tx.send(command);
    }
}

struct Completion {
    index: usize,
    is_hq: bool,
    result: Result<Arc<RenderableImage>>,
}

#[derive(Clone)]
struct CachedFrame {
    image: Arc<RenderableImage>,
    is_hq: bool,
}

struct PendingRequest {
    request_id: u64,
    quality: FrameQuality,
}

struct LoaderState {
    source: Arc<dyn FrameSource>,
    options: LoaderOptions,
    event_tx: mpsc::UnboundedSender<LoaderEvent>,
    completion_tx: mpsc::UnboundedSender<Completion>,

    sections: HashMap<usize, SectionDescriptor>,
    store: LruCache<usize, CachedFrame>,
    /// Frames fetched at least once; prefetch skips them even after LRU
    /// eviction.
    fetched: HashSet<usize>,
    failed: HashSet<usize>,
    in_flight: HashSet<usize>,
    section_requested: HashSet<usize>,
    cursor: usize,
    prefetch_enabled: bool,
    explicit: VecDeque<(usize, FrameQuality)>,
    pending: HashMap<usize, Vec<PendingRequest>>,
}

async fn run_loader(
    source: Arc<dyn FrameSource>,
    options: LoaderOptions,
    mut command_rx: mpsc::UnboundedReceiver<LoaderCommand>,
    event_tx: mpsc::UnboundedSender<LoaderEvent>,
) {
    let capacity = NonZeroUsize::new(options.cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();
    let mut state = LoaderState {
        source,
        options,
        event_tx,
        completion_tx,
        sections: HashMap::new(),
        store: LruCache::new(capacity),
        fetched: HashSet::new(),
        failed: HashSet::new(),
        in_flight: HashSet::new(),
        section_requested: HashSet::new(),
        cursor: 0,
        prefetch_enabled: false,
        explicit: VecDeque::new(),
        pending: HashMap::new(),
    };

    loop {
        tokio::select! {
            command = command_rx.recv() => {
                let Some(command) = command else { break };
                state.handle_command(command);
            }
            Some(completion) = completion_rx.recv() => {
                state.handle_completion(completion);
            }
        }
        state.pump();
    }
}

impl LoaderState {
    fn handle_command(&mut self, command: LoaderCommand) {
        match command {
            LoaderCommand::PushSections(sections) => {
                for section in sections {
                    self.section_requested.remove(&section.section_index);
                    self.sections.insert(section.section_index, section);
                }
            }
            LoaderCommand::StartPrefetch => {
                self.prefetch_enabled = true;
            }
            LoaderCommand::SetNextFrameToLoad(index) => {
                self.cursor = index;
            }
            LoaderCommand::LoadFrame {
                index,
                quality,
                request_id,
            } => {
                let hit = self.store.get(&index).and_then(|cached| {
                    (quality == FrameQuality::Low || cached.is_hq)
                        .then(|| cached.image.clone())
                });
                if let Some(image) = hit {
                    self.respond(request_id, Some(image));
                    return;
                }
                self.failed.remove(&index);
                self.pending
                    .entry(index)
                    .or_default()
                    .push(PendingRequest { request_id, quality });
                self.explicit.push_back((index, quality));
            }
            LoaderCommand::Cleanup => {
                self.store.clear();
                self.sections.clear();
                self.fetched.clear();
                self.failed.clear();
                self.section_requested.clear();
                self.explicit.clear();
                self.cursor = 0;
                self.prefetch_enabled = false;
                for (_, requests) in self.pending.drain() {
                    for request in requests {
                        let _ = self.event_tx.send(LoaderEvent::FrameResponse {
                            request_id: request.request_id,
                            frame: None,
                        });
                    }
                }
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        let Completion {
            index,
            is_hq,
            result,
        } = completion;
        self.in_flight.remove(&index);

        match result {
            Ok(image) => {
                let overwrite_ok = !self
                    .store
                    .peek(&index)
                    .is_some_and(|cached| cached.is_hq && !is_hq);
                if overwrite_ok {
                    self.store.put(
                        index,
                        CachedFrame {
                            image: image.clone(),
                            is_hq,
                        },
                    );
                }
                self.fetched.insert(index);
                self.failed.remove(&index);
                let _ = self
                    .event_tx
                    .send(LoaderEvent::FrameLoaded { index, is_hq });

                let mut still_waiting = Vec::new();
                for request in self.pending.remove(&index).unwrap_or_default() {
                    match request.quality {
                        FrameQuality::Low => self.respond(request.request_id, Some(image.clone())),
                        FrameQuality::High if is_hq => {
                            self.respond(request.request_id, Some(image.clone()));
                        }
                        FrameQuality::High => still_waiting.push(request),
                    }
                }
                if !still_waiting.is_empty() {
                    self.pending.insert(index, still_waiting);
                    self.explicit.push_back((index, FrameQuality::High));
                }
            }
            Err(err) => {
                tracing::warn!(index, is_hq, error = %err, "frame load failed");
                self.failed.insert(index);
                for request in self.pending.remove(&index).unwrap_or_default() {
                    self.respond(request.request_id, None);
                }
            }
        }
    }

    /// Starts fetches until the parallelism budget is spent, explicit
    /// requests first, then prefetch outward from the cursor.
    fn pump(&mut self) {
        while self.in_flight.len() < self.options.parallelism.max(1) {
            if let Some((index, quality)) = self.explicit.pop_front() {
                if self.in_flight.contains(&index) {
                    // Re-queued on completion if still unsatisfied.
                    continue;
                }
                if let Some(cached) = self.store.get(&index) {
                    if quality == FrameQuality::Low || cached.is_hq {
                        let image = cached.image.clone();
                        self.answer_satisfied(index, quality, image);
                        continue;
                    }
                }
                match self.sections.get(&index).cloned() {
                    Some(section) => self.spawn_fetch(index, &section, quality),
                    None => {
                        self.request_section(index);
                        // Retried once PushSections delivers it.
                        self.explicit.push_back((index, quality));
                        return;
                    }
                }
                continue;
            }

            if !self.prefetch_enabled {
                return;
            }
            let Some(index) = self.next_prefetch_index() else {
                return;
            };
            match self.sections.get(&index).cloned() {
                Some(section) => self.spawn_fetch(index, &section, FrameQuality::Low),
                None => {
                    self.request_section(index);
                    return;
                }
            }
        }
    }

    /// Closest unfetched frame to the cursor, by index distance.
    fn next_prefetch_index(&self) -> Option<usize> {
        (0..self.options.total_frames)
            .filter(|index| {
                !self.fetched.contains(index)
                    && !self.failed.contains(index)
                    && !self.in_flight.contains(index)
            })
            .min_by_key(|index| index.abs_diff(self.cursor))
    }

    fn spawn_fetch(&mut self, index: usize, section: &SectionDescriptor, quality: FrameQuality) {
        let Some((url, is_hq)) = choose_url(section, quality) else {
            tracing::warn!(index, "section has no frame url");
            self.failed.insert(index);
            for request in self.pending.remove(&index).unwrap_or_default() {
                self.respond(request.request_id, None);
            }
            return;
        };

        self.in_flight.insert(index);
        let source = Arc::clone(&self.source);
        let completion_tx = self.completion_tx.clone();
        let window = self.options.default_window;
        tokio::spawn(async move {
            let result = fetch_and_decode(source, url, window).await;
            let _ = completion_tx.send(Completion {
                index,
                is_hq,
                result,
            });
        });
    }

    fn request_section(&mut self, index: usize) {
        if self.section_requested.insert(index) {
            let _ = self.event_tx.send(LoaderEvent::SectionNeeded { index });
        }
    }

    /// Answers every queued request for `index` that `quality` pixel
    /// data satisfies.
    fn answer_satisfied(&mut self, index: usize, quality: FrameQuality, image: Arc<RenderableImage>) {
        let Some(requests) = self.pending.remove(&index) else {
            return;
        };
        let mut still_waiting = Vec::new();
        for request in requests {
            let satisfied = request.quality == FrameQuality::Low || quality == FrameQuality::High;
            if satisfied {
                self.respond(request.request_id, Some(image.clone()));
            } else {
                still_waiting.push(request);
            }
        }
        if !still_waiting.is_empty() {
            self.pending.insert(index, still_waiting);
        }
    }

    fn respond(&self, request_id: u64, frame: Option<Arc<RenderableImage>>) {
        let _ = self
            .event_tx
            .send(LoaderEvent::FrameResponse { request_id, frame });
    }
}

/// Picks the URL for the requested quality. Low quality falls back to
/// the high-quality URL (and counts as high) when no LQ variant exists.
fn choose_url(section: &SectionDescriptor, quality: FrameQuality) -> Option<(String, bool)> {
    match quality {
        FrameQuality::High => section.hq_url.clone().map(|url| (url, true)),
        FrameQuality::Low => match &section.lq_url {
            Some(url) => Some((url.clone(), false)),
            None => section.hq_url.clone().map(|url| (url, true)),
        },
    }
}

async fn fetch_and_decode(
    source: Arc<dyn FrameSource>,
    url: String,
    window: WindowLevels,
) -> Result<Arc<RenderableImage>> {
    let bytes = source.fetch_frame(url).await?;
    let decoded = image_rs::load_from_memory(&bytes)
        .map_err(|err| Error::Decode(format!("frame decode failed: {err}")))?;
    Ok(Arc::new(RenderableImage::new(
        decoded.to_rgba8(),
        window,
    )))
}
