// SPDX-License-Identifier: MPL-2.0
//! Release-capable registrations.
//!
//! A [`Handle`] wraps a cleanup closure that runs exactly once, either
//! through an explicit [`Handle::release`] or on drop. Tools push the
//! handles they acquire during activation into their context; the tool
//! manager releases them in bulk on deactivation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A releasable registration (event listener, timer, subscription).
pub struct Handle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Handle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle that does nothing on release. Useful for tests and for
    /// registrations whose backing resource outlives the handle.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Runs the cleanup closure. Calling this more than once is a no-op.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("released", &self.is_released())
            .finish()
    }
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A registry of event listeners keyed by subscription id.
///
/// Subscribing returns a [`Handle`] that removes the listener when
/// released, so listener lifetimes follow the scoped-resource pattern
/// used everywhere else in the engine.
pub struct Listeners<T> {
    inner: Arc<Mutex<HashMap<u64, Callback<T>>>>,
    next_id: AtomicU64,
}

impl<T> Default for Listeners<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Handle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock()
            .expect("listener registry poisoned")
            .insert(id, Arc::new(callback));

        let inner = Arc::clone(&self.inner);
        Handle::new(move || {
            inner.lock().expect("listener registry poisoned").remove(&id);
        })
    }

    /// Fans the event out. Callbacks run with the registry unlocked, so
    /// a subscriber may clear the registry or release its own handle
    /// from inside the callback.
    pub fn emit(&self, event: &T) {
        let callbacks: Vec<Callback<T>> = self
            .inner
            .lock()
            .expect("listener registry poisoned")
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("listener registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .expect("listener registry poisoned")
            .clear();
    }
}

impl<T: 'static> std::fmt::Debug for Listeners<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners").field("len", &self.len()).finish()
    }
}
