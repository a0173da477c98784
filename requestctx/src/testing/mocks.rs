//! Mock payloads for testing.

use crate::context::RequestData;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

type Hook = Box<dyn Fn() + Send + Sync>;

/// A payload that counts its activation and deactivation hooks.
#[derive(Default)]
pub struct RecordingData {
    callback: bool,
    set_count: AtomicUsize,
    unset_count: AtomicUsize,
    on_unset_hook: Mutex<Option<Hook>>,
}

impl RecordingData {
    /// Creates a payload without activation callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a payload that registers for activation callbacks.
    #[must_use]
    pub fn with_callback() -> Self {
        Self {
            callback: true,
            ..Self::default()
        }
    }

    /// Returns the number of times `on_set` ran.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.set_count.load(Ordering::SeqCst)
    }

    /// Returns the number of times `on_unset` ran.
    #[must_use]
    pub fn unset_count(&self) -> usize {
        self.unset_count.load(Ordering::SeqCst)
    }

    /// Returns true if the payload is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.set_count() > self.unset_count()
    }

    /// Runs `hook` from every subsequent `on_unset`.
    pub fn on_unset_run<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_unset_hook.lock() = Some(Box::new(hook));
    }

    /// Resets the hook counters.
    pub fn reset(&self) {
        self.set_count.store(0, Ordering::SeqCst);
        self.unset_count.store(0, Ordering::SeqCst);
    }
}

impl RequestData for RecordingData {
    fn has_callback(&self) -> bool {
        self.callback
    }

    fn on_set(&self) {
        self.set_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_unset(&self) {
        self.unset_count.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = self.on_unset_hook.lock().as_ref() {
            hook();
        }
    }
}

impl std::fmt::Debug for RecordingData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingData")
            .field("callback", &self.callback)
            .field("set_count", &self.set_count())
            .field("unset_count", &self.unset_count())
            .finish()
    }
}

/// A plain string payload without callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainData {
    value: String,
}

impl PlainData {
    /// Creates a new plain payload.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Returns the stored value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl RequestData for PlainData {}
