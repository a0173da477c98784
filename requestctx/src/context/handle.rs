//! The request context handle.

use super::data::{RequestData, SharedEntry};
use super::store::{GuardedStore, SetBehavior};
use crate::errors::TypeMismatchError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct ContextInner {
    id: ContextId,
    store: GuardedStore,
}

/// Ambient, request-scoped state shared by every handle cloned from it.
///
/// Cloning a `RequestContext` is cheap and yields another handle to the same
/// store. Use [`shallow_copy`](Self::shallow_copy) or [`crate::fork`] for a
/// child that can diverge from its parent.
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

impl RequestContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::from_store(GuardedStore::new())
    }

    fn from_store(store: GuardedStore) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::next(),
                store,
            }),
        }
    }

    /// Returns the context installed on this thread, or the default context.
    #[must_use]
    pub fn current() -> Self {
        super::current::current()
    }

    /// Returns this context's identity.
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Returns true if both handles refer to the same context.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn store(&self) -> &GuardedStore {
        &self.inner.store
    }

    /// Stores `entry` under `key`.
    ///
    /// If the key is already present, a warning is logged once per process,
    /// the existing entry is cleared and `entry` is discarded. Always
    /// returns true; use [`set_if_absent`](Self::set_if_absent) to detect
    /// a collision or [`overwrite`](Self::overwrite) to replace.
    pub fn set(&self, key: &str, entry: impl Into<SharedEntry>) -> bool {
        self.inner.store.try_set(key, entry.into(), SetBehavior::Set)
    }

    /// Stores `entry` under `key` unless the key is present.
    ///
    /// Returns false, leaving the context unchanged, if it is.
    pub fn set_if_absent(&self, key: &str, entry: impl Into<SharedEntry>) -> bool {
        self.inner
            .store
            .try_set(key, entry.into(), SetBehavior::SetIfAbsent)
    }

    /// Stores `entry` under `key`, replacing any existing entry.
    pub fn overwrite(&self, key: &str, entry: impl Into<SharedEntry>) -> bool {
        self.inner
            .store
            .try_set(key, entry.into(), SetBehavior::Overwrite)
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.inner.store.has(key)
    }

    /// Gets the entry stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SharedEntry> {
        self.inner.store.get(key)
    }

    /// Runs `f` on the payload under `key` if it is a `T`.
    pub fn with_data<T, R>(&self, key: &str, f: impl FnOnce(&T) -> R) -> Option<R>
    where
        T: RequestData,
    {
        let entry = self.get(key)?;
        entry.downcast_ref::<T>().map(f)
    }

    /// Like [`with_data`](Self::with_data), but reports a payload of the
    /// wrong type instead of hiding it.
    pub fn try_with_data<T, R>(
        &self,
        key: &str,
        f: impl FnOnce(&T) -> R,
    ) -> Result<Option<R>, TypeMismatchError>
    where
        T: RequestData,
    {
        let Some(entry) = self.get(key) else {
            return Ok(None);
        };
        entry
            .downcast_ref::<T>()
            .map(|data| Some(f(data)))
            .ok_or_else(|| TypeMismatchError::new(key, std::any::type_name::<T>()))
    }

    /// Removes `key`. Does nothing if it is absent.
    pub fn clear(&self, key: &str) {
        self.inner.store.clear(key);
    }

    /// Runs the activation hook of every callback entry.
    pub fn on_set(&self) {
        for entry in self.inner.store.callback_entries() {
            entry.on_set();
        }
    }

    /// Runs the deactivation hook of every callback entry.
    pub fn on_unset(&self) {
        for entry in self.inner.store.callback_entries() {
            entry.on_unset();
        }
    }

    /// Builds a detached child sharing every entry with this context.
    ///
    /// No hooks run and nothing is installed.
    #[must_use]
    pub fn shallow_copy(&self) -> Self {
        Self::from_store(self.inner.store.shallow_copy())
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Returns true if the context holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Returns all keys.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.store.keys()
    }

    /// Checks the store's callback bookkeeping against its entries.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.inner.store.is_consistent()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for RequestContext {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for RequestContext {}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.id())
            .field("keys", &self.len())
            .finish()
    }
}
