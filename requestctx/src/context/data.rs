//! Shared entries stored in a request context.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Payload stored under a key in a request context.
///
/// Payloads that care about which thread their request is running on opt in
/// to activation callbacks by returning `true` from [`has_callback`]. The
/// answer must not change over the lifetime of the payload.
///
/// A payload shared between contexts (for example after a fork) may see
/// `on_set`/`on_unset` from several threads at once.
///
/// Hooks run after the context's lock is released. Two threads changing the
/// same key of one context can therefore see their hooks land in the
/// opposite order from their store updates: if one thread overwrites a key
/// with an entry while another clears that key, the entry's `on_unset` may
/// run before its `on_set` and leave it marked active although it is no
/// longer stored. Callers that need strict pairing must serialize writes to
/// a key.
///
/// [`has_callback`]: RequestData::has_callback
pub trait RequestData: Any + Send + Sync {
    /// Whether `on_set`/`on_unset` should be invoked for this payload.
    fn has_callback(&self) -> bool {
        false
    }

    /// Called when the payload becomes active.
    fn on_set(&self) {}

    /// Called when the payload stops being active.
    fn on_unset(&self) {}
}

/// Identity of a shared entry, ordered by allocation address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(usize);

/// A reference-counted handle to a stored payload.
///
/// Cloning aliases the same payload; it never copies it. Two handles are
/// equal only when they point at the same allocation.
#[derive(Clone)]
pub struct SharedEntry(Arc<dyn RequestData>);

impl SharedEntry {
    /// Wraps a payload in a new shared entry.
    pub fn new<T: RequestData>(data: T) -> Self {
        Self(Arc::new(data))
    }

    /// Wraps an already shared payload.
    ///
    /// The caller keeps its own handle, which stays identity-equal to
    /// whatever the context hands back.
    pub fn from_arc<T: RequestData>(data: Arc<T>) -> Self {
        Self(data)
    }

    /// Returns the identity of this entry.
    #[must_use]
    pub fn id(&self) -> EntryId {
        EntryId(Arc::as_ptr(&self.0).cast::<()>() as usize)
    }

    /// Returns the number of live handles to this entry.
    ///
    /// A context counts once per key holding the entry, plus once more if
    /// the entry registered for callbacks, since the callback set keeps its
    /// own handle.
    #[must_use]
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Returns true if both handles alias the same payload.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Returns true if the payload registered for activation callbacks.
    #[must_use]
    pub fn has_callback(&self) -> bool {
        self.0.has_callback()
    }

    pub(crate) fn on_set(&self) {
        self.0.on_set();
    }

    pub(crate) fn on_unset(&self) {
        self.0.on_unset();
    }

    /// Returns true if the payload is a `T`.
    #[must_use]
    pub fn is<T: RequestData>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrows the payload as a `T`, if it is one.
    #[must_use]
    pub fn downcast_ref<T: RequestData>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        let data: &dyn RequestData = &*self.0;
        data
    }
}

impl<T: RequestData> From<T> for SharedEntry {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}

impl PartialEq for SharedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SharedEntry {}

impl fmt::Debug for SharedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEntry")
            .field("id", &self.id())
            .field("holders", &self.holders())
            .field("has_callback", &self.has_callback())
            .finish()
    }
}
