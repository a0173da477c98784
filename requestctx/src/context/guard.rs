//! Scope guards that install a context and restore the previous one.

use super::current::{fork, save, switch_to};
use super::data::SharedEntry;
use super::handle::RequestContext;
use std::marker::PhantomData;

/// Switches to a context for the lifetime of the guard.
///
/// On drop the previous context is switched back in, running the same
/// minimal set of hooks as [`switch_to`].
#[must_use = "the previous context is restored when the guard is dropped"]
pub struct ContextScopeGuard {
    prev: Option<RequestContext>,
    // Restores the slot of the thread that created it.
    _not_send: PhantomData<*const ()>,
}

impl ContextScopeGuard {
    /// Installs `ctx` until the guard is dropped.
    pub fn new(ctx: Option<RequestContext>) -> Self {
        Self {
            prev: switch_to(ctx),
            _not_send: PhantomData,
        }
    }

    /// Installs a fresh, empty context until the guard is dropped.
    pub fn fresh() -> Self {
        Self::new(Some(RequestContext::new()))
    }
}

impl Drop for ContextScopeGuard {
    fn drop(&mut self) {
        drop(switch_to(self.prev.take()));
    }
}

/// Forks the current context for the lifetime of the guard.
///
/// The child shares the parent's entries; changes made through it do not
/// leak into the parent. On drop the parent is switched back in.
#[must_use = "the parent context is restored when the guard is dropped"]
pub struct ForkScopeGuard {
    prev: Option<RequestContext>,
    _not_send: PhantomData<*const ()>,
}

impl ForkScopeGuard {
    /// Forks the current context until the guard is dropped.
    pub fn new() -> Self {
        let prev = save();
        drop(fork());
        Self {
            prev,
            _not_send: PhantomData,
        }
    }

    /// Forks the current context and overwrites `key` in the child.
    ///
    /// The replaced entry (if any) is deactivated and `entry` activated,
    /// only within the child.
    pub fn with_data(key: &str, entry: impl Into<SharedEntry>) -> Self {
        let guard = Self::new();
        super::current::current().overwrite(key, entry);
        guard
    }
}

impl Default for ForkScopeGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ForkScopeGuard {
    fn drop(&mut self) {
        drop(switch_to(self.prev.take()));
    }
}
