//! Request context management.
//!
//! This module provides:
//! - Shared, reference-counted entries with optional activation hooks
//! - A guarded keyed store tracking which entries carry hooks
//! - The per-thread current context, with minimal-diff switching and forking
//! - Scope guards and a future wrapper for carrying contexts across code

mod current;
mod data;
mod diff;
mod future;
mod guard;
mod handle;
mod store;

pub use current::{current, fork, save, switch_to};
pub use data::{EntryId, RequestData, SharedEntry};
pub use future::{FutureExt, WithContext};
pub use guard::{ContextScopeGuard, ForkScopeGuard};
pub use handle::{ContextId, RequestContext};
pub use store::{GuardedStore, SetBehavior};
