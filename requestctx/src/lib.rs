//! # requestctx
//!
//! Request-scoped ambient state for Rust services.
//!
//! A [`RequestContext`] carries keyed data (tracing identifiers, deadlines,
//! locale, ...) along a logical request without threading it through every
//! call. Each thread has one *current* context:
//!
//! - **Keyed entries**: payloads implementing [`RequestData`], shared by
//!   reference count between a context and its forks
//! - **Activation hooks**: payloads can ask to be told when their context
//!   becomes current on a thread and when it stops being current
//! - **Minimal switching**: [`switch_to`] only notifies entries whose
//!   presence actually changes between the outgoing and incoming context
//! - **Cheap forking**: [`fork`] installs a child sharing every entry of its
//!   parent, without running any hooks
//!
//! ## Quick Start
//!
//! ```rust
//! use requestctx::prelude::*;
//!
//! #[derive(Debug)]
//! struct RequestId(String);
//!
//! impl RequestData for RequestId {}
//!
//! let ctx = RequestContext::new();
//! ctx.set("request_id", RequestId("req-42".into()));
//!
//! let _guard = ContextScopeGuard::new(Some(ctx));
//! let id = current().with_data("request_id", |r: &RequestId| r.0.clone());
//! assert_eq!(id.as_deref(), Some("req-42"));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod testing;

pub use context::{current, fork, save, switch_to, RequestContext, RequestData, SharedEntry};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{configure, current_config, ContextConfig};
    pub use crate::context::{
        current, fork, save, switch_to, ContextId, ContextScopeGuard, ForkScopeGuard,
        FutureExt, RequestContext, RequestData, SharedEntry, WithContext,
    };
    pub use crate::errors::{ContextError, TypeMismatchError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
}
