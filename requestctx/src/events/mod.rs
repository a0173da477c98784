//! Event sink system for context switch instrumentation.
//!
//! Every real context switch is reported to the installed sink before the
//! thread's current context changes.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

static GLOBAL_EVENT_SINK: RwLock<Option<Arc<dyn EventSink>>> = RwLock::new(None);

/// Sets the current global event sink.
pub fn set_event_sink(sink: Arc<dyn EventSink>) {
    debug!("Request context event sink installed");
    *GLOBAL_EVENT_SINK.write() = Some(sink);
}

/// Clears the current global event sink.
pub fn clear_event_sink() {
    *GLOBAL_EVENT_SINK.write() = None;
}

/// Gets the current global event sink.
///
/// Returns a `NoOpEventSink` if no sink is set.
pub fn get_event_sink() -> Arc<dyn EventSink> {
    installed_event_sink().unwrap_or_else(|| Arc::new(NoOpEventSink))
}

/// The installed sink, if any. Lets callers skip building payloads.
pub(crate) fn installed_event_sink() -> Option<Arc<dyn EventSink>> {
    GLOBAL_EVENT_SINK.read().clone()
}
