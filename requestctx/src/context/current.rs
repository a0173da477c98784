//! Per-thread current context, context switching and forking.

use super::data::SharedEntry;
use super::diff::for_each_difference;
use super::handle::RequestContext;
use crate::config;
use crate::events;
use std::cell::RefCell;
use std::sync::LazyLock;
use tracing::trace;

thread_local! {
    static CURRENT: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

static DEFAULT_CONTEXT: LazyLock<RequestContext> = LazyLock::new(RequestContext::new);

/// Returns the context installed on this thread.
///
/// Falls back to a shared, process-wide default when nothing has been
/// installed, so callers never observe an absent context.
#[must_use]
pub fn current() -> RequestContext {
    save().unwrap_or_else(|| DEFAULT_CONTEXT.clone())
}

/// Returns the context installed on this thread, without the default fallback.
///
/// This is what a scheduler captures before handing work to another thread.
#[must_use]
pub fn save() -> Option<RequestContext> {
    CURRENT
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

fn install(ctx: Option<RequestContext>) -> Option<RequestContext> {
    CURRENT.with(|slot| slot.replace(ctx))
}

fn same(a: Option<&RequestContext>, b: Option<&RequestContext>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    }
}

/// Installs `new` as this thread's current context.
///
/// Only hooks of entries whose presence actually changes are run: entries
/// held by both the outgoing and incoming context are left alone. Returns the
/// previously installed context so the caller can restore it later.
pub fn switch_to(new: Option<RequestContext>) -> Option<RequestContext> {
    let cur = save();
    if same(cur.as_ref(), new.as_ref()) {
        return new;
    }

    emit_switch(cur.as_ref(), new.as_ref());

    let callbacks = match (&cur, &new) {
        (Some(cur_ctx), Some(new_ctx)) => Some((
            cur_ctx.store().callback_entries(),
            new_ctx.store().callback_entries(),
        )),
        _ => None,
    };

    if let Some((cur_callbacks, new_callbacks)) = callbacks {
        for_each_difference(&cur_callbacks, &new_callbacks, SharedEntry::on_unset);
        drop(install(new));
        for_each_difference(&new_callbacks, &cur_callbacks, SharedEntry::on_set);
    } else {
        if let Some(cur_ctx) = &cur {
            cur_ctx.on_unset();
        }
        let incoming = new.clone();
        drop(install(new));
        if let Some(new_ctx) = incoming {
            new_ctx.on_set();
        }
    }

    cur
}

fn emit_switch(from: Option<&RequestContext>, to: Option<&RequestContext>) {
    let from_id = from.map(RequestContext::id);
    let to_id = to.map(RequestContext::id);
    trace!(from = ?from_id, to = ?to_id, "Request context switch");

    let Some(sink) = events::installed_event_sink() else {
        return;
    };
    let event_type = config::with_config(|c| {
        c.emit_switch_events.then(|| c.switch_event_type.clone())
    });
    if let Some(event_type) = event_type {
        sink.try_emit(
            &event_type,
            Some(serde_json::json!({
                "from": from_id.map(|id| id.as_u64()),
                "to": to_id.map(|id| id.as_u64()),
            })),
        );
    }
}

/// Installs a child of the current context and returns it.
///
/// The child shares every entry with its parent. Since those entries are
/// already active, no hooks run and no switch event is emitted. When nothing
/// is installed the child starts empty.
pub fn fork() -> RequestContext {
    let parent = save();
    let child = parent
        .as_ref()
        .map_or_else(RequestContext::new, RequestContext::shallow_copy);

    trace!(
        parent = ?parent.as_ref().map(RequestContext::id),
        child = %child.id(),
        entries = child.len(),
        "Request context forked"
    );

    drop(install(Some(child.clone())));
    child
}
