//! Carrying a request context through async code.

use super::current::{save, switch_to};
use super::handle::RequestContext;
use pin_project::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A future that runs every poll of `inner` with its own request context
/// installed.
///
/// Whatever context is current when a poll returns is kept for the next one,
/// so forks and switches made inside the future survive across `.await`
/// points and executor threads.
#[pin_project]
#[derive(Debug)]
pub struct WithContext<F> {
    #[pin]
    inner: F,
    context: Option<RequestContext>,
}

impl<F> WithContext<F> {
    /// Wraps `inner` so it runs with `context` installed.
    pub fn new(inner: F, context: Option<RequestContext>) -> Self {
        Self { inner, context }
    }

    /// Returns the context the next poll will run with.
    pub fn context(&self) -> Option<&RequestContext> {
        self.context.as_ref()
    }
}

/// Switches the polling thread back even if the inner poll panics.
struct Restore<'a> {
    slot: &'a mut Option<RequestContext>,
    prev: Option<RequestContext>,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        *self.slot = switch_to(self.prev.take());
    }
}

impl<F: Future> Future for WithContext<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let prev = switch_to(this.context.take());
        let _restore = Restore {
            slot: this.context,
            prev,
        };
        this.inner.poll(cx)
    }
}

/// Extension methods for running futures inside a request context.
pub trait FutureExt: Future + Sized {
    /// Runs this future with `context` installed on every poll.
    fn with_request_context(self, context: RequestContext) -> WithContext<Self> {
        WithContext::new(self, Some(context))
    }

    /// Runs this future with the context current at the time of the call.
    fn in_current_context(self) -> WithContext<Self> {
        WithContext::new(self, save())
    }
}

impl<F: Future> FutureExt for F {}
