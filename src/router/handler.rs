//! Handler entry points.
//!
//! A handler is a plain async function taking an [`Invocation`]. The
//! dispatcher builds a fresh invocation for every event and moves it into
//! the call, so nothing a handler captures outlives its event.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use super::event::{ActorContext, IncomingEvent};

/// Result type returned by handler and job bodies.
pub type HandlerResult = anyhow::Result<()>;

/// Everything a handler receives for one event.
pub struct Invocation<S> {
    /// Application state, cloned per event.
    pub state: S,
    pub event: IncomingEvent,
    pub actor: ActorContext,
    /// Cancelled on shutdown; observe it at network calls and delays.
    pub cancel: CancellationToken,
}

impl<S> Invocation<S> {
    /// Command arguments, trimmed. Empty for non-command events.
    pub fn args(&self) -> &str {
        self.event.args().trim()
    }
}

/// Type-erased handler entry point.
pub type EntryPoint<S> = Arc<dyn Fn(Invocation<S>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Type-erased job body, already bound to its state.
pub type JobBody = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Erase an async handler function into an [`EntryPoint`].
pub fn entry_point<S, F, Fut>(f: F) -> EntryPoint<S>
where
    F: Fn(Invocation<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |invocation| Box::pin(f(invocation)))
}

/// Job entry point before it is bound to a state value.
pub type JobEntryPoint<S> = Arc<dyn Fn(S, CancellationToken) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Erase an async job function into a [`JobEntryPoint`].
pub fn job_entry_point<S, F, Fut>(f: F) -> JobEntryPoint<S>
where
    F: Fn(S, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |state, cancel| Box::pin(f(state, cancel)))
}
