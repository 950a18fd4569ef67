//! Listener registry and isolated fan-out.
//!
//! Each listener is called inside `catch_unwind`; an error or panic is
//! logged and counted, and delivery continues with the next listener.

use crate::error::{HandlerError, HandlerResult};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tickwatch_core::Quote;
use tickwatch_telemetry::Metrics;
use tracing::error;

/// Receives every quote fanned out by the stream.
///
/// Called synchronously on the connection task; slow work should be
/// handed off to another task.
pub trait TickListener: Send + Sync {
    fn on_tick(&self, quote: &Quote) -> HandlerResult;
}

impl<F> TickListener for F
where
    F: Fn(&Quote) -> HandlerResult + Send + Sync,
{
    fn on_tick(&self, quote: &Quote) -> HandlerResult {
        self(quote)
    }
}

/// Receives `true` when the stream connects and `false` when it drops.
pub type StateListener = dyn Fn(bool) + Send + Sync;

/// Registry-assigned listener handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered listener list with stable ids.
pub struct ListenerRegistry<L: ?Sized> {
    next_id: u64,
    entries: Vec<(ListenerId, Arc<L>)>,
}

impl<L: ?Sized> ListenerRegistry<L> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Listeners at this instant; later registrations do not affect it.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all listeners. Ids are never reused.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Call every listener, isolating failures. Returns the failure count.
pub fn dispatch_isolated<L, F>(listeners: &[Arc<L>], kind: &'static str, mut call: F) -> usize
where
    L: ?Sized,
    F: FnMut(&L) -> HandlerResult,
{
    let mut failures = 0;
    for listener in listeners {
        let outcome = catch_unwind(AssertUnwindSafe(|| call(listener)));
        let failure = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(payload) => HandlerError::new(format!("panicked: {}", panic_message(&*payload))),
        };
        failures += 1;
        Metrics::handler_failure(kind);
        error!(kind, error = %failure, "Listener failed");
    }
    failures
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
