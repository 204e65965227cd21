//! Routing typed requests to registered handlers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::node_id::NodeId;
use crate::wire::WireTag;

/// A handler for one [`WireTag`]. Handlers are plain functions rather than
/// supervised processes; [`Dispatcher::dispatch`] isolates a panicking
/// handler with `catch_unwind` so one bad request cannot take down the
/// node's whole dispatch loop, standing in for "each handler is a
/// supervised child; crashes are restarted" — the handler itself is
/// stateless here, so "restart" reduces to "the next call runs it fresh."
pub type Handler = Arc<dyn Fn(NodeId, Value) -> nebula_error::Result<Value> + Send + Sync>;

/// A node-local registry of [`WireTag`] → [`Handler`].
#[derive(Default)]
pub struct Dispatcher {
    handlers: DashMap<WireTag, Handler>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `tag`.
    pub fn register(&self, tag: WireTag, handler: Handler) {
        self.handlers.insert(tag, handler);
    }

    /// Route one request to its handler.
    ///
    /// # Errors
    /// Returns a `definition` error if no handler is registered for `tag`,
    /// or if the handler panics (after isolating the panic).
    pub fn dispatch(&self, from: NodeId, tag: WireTag, payload: Value) -> nebula_error::Result<Value> {
        let handler = self
            .handlers
            .get(&tag)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| nebula_error::Error::definition(format!("no handler registered for {tag:?}")))?;

        match catch_unwind(AssertUnwindSafe(|| handler(from, payload))) {
            Ok(result) => result,
            Err(_) => Err(nebula_error::Error::definition(format!("handler for {tag:?} panicked"))),
        }
    }
}
