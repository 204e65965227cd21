//! The in-process message fabric standing in for the "distributed
//! messaging substrate" the design document deliberately leaves
//! unspecified ("whatever the distributed messaging substrate chooses").
//!
//! Every node registers an inbox (a bounded `mpsc` channel); `Fabric::call`
//! sends an [`Envelope`] to a target node's inbox and awaits a reply on a
//! `oneshot` channel, under a caller-supplied deadline. A later production
//! deployment would swap this for a real socket layer without changing any
//! of [`crate::Beacon`], [`crate::Dispatcher`], [`crate::TaskBroker`], or
//! [`crate::LoadBalancer`]'s call signatures.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::node_id::NodeId;
use crate::wire::WireTag;

/// A task closure dispatched via [`WireTag::TaskInvoke`]. Since the fabric
/// is in-process, task payloads are run directly rather than serialized —
/// real closures cross the channel, not their encoding.
pub type Task = Arc<dyn Fn() -> Value + Send + Sync>;

/// The body of one request sent across the fabric.
pub enum Payload {
    /// An ordinary JSON-valued request (verify, register/remove master,
    /// spawn/send-to-worker).
    Json(Value),
    /// A task-broker closure invocation.
    Task(Task),
}

/// A request in flight: sender identity, tag, payload, and the channel its
/// answer should be sent back on.
pub struct Envelope {
    /// The node that sent this request.
    pub from: NodeId,
    /// Which handler should answer it.
    pub tag: WireTag,
    /// The request body.
    pub payload: Payload,
    /// Where to send the answer.
    pub reply: oneshot::Sender<Value>,
}

/// Default bound on a node's inbox, matching §5's "bounded queues with
/// backpressure."
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// The process-wide `NodeId -> inbox` directory.
#[derive(Default)]
pub struct Fabric {
    inboxes: DashMap<NodeId, mpsc::Sender<Envelope>>,
}

impl Fabric {
    /// Create an empty fabric.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node`'s inbox, returning the receiving half its dispatch
    /// loop should drain.
    pub fn register(&self, node: NodeId, capacity: usize) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(capacity);
        self.inboxes.insert(node, tx);
        rx
    }

    /// Remove `node`'s inbox; in-flight `call`s targeting it will now fail
    /// with `not_connected`.
    pub fn unregister(&self, node: &NodeId) {
        self.inboxes.remove(node);
    }

    /// `true` if `node` currently has a registered inbox.
    #[must_use]
    pub fn is_registered(&self, node: &NodeId) -> bool {
        self.inboxes.contains_key(node)
    }

    /// Send `payload` to `target` tagged `tag`, awaiting its reply until
    /// `deadline` elapses.
    ///
    /// # Errors
    /// - [`nebula_error::Error::NotConnected`] if `target` has no
    ///   registered inbox, or its dispatch loop has stopped without
    ///   replying.
    /// - [`nebula_error::Error::Timeout`] if `deadline` elapses first.
    pub async fn call(
        &self,
        target: &NodeId,
        from: NodeId,
        tag: WireTag,
        payload: Payload,
        deadline: Duration,
    ) -> nebula_error::Result<Value> {
        let sender = self
            .inboxes
            .get(target)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| nebula_error::Error::NotConnected(target.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            from,
            tag,
            payload,
            reply: reply_tx,
        };

        sender
            .send(envelope)
            .await
            .map_err(|_| nebula_error::Error::NotConnected(target.to_string()))?;

        match tokio::time::timeout(deadline, reply_rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(nebula_error::Error::NotConnected(target.to_string())),
            Err(_) => Err(nebula_error::Error::Timeout(target.to_string())),
        }
    }
}
