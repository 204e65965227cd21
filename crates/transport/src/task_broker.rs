//! The task broker: run a closure on one worker, or on every worker in
//! parallel, collecting results under a deadline (§4.5).

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;

use crate::fabric::{Fabric, Payload, Task};
use crate::node_id::NodeId;
use crate::wire::WireTag;

/// The outcome of one `on`/`on_all` invocation: either the task's own
/// return value, or the reason it could not be collected.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The task ran and returned a value.
    Value(Value),
    /// The remote call failed (timeout, or the node is not connected).
    Error(String),
}

impl TaskOutcome {
    /// `true` if this outcome is a value, not an error.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, TaskOutcome::Value(_))
    }
}

/// Runs closures on worker nodes over a [`Fabric`], enforcing a per-call
/// deadline.
#[derive(Clone)]
pub struct TaskBroker {
    fabric: Arc<Fabric>,
    from: NodeId,
    deadline: Duration,
}

impl TaskBroker {
    /// Build a broker that issues calls as `from`, with the caller's
    /// default per-call deadline.
    #[must_use]
    pub fn new(fabric: Arc<Fabric>, from: NodeId, deadline: Duration) -> Self {
        Self { fabric, from, deadline }
    }

    /// Run `task` on `node`, awaiting its result under this broker's
    /// deadline. Never panics or propagates the remote error to the caller
    /// as an `Err` — per §4.11, "never crashes the caller."
    pub async fn on(&self, node: &NodeId, task: Task) -> TaskOutcome {
        match self
            .fabric
            .call(node, self.from.clone(), WireTag::TaskInvoke, Payload::Task(task), self.deadline)
            .await
        {
            Ok(value) => TaskOutcome::Value(value),
            Err(err) => TaskOutcome::Error(err.to_string()),
        }
    }

    /// Run `task` on every node in `workers`, in parallel, returning an
    /// ordered `(node, outcome)` sequence matching `workers`' order. An
    /// empty `workers` list returns an empty sequence immediately.
    pub async fn on_all(&self, workers: &[NodeId], task: Task) -> Vec<(NodeId, TaskOutcome)> {
        let futures = workers.iter().map(|node| {
            let node = node.clone();
            let task = Arc::clone(&task);
            async move {
                let outcome = self.on(&node, task).await;
                (node, outcome)
            }
        });
        join_all(futures).await
    }
}
