//! Worker identities.

use std::fmt;

use nebula_transport::NodeId;
use serde::{Deserialize, Serialize};

/// A worker instance's id, local to the node it was spawned on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Build a worker id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully-qualified worker handle: the node it lives on plus its local id
/// (§3's `WorkerRef`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerRef {
    /// The node this worker runs on.
    pub node: NodeId,
    /// This worker's id, local to `node`.
    pub worker_id: WorkerId,
}

impl WorkerRef {
    /// Build a worker ref.
    pub fn new(node: NodeId, worker_id: impl Into<WorkerId>) -> Self {
        Self { node, worker_id: worker_id.into() }
    }
}

impl From<String> for WorkerId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for WorkerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.worker_id)
    }
}
