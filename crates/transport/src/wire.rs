//! The wire protocol's request tag set (§6).

use serde::{Deserialize, Serialize};

/// The tag carried on every request, naming which handler should answer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireTag {
    /// Beacon handshake: answer with this node's role and cookie check.
    Verify,
    /// A master is registering itself with a worker.
    RegisterMaster,
    /// A master (or monitor) is removing itself from a worker.
    RemoveMaster,
    /// Spawn a new worker process for a component instance.
    SpawnWorker,
    /// Deliver a message to an already-spawned worker's mailbox.
    SendToWorker,
    /// Invoke an arbitrary task closure on this node (the task broker).
    TaskInvoke,
}
