//! Worker-side membership complement: accepting at most one master
//! registration, and reacting to that master's departure (§4.6, final
//! paragraph).

use std::sync::Arc;

use nebula_transport::{Beacon, Dispatcher, Envelope, Fabric, NodeId, Payload, Role, WireTag};
use parking_lot::RwLock;
use serde_json::{Value, json};
use tokio::sync::Notify;

/// A worker's view of its (at most one) registered master.
///
/// Construct via [`spawn_worker_node`], which wires this guard's handlers
/// into a dispatch loop draining the worker's fabric inbox.
pub struct WorkerGuard {
    master: RwLock<Option<NodeId>>,
    shutdown_with_master: bool,
    shutdown: Notify,
}

impl WorkerGuard {
    /// Build a guard with no master registered yet.
    #[must_use]
    pub fn new(shutdown_with_master: bool) -> Self {
        Self {
            master: RwLock::new(None),
            shutdown_with_master,
            shutdown: Notify::new(),
        }
    }

    /// The currently registered master, if any.
    #[must_use]
    pub fn master(&self) -> Option<NodeId> {
        self.master.read().clone()
    }

    /// Wait until this worker should self-terminate because its master
    /// left and `shutdown_with_master` is configured. Never resolves if
    /// `shutdown_with_master` is `false`.
    pub async fn wait_for_shutdown(&self) {
        if !self.shutdown_with_master {
            std::future::pending::<()>().await;
        }
        self.shutdown.notified().await;
    }

    /// A [`WireTag::RegisterMaster`] handler: accepts `master` unless one
    /// is already registered, in which case it reports `already_connected`
    /// without replacing the existing registration.
    #[must_use]
    pub fn register_master_handler(self: &Arc<Self>) -> nebula_transport::Handler {
        let guard = Arc::clone(self);
        Arc::new(move |from, _payload| {
            let mut slot = guard.master.write();
            if slot.is_some() {
                return Ok(json!({ "already_connected": true }));
            }
            *slot = Some(from);
            Ok(json!({ "ok": true }))
        })
    }

    /// A [`WireTag::RemoveMaster`] handler: clears the registration and, if
    /// `shutdown_with_master` is set, wakes [`WorkerGuard::wait_for_shutdown`].
    #[must_use]
    pub fn remove_master_handler(self: &Arc<Self>) -> nebula_transport::Handler {
        let guard = Arc::clone(self);
        Arc::new(move |_from, _payload| {
            *guard.master.write() = None;
            if guard.shutdown_with_master {
                guard.shutdown.notify_waiters();
            }
            Ok(Value::Null)
        })
    }
}

/// Register `node` on `fabric`, wire a beacon + [`WorkerGuard`] handlers
/// into a dispatch loop, and spawn the loop. Returns the guard so a caller
/// can inspect its registered master or await shutdown.
///
/// This is the minimal worker-side bootstrap a real worker process
/// performs before accepting `deploy`-spawned component workers (§4.7);
/// those component-worker handlers are layered on separately by
/// `nebula-runtime`, which registers its own `spawn_worker`/`send_to_worker`
/// handlers on the same [`Dispatcher`].
pub async fn spawn_worker_node(
    fabric: &Arc<Fabric>,
    node: NodeId,
    cookie: &str,
    role: Role,
) -> Arc<WorkerGuard> {
    spawn_worker_node_with_shutdown(fabric, node, cookie, role, false).await
}

/// Same as [`spawn_worker_node`], configuring `shutdown_with_master`.
pub async fn spawn_worker_node_with_shutdown(
    fabric: &Arc<Fabric>,
    node: NodeId,
    cookie: &str,
    role: Role,
    shutdown_with_master: bool,
) -> Arc<WorkerGuard> {
    let guard = Arc::new(WorkerGuard::new(shutdown_with_master));
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(WireTag::Verify, Arc::new(Beacon::new(role, cookie)).handler());
    dispatcher.register(WireTag::RegisterMaster, guard.register_master_handler());
    dispatcher.register(WireTag::RemoveMaster, guard.remove_master_handler());

    let mut rx = fabric.register(node, nebula_transport::DEFAULT_MAILBOX_CAPACITY);
    tokio::spawn(async move {
        while let Some(Envelope { from, tag, payload, reply }) = rx.recv().await {
            let value = match payload {
                Payload::Json(v) => dispatcher.dispatch(from, tag, v).unwrap_or(Value::Null),
                Payload::Task(t) => t(),
            };
            let _ = reply.send(value);
        }
    });

    guard
}
