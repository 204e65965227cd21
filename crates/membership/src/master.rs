//! Master-side membership: the `connect` handshake, liveness monitoring,
//! and join/leave notification (§4.6).

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use nebula_error::{Error, NodeFailure, Result};
use nebula_transport::{Fabric, NodeId, Payload, Role, WireTag, verify, VerifyOutcome};
use parking_lot::RwLock;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::connection_state::ConnectionState;
use crate::events::{DEFAULT_SUBSCRIBER_CAPACITY, LeaveReason, MembershipEvent, Subscriber, notify};

/// A connected worker's membership record (§3's `NodeEntry`).
#[derive(Debug, Clone)]
pub struct NodeEntry {
    /// The worker's identity.
    pub node: NodeId,
    /// Tags describing this worker's role, set at connect time.
    pub tags: BTreeSet<String>,
}

/// Default interval the liveness monitor polls a connected worker's
/// reachability at.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(50);

/// The outcome of a failed [`Membership::connect`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    /// This node is not distribution-enabled (and the request was not a
    /// single-node local-mode connect).
    NotDistributed,
    /// One or more targets failed; every target's outcome is listed.
    Failures(Vec<NodeFailure>),
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectError::NotDistributed => write!(f, "not distributed"),
            ConnectError::Failures(failures) => {
                write!(f, "error: [")?;
                for (i, failure) in failures.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{failure}")?;
                }
                write!(f, "]")
            }
        }
    }
}

struct SubscriberSlot {
    id: u64,
    sender: Subscriber,
}

/// Master-side cluster membership: owns the `NodeId -> NodeEntry` map and
/// drives the handshake, liveness monitors, and join/leave fan-out.
pub struct Membership {
    fabric: Arc<Fabric>,
    from: NodeId,
    cookie: String,
    distributed: bool,
    monitor_interval: Duration,
    entries: DashMap<NodeId, NodeEntry>,
    connect_locks: DashMap<NodeId, Arc<AsyncMutex<()>>>,
    monitors: DashMap<NodeId, JoinHandle<()>>,
    join_subs: RwLock<Vec<SubscriberSlot>>,
    leave_subs: RwLock<Vec<SubscriberSlot>>,
    next_subscriber_id: AtomicU64,
}

impl Membership {
    /// Build a membership subsystem.
    ///
    /// `distributed` mirrors "this node is distribution-enabled"; when
    /// `false`, [`Membership::connect`] only succeeds for a single-node,
    /// local-mode request targeting `from` itself.
    #[must_use]
    pub fn new(fabric: Arc<Fabric>, from: NodeId, cookie: impl Into<String>, distributed: bool) -> Self {
        Self {
            fabric,
            from,
            cookie: cookie.into(),
            distributed,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            entries: DashMap::new(),
            connect_locks: DashMap::new(),
            monitors: DashMap::new(),
            join_subs: RwLock::new(Vec::new()),
            leave_subs: RwLock::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
        }
    }

    /// Override the liveness monitor's poll interval (for tests that want
    /// fast node-leave detection).
    #[must_use]
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// The currently connected worker entries.
    #[must_use]
    pub fn connected(&self) -> Vec<NodeEntry> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    /// `true` if `node` is currently connected.
    #[must_use]
    pub fn is_connected(&self, node: &NodeId) -> bool {
        self.entries.contains_key(node)
    }

    /// Register a mailbox to receive every future [`MembershipEvent::Join`].
    pub fn subscribe_join(&self) -> (u64, tokio::sync::mpsc::Receiver<MembershipEvent>) {
        subscribe(&self.join_subs, &self.next_subscriber_id)
    }

    /// Unregister a join subscriber by the id returned from [`Membership::subscribe_join`].
    pub fn unsubscribe_join(&self, id: u64) {
        unsubscribe(&self.join_subs, id);
    }

    /// Register a mailbox to receive every future [`MembershipEvent::Leave`].
    pub fn subscribe_leave(&self) -> (u64, tokio::sync::mpsc::Receiver<MembershipEvent>) {
        subscribe(&self.leave_subs, &self.next_subscriber_id)
    }

    /// Unregister a leave subscriber by the id returned from [`Membership::subscribe_leave`].
    pub fn unsubscribe_leave(&self, id: u64) {
        unsubscribe(&self.leave_subs, id);
    }

    /// The handshake: connect to every node in `nodes`, in order reported,
    /// serialized per-target (concurrent across distinct targets).
    ///
    /// # Errors
    /// Returns [`ConnectError::NotDistributed`] if this node is not
    /// distribution-enabled, or [`ConnectError::Failures`] listing every
    /// target that failed the handshake.
    ///
    /// Takes `self` behind an `Arc` because a successful handshake installs
    /// a liveness monitor ([`Membership::install_monitor`]) that outlives
    /// this call and needs a weak handle back into `self` to remove the
    /// entry and fan out `node_leave` autonomously when it detects the
    /// worker has dropped off the fabric.
    pub async fn connect(self: &Arc<Self>, nodes: &[NodeId]) -> std::result::Result<(), ConnectError> {
        if !self.distributed && !(nodes.len() == 1 && nodes[0] == self.from) {
            return Err(ConnectError::NotDistributed);
        }

        let results = futures::future::join_all(nodes.iter().map(|n| self.connect_one(n))).await;

        let failures: Vec<NodeFailure> = results.into_iter().filter_map(|r| r.err()).collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ConnectError::Failures(failures))
        }
    }

    async fn connect_one(self: &Arc<Self>, node: &NodeId) -> std::result::Result<(), NodeFailure> {
        let lock = self
            .connect_locks
            .entry(node.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if self.entries.contains_key(node) {
            return Ok(());
        }

        if !self.fabric.is_registered(node) {
            return Err(NodeFailure { node: node.to_string(), reason: "not_connected" });
        }

        let mut state = ConnectionState::Disconnected;
        let deadline = Duration::from_secs(5);

        state = state.transition(ConnectionState::Verifying).unwrap_or(state);
        match verify(&self.fabric, self.from.clone(), node, Role::Worker, &self.cookie, deadline).await {
            VerifyOutcome::Ok => {}
            VerifyOutcome::WrongRole => {
                return Err(NodeFailure { node: node.to_string(), reason: "no_skitter_worker" });
            }
            VerifyOutcome::Unreachable => {
                return Err(NodeFailure { node: node.to_string(), reason: "not_connected" });
            }
            VerifyOutcome::CookieMismatch => {
                return Err(NodeFailure { node: node.to_string(), reason: "wrong_cookie" });
            }
        }
        state = state.transition(ConnectionState::Registering).unwrap_or(state);

        let response = self
            .fabric
            .call(
                node,
                self.from.clone(),
                WireTag::RegisterMaster,
                Payload::Json(json!({ "master": self.from.to_string() })),
                deadline,
            )
            .await
            .map_err(|_| NodeFailure { node: node.to_string(), reason: "not_connected" })?;

        if response.get("already_connected").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Err(NodeFailure { node: node.to_string(), reason: "already_connected" });
        }

        let _connected = state.transition(ConnectionState::Connected).unwrap_or(state);

        self.entries.insert(
            node.clone(),
            NodeEntry { node: node.clone(), tags: BTreeSet::new() },
        );
        self.install_monitor(node.clone());
        self.fan_out(&self.join_subs, MembershipEvent::Join { node: node.clone() });

        Ok(())
    }

    /// Spawn the liveness monitor for a newly connected `node` (§4.6(b),
    /// §5(iv)): it polls the fabric at `monitor_interval` and, the moment
    /// it observes the node has dropped off (network/monitor drop), removes
    /// the entry and fires `Leave { MonitorDropped }` to every subscriber
    /// itself — no external poll is required for this to happen.
    ///
    /// Holds only a `Weak` reference to `self` so a dropped `Membership`
    /// doesn't keep every one of its monitor tasks alive forever.
    fn install_monitor(self: &Arc<Self>, node: NodeId) {
        let fabric = Arc::clone(&self.fabric);
        let interval = self.monitor_interval;
        let weak_self = Arc::downgrade(self);
        let target = node.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !fabric.is_registered(&target) {
                    break;
                }
            }
            if let Some(membership) = weak_self.upgrade() {
                if membership.entries.remove(&target).is_some() {
                    membership.monitors.remove(&target);
                    membership.fan_out(
                        &membership.leave_subs,
                        MembershipEvent::Leave { node: target.clone(), reason: LeaveReason::MonitorDropped },
                    );
                }
            }
        });
        self.monitors.insert(node, handle);
    }

    /// Explicitly remove a connected worker, firing `Leave { reason:
    /// Removed }` to every subscriber.
    ///
    /// # Errors
    /// Returns [`nebula_error::Error::NotConnected`] if `node` is not
    /// currently connected.
    pub async fn disconnect(&self, node: &NodeId) -> Result<()> {
        if self.entries.remove(node).is_none() {
            return Err(Error::NotConnected(node.to_string()));
        }
        if let Some((_, handle)) = self.monitors.remove(node) {
            handle.abort();
        }
        let _ = self
            .fabric
            .call(node, self.from.clone(), WireTag::RemoveMaster, Payload::Json(json!({})), Duration::from_secs(5))
            .await;
        self.fan_out(&self.leave_subs, MembershipEvent::Leave { node: node.clone(), reason: LeaveReason::Removed });
        Ok(())
    }

    fn fan_out(&self, subs: &RwLock<Vec<SubscriberSlot>>, event: MembershipEvent) {
        for slot in subs.read().iter() {
            notify(&slot.sender, event.clone());
        }
    }
}

fn subscribe(
    subs: &RwLock<Vec<SubscriberSlot>>,
    next_id: &AtomicU64,
) -> (u64, tokio::sync::mpsc::Receiver<MembershipEvent>) {
    let (tx, rx) = tokio::sync::mpsc::channel(DEFAULT_SUBSCRIBER_CAPACITY);
    let id = next_id.fetch_add(1, Ordering::Relaxed);
    subs.write().push(SubscriberSlot { id, sender: tx });
    (id, rx)
}

fn unsubscribe(subs: &RwLock<Vec<SubscriberSlot>>, id: u64) {
    subs.write().retain(|slot| slot.id != id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::WorkerGuard;
    use pretty_assertions::assert_eq;

    async fn spawn_worker(fabric: &Arc<Fabric>, node: NodeId, cookie: &str, role: Role) -> Arc<WorkerGuard> {
        crate::worker::spawn_worker_node(fabric, node, cookie, role).await
    }

    #[tokio::test]
    async fn handshake_failure_scenario_from_design_document() {
        let fabric = Arc::new(Fabric::new());
        let master_id = NodeId::new("master", "h0");
        let worker_a = NodeId::new("worker_a", "h1");
        let not_a_worker = NodeId::new("not_a_worker", "h2");
        let unreachable_c = NodeId::new("unreachable_c", "h3");

        spawn_worker(&fabric, worker_a.clone(), "secret", Role::Worker).await;
        spawn_worker(&fabric, not_a_worker.clone(), "secret", Role::Master).await;
        // unreachable_c is never registered on the fabric.

        let membership = Arc::new(Membership::new(Arc::clone(&fabric), master_id, "secret", true));
        let (_id, mut joins) = membership.subscribe_join();

        let err = membership
            .connect(&[worker_a.clone(), not_a_worker.clone(), unreachable_c.clone()])
            .await
            .unwrap_err();

        let ConnectError::Failures(failures) = err else { panic!("expected Failures") };
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().any(|f| f.reason == "no_skitter_worker" && f.node == not_a_worker.to_string()));
        assert!(failures.iter().any(|f| f.reason == "not_connected" && f.node == unreachable_c.to_string()));

        assert!(membership.is_connected(&worker_a));
        let event = joins.try_recv().unwrap();
        assert_eq!(event, MembershipEvent::Join { node: worker_a });
        assert!(joins.try_recv().is_err(), "only one join should have been delivered");
    }

    #[tokio::test]
    async fn not_distributed_rejects_multi_node_connect() {
        let fabric = Arc::new(Fabric::new());
        let master_id = NodeId::new("master", "h0");
        let membership = Arc::new(Membership::new(Arc::clone(&fabric), master_id, "secret", false));
        let err = membership.connect(&[NodeId::new("w", "h")]).await.unwrap_err();
        assert_eq!(err, ConnectError::NotDistributed);
    }

    #[tokio::test]
    async fn disconnect_then_reconnect_reestablishes_state() {
        let fabric = Arc::new(Fabric::new());
        let master_id = NodeId::new("master", "h0");
        let worker = NodeId::new("w1", "h1");
        spawn_worker(&fabric, worker.clone(), "secret", Role::Worker).await;

        let membership = Arc::new(Membership::new(Arc::clone(&fabric), master_id, "secret", true));
        let (_jid, mut joins) = membership.subscribe_join();
        let (_lid, mut leaves) = membership.subscribe_leave();

        membership.connect(&[worker.clone()]).await.unwrap();
        assert!(matches!(joins.try_recv().unwrap(), MembershipEvent::Join { .. }));

        membership.disconnect(&worker).await.unwrap();
        assert!(matches!(leaves.try_recv().unwrap(), MembershipEvent::Leave { reason: LeaveReason::Removed, .. }));
        assert!(!membership.is_connected(&worker));

        membership.connect(&[worker.clone()]).await.unwrap();
        assert!(matches!(joins.try_recv().unwrap(), MembershipEvent::Join { .. }));
        assert!(joins.try_recv().is_err());
        assert!(leaves.try_recv().is_err());
    }

    #[tokio::test]
    async fn second_master_registration_is_already_connected() {
        let fabric = Arc::new(Fabric::new());
        let worker = NodeId::new("w1", "h1");
        spawn_worker(&fabric, worker.clone(), "secret", Role::Worker).await;

        let first = Arc::new(Membership::new(Arc::clone(&fabric), NodeId::new("m1", "h0"), "secret", true));
        first.connect(&[worker.clone()]).await.unwrap();

        let second = Arc::new(Membership::new(Arc::clone(&fabric), NodeId::new("m2", "h0"), "secret", true));
        let err = second.connect(&[worker.clone()]).await.unwrap_err();
        let ConnectError::Failures(failures) = err else { panic!("expected Failures") };
        assert_eq!(failures[0].reason, "already_connected");
    }

    #[tokio::test]
    async fn monitor_autonomously_fires_leave_on_fabric_drop() {
        let fabric = Arc::new(Fabric::new());
        let worker = NodeId::new("w1", "h1");
        spawn_worker(&fabric, worker.clone(), "secret", Role::Worker).await;

        let membership = Arc::new(
            Membership::new(Arc::clone(&fabric), NodeId::new("m", "h0"), "secret", true)
                .with_monitor_interval(Duration::from_millis(5)),
        );
        let (_lid, mut leaves) = membership.subscribe_leave();
        membership.connect(&[worker.clone()]).await.unwrap();

        fabric.unregister(&worker);

        // No poll to drive here: the monitor task installed by `connect`
        // notices the drop on its own next tick and fires the leave event
        // without any caller-side nudge.
        let event = tokio::time::timeout(Duration::from_secs(1), leaves.recv())
            .await
            .expect("monitor should have fired a leave event within the timeout")
            .expect("leave channel should not have closed");
        assert_eq!(event, MembershipEvent::Leave { node: worker.clone(), reason: LeaveReason::MonitorDropped });
        assert!(!membership.is_connected(&worker));
    }
}
