//! Join/leave events and the pub-sub subscriber lists that fan them out.

use nebula_transport::NodeId;

/// A membership change, delivered to join/leave subscribers in the order
/// the master observed them (§5 ordering guarantee (iv)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    /// A worker completed the handshake and was admitted.
    Join {
        /// The node that joined.
        node: NodeId,
    },
    /// A worker left the cluster, explicitly or via a dropped monitor.
    Leave {
        /// The node that left.
        node: NodeId,
        /// Why it left.
        reason: LeaveReason,
    },
}

/// Why a [`MembershipEvent::Leave`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// The master explicitly called `disconnect`.
    Removed,
    /// The liveness monitor detected the node is no longer reachable.
    MonitorDropped,
}

impl LeaveReason {
    /// Snake-case name, matching the design document's `:removed` atom.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LeaveReason::Removed => "removed",
            LeaveReason::MonitorDropped => "monitor_dropped",
        }
    }
}

/// A mailbox-like subscriber: a bounded channel a caller drains to observe
/// membership events. Subscribers never block the master's connect/monitor
/// loop — events that don't fit are dropped (drop-oldest), per §9's
/// "subscribers register with a back-pressure policy."
pub type Subscriber = tokio::sync::mpsc::Sender<MembershipEvent>;

/// Default bound on a subscriber's event queue.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Send `event` to `subscriber`, dropping it (rather than blocking the
/// caller) if the subscriber's queue is full or it has been dropped.
pub(crate) fn notify(subscriber: &Subscriber, event: MembershipEvent) {
    if let Err(err) = subscriber.try_send(event) {
        match err {
            tokio::sync::mpsc::error::TrySendError::Full(_) => {
                tracing::warn!("membership subscriber queue full, dropping event");
            }
            tokio::sync::mpsc::error::TrySendError::Closed(_) => {}
        }
    }
}
