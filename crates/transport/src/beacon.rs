//! The beacon handshake: every node answers `verify` with its role and a
//! cookie check.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::dispatcher::Handler;
use crate::fabric::{Fabric, Payload};
use crate::node_id::{NodeId, Role};
use crate::wire::WireTag;

/// This node's beacon: the role and cookie it answers a handshake with.
#[derive(Debug, Clone)]
pub struct Beacon {
    /// This node's role.
    pub role: Role,
    /// The shared distribution cookie.
    pub cookie: String,
}

impl Beacon {
    /// Build a beacon.
    #[must_use]
    pub fn new(role: Role, cookie: impl Into<String>) -> Self {
        Self {
            role,
            cookie: cookie.into(),
        }
    }

    /// A [`WireTag::Verify`] handler answering with this beacon's role and
    /// whether the presented cookie matched.
    #[must_use]
    pub fn handler(self: Arc<Self>) -> Handler {
        Arc::new(move |_from, payload| {
            let presented = payload.get("cookie").and_then(|v| v.as_str()).unwrap_or("");
            Ok(json!({
                "role": self.role.as_str(),
                "cookie_ok": presented == self.cookie,
            }))
        })
    }
}

/// The outcome of a `verify(node_id, expected_role)` handshake attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The node answered, its role matched, and the cookie matched.
    Ok,
    /// The node answered but reported a different role than expected.
    WrongRole,
    /// The node could not be reached before the deadline, or has no
    /// registered inbox.
    Unreachable,
    /// The node answered but its cookie did not match.
    CookieMismatch,
}

/// Perform the beacon handshake against `target`.
pub async fn verify(
    fabric: &Fabric,
    from: NodeId,
    target: &NodeId,
    expected_role: Role,
    cookie: &str,
    deadline: Duration,
) -> VerifyOutcome {
    let response = fabric
        .call(
            target,
            from,
            WireTag::Verify,
            Payload::Json(json!({ "cookie": cookie })),
            deadline,
        )
        .await;

    let Ok(value) = response else {
        return VerifyOutcome::Unreachable;
    };

    let cookie_ok = value.get("cookie_ok").and_then(|v| v.as_bool()).unwrap_or(false);
    if !cookie_ok {
        return VerifyOutcome::CookieMismatch;
    }

    match value.get("role").and_then(|v| v.as_str()) {
        Some(role) if role == expected_role.as_str() => VerifyOutcome::Ok,
        _ => VerifyOutcome::WrongRole,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::fabric::Envelope;
    use pretty_assertions::assert_eq;

    async fn spawn_node(fabric: &Arc<Fabric>, node: NodeId, beacon: Beacon) {
        let mut rx = fabric.register(node, 8);
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.register(WireTag::Verify, Arc::new(beacon).handler());
        tokio::spawn(async move {
            while let Some(Envelope { from, tag, payload, reply }) = rx.recv().await {
                let value = match payload {
                    Payload::Json(v) => dispatcher.dispatch(from, tag, v).unwrap_or(serde_json::Value::Null),
                    Payload::Task(t) => t(),
                };
                let _ = reply.send(value);
            }
        });
    }

    #[tokio::test]
    async fn verify_succeeds_on_matching_role_and_cookie() {
        let fabric = Arc::new(Fabric::new());
        let worker = NodeId::new("w1", "h1");
        spawn_node(&fabric, worker.clone(), Beacon::new(Role::Worker, "secret")).await;

        let outcome = verify(
            &fabric,
            NodeId::new("master", "h0"),
            &worker,
            Role::Worker,
            "secret",
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(outcome, VerifyOutcome::Ok);
    }

    #[tokio::test]
    async fn verify_detects_wrong_role() {
        let fabric = Arc::new(Fabric::new());
        let not_a_worker = NodeId::new("n1", "h1");
        spawn_node(&fabric, not_a_worker.clone(), Beacon::new(Role::Master, "secret")).await;

        let outcome = verify(
            &fabric,
            NodeId::new("master", "h0"),
            &not_a_worker,
            Role::Worker,
            "secret",
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(outcome, VerifyOutcome::WrongRole);
    }

    #[tokio::test]
    async fn verify_detects_cookie_mismatch() {
        let fabric = Arc::new(Fabric::new());
        let worker = NodeId::new("w1", "h1");
        spawn_node(&fabric, worker.clone(), Beacon::new(Role::Worker, "secret")).await;

        let outcome = verify(
            &fabric,
            NodeId::new("master", "h0"),
            &worker,
            Role::Worker,
            "wrong",
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(outcome, VerifyOutcome::CookieMismatch);
    }

    #[tokio::test]
    async fn verify_reports_unreachable_for_unknown_node() {
        let fabric = Arc::new(Fabric::new());
        let outcome = verify(
            &fabric,
            NodeId::new("master", "h0"),
            &NodeId::new("ghost", "nowhere"),
            Role::Worker,
            "secret",
            Duration::from_millis(50),
        )
        .await;
        assert_eq!(outcome, VerifyOutcome::Unreachable);
    }
}
