#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Router
//!
//! Routing: §4.9 of the design document. [`route`] is a pure function
//! from a [`nebula_deploy::DeployedWorkflow`]'s routing table plus one
//! `(source_component, out_port, values)` triple to a sequence of `send`
//! hook invocations on every destination, preserving each destination's
//! publish order. It holds no state of its own beyond the
//! `DeployedWorkflow` reference it is called with.

use nebula_core::{Hook, Port, StateMap};
use nebula_deploy::DeployedWorkflow;
use nebula_strategy::{Context, dispatch};
use serde_json::{Value, json};

/// Deliver `values`, published by `source_component_id` on `out_port`, to
/// every destination the routing table names, invoking each
/// destination's `send` hook once per value in publish order.
///
/// A destination the routing table names but that was never deployed
/// (e.g. `prepare` rewrote it to an id resolved by an out-of-process
/// collaborator) is skipped rather than treated as an error — the router
/// only dispatches to components it actually holds.
///
/// # Errors
/// Returns the first error a destination's `send` hook raises; delivery
/// to destinations not yet attempted stops at that point.
pub fn route(
    deployed: &DeployedWorkflow,
    source_component_id: &str,
    out_port: &Port,
    values: &[Value],
) -> nebula_error::Result<()> {
    for (dest_component_id, dest_port) in deployed.routing_table().destinations(source_component_id, out_port) {
        let Some(dest) = deployed.component(&dest_component_id) else {
            tracing::warn!(destination = %dest_component_id, "routed to an undeployed component; skipping");
            continue;
        };

        for value in values {
            let ctx = Context::with_invocation(
                std::sync::Arc::clone(&dest.component),
                std::sync::Arc::clone(&dest.strategy),
                dest.deployment_data.clone(),
                json!({
                    "from_component": source_component_id,
                    "from_port": out_port.as_str(),
                    "to_port": dest_port.as_str(),
                }),
            );
            dispatch(&ctx, Hook::Send, &StateMap::new(), value.clone())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use nebula_core::{Callback, Component, StateCapability, Strategy};
    use nebula_deploy::deploy;
    use nebula_workflow::{Endpoint, Node, Workflow};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    fn noop() -> Callback {
        Callback::new(
            |_env, _args| json!({}),
            [] as [String; 0],
            [] as [String; 0],
            [] as [Port; 0],
            StateCapability::None,
            false,
        )
    }

    fn complete(mut strategy: Strategy, hook: Hook, callback: Callback) -> Strategy {
        for h in Hook::ALL {
            if strategy.hook(h).is_none() {
                strategy = strategy.with_hook(h, Some(noop()));
            }
        }
        strategy.with_hook(hook, Some(callback))
    }

    #[tokio::test]
    async fn routes_every_value_to_the_single_destination_in_order() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let send_hook = Callback::new(
            move |_env, args| {
                let payload = args.get("payload").cloned().unwrap_or(Value::Null);
                sink.lock().unwrap().push(payload);
                json!({})
            },
            [] as [String; 0],
            [] as [String; 0],
            [] as [Port; 0],
            StateCapability::None,
            false,
        );

        let a = Arc::new(
            Component::new(
                Some("A".into()),
                vec![],
                vec![Port::new("in")],
                vec![Port::new("out")],
                IndexMap::new(),
                complete(Strategy::empty(), Hook::Define, noop()),
            )
            .unwrap(),
        );
        let b = Arc::new(
            Component::new(
                Some("B".into()),
                vec![],
                vec![Port::new("in")],
                vec![],
                IndexMap::new(),
                complete(Strategy::empty(), Hook::Send, send_hook),
            )
            .unwrap(),
        );

        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), Node::Component { component: a, args: Value::Null, strategy_override: None });
        nodes.insert("b".to_string(), Node::Component { component: b, args: Value::Null, strategy_override: None });
        let links = vec![(Endpoint::internal("a", "out"), Endpoint::internal("b", "in"))];
        let workflow = Workflow::build(vec![], vec![], nodes, links);

        let deployed = deploy(&workflow).await.unwrap();
        route(&deployed, "a", &Port::new("out"), &[json!(1), json!(2), json!(3)]).unwrap();

        assert_eq!(received.lock().unwrap().clone(), vec![json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn routing_to_an_undeployed_destination_is_skipped_not_an_error() {
        let a = Arc::new(
            Component::new(
                Some("A".into()),
                vec![],
                vec![Port::new("in")],
                vec![Port::new("out")],
                IndexMap::new(),
                complete(Strategy::empty(), Hook::Define, noop()),
            )
            .unwrap(),
        );
        let mut nodes = IndexMap::new();
        nodes.insert("a".to_string(), Node::Component { component: a, args: Value::Null, strategy_override: None });
        let workflow = Workflow::build(vec![], vec![], nodes, vec![]);
        let deployed = deploy(&workflow).await.unwrap();

        route(&deployed, "a", &Port::new("out"), &[json!(1)]).unwrap();
    }
}
