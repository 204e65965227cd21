//! §8 "Deploy-destroy round trip": a two-component workflow (Source ->
//! Average) deploys onto two workers, each `deploy` hook recording a
//! [`nebula_runtime::WorkerRef`]; `destroy` then leaves no worker alive.

use std::sync::Arc;

use indexmap::IndexMap;
use nebula_core::{Callback, Component, Hook, Port, StateCapability, Strategy};
use nebula_deploy::{deploy, destroy};
use nebula_runtime::{NodeRuntime, WorkerRef};
use nebula_transport::NodeId;
use nebula_workflow::{Endpoint, Node, Workflow};
use serde_json::{Value, json};

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

/// A strategy whose `deploy` hook spawns one worker on `runtime` and
/// reports it, and whose `drop_deployment` hook tears that worker down.
fn worker_spawning_strategy(runtime: Arc<NodeRuntime>, component_hint: &'static str) -> Strategy {
    let deploy_runtime = Arc::clone(&runtime);
    let deploy_hook = Callback::new(
        move |_env, args| {
            let Value::Object(map) = &args else { return json!({}) };
            let component_name = map.get("component_name").and_then(Value::as_str).unwrap_or(component_hint);
            let component: Arc<Component> = Arc::new(
                Component::new(
                    Some(component_name.to_string()),
                    vec![],
                    vec![Port::new("in")],
                    vec![],
                    IndexMap::new(),
                    Strategy::empty(),
                )
                .unwrap(),
            );
            let mut receive_strategy = Strategy::empty();
            for h in Hook::ALL {
                receive_strategy = receive_strategy.with_hook(h, Some(noop()));
            }
            let worker_id = deploy_runtime.fresh_worker_id(component_hint);
            let worker_ref = deploy_runtime.spawn_worker(
                worker_id,
                component,
                Arc::new(receive_strategy),
                Value::Null,
                component_hint,
                None,
            );
            json!({ "workers": [worker_ref] })
        },
        [] as [String; 0],
        [] as [String; 0],
        [] as [Port; 0],
        StateCapability::None,
        false,
    );

    let drop_runtime = Arc::clone(&runtime);
    let drop_hook = Callback::new(
        move |_env, args| {
            let Value::Object(map) = &args else { return json!({}) };
            if let Some(Value::Array(workers)) = map.get("deployment_data").and_then(|d| d.get("workers")) {
                for w in workers {
                    if let Ok(worker_ref) = serde_json::from_value::<WorkerRef>(w.clone()) {
                        drop_runtime.destroy_worker(&worker_ref.worker_id);
                    }
                }
            }
            json!({})
        },
        [] as [String; 0],
        [] as [String; 0],
        [] as [Port; 0],
        StateCapability::None,
        false,
    );

    let mut strategy = Strategy::empty();
    for h in Hook::ALL {
        strategy = strategy.with_hook(h, Some(noop()));
    }
    strategy.with_hook(Hook::Deploy, Some(deploy_hook)).with_hook(Hook::DropDeployment, Some(drop_hook))
}

#[tokio::test]
async fn deploy_destroy_round_trip_leaves_no_residual_workers() {
    let runtime = Arc::new(NodeRuntime::new(NodeId::new("node-a", "host-a")));

    let source = Arc::new(
        Component::new(
            Some("Source".into()),
            vec![],
            vec![Port::new("in")],
            vec![Port::new("out")],
            IndexMap::new(),
            worker_spawning_strategy(Arc::clone(&runtime), "source"),
        )
        .unwrap(),
    );
    let average = Arc::new(
        Component::new(
            Some("Average".into()),
            vec!["total".to_string(), "count".to_string()],
            vec![Port::new("value")],
            vec![Port::new("current")],
            IndexMap::new(),
            worker_spawning_strategy(Arc::clone(&runtime), "average"),
        )
        .unwrap(),
    );

    let mut nodes = IndexMap::new();
    nodes.insert("source".to_string(), Node::Component { component: source, args: Value::Null, strategy_override: None });
    nodes.insert("average".to_string(), Node::Component { component: average, args: Value::Null, strategy_override: None });
    let links = vec![(Endpoint::internal("source", "out"), Endpoint::internal("average", "value"))];
    let workflow = Workflow::build(vec![], vec![], nodes, links);

    let deployed = deploy(&workflow).await.unwrap();
    assert_eq!(deployed.worker_refs().len(), 2);
    assert_eq!(runtime.worker_count(), 2);

    destroy(&deployed);
    assert_eq!(runtime.worker_count(), 0);
}
