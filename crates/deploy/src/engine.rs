//! The deployment engine: flatten, resolve strategies, `deploy`, build the
//! routing table, `prepare`, and `destroy` (§4.8).

use std::sync::Arc;

use indexmap::IndexMap;
use nebula_core::{Component, Hook, Port, StateMap, Strategy};
use nebula_runtime::WorkerRef;
use nebula_strategy::{Context, dispatch, merge, require_complete};
use nebula_workflow::Workflow;
use serde_json::Value;
use tracing::warn;

use crate::flatten::flatten;
use crate::routing_table::{RoutingTable, fragment_from_value, fragment_to_value};

/// One deployed component instance: its resolved strategy and the
/// `deploy` hook's result, both needed by every later hook invocation on
/// it (`prepare`, `send`, `drop_deployment`).
#[derive(Clone)]
pub struct DeployedComponent {
    /// The component definition.
    pub component: Arc<Component>,
    /// The resolved, complete strategy this instance deploys with.
    pub strategy: Arc<Strategy>,
    /// The `deploy` hook's result, passed to every later hook as
    /// deployment data.
    pub deployment_data: Value,
}

/// A deployed workflow: every flattened component instance, the final
/// (post-`prepare`) routing table, and the external ports a caller can
/// feed or read (§3's `Deployment`).
pub struct DeployedWorkflow {
    components: IndexMap<String, DeployedComponent>,
    routing_table: RoutingTable,
    /// The workflow's own in-ports, mapped to the internal endpoints they
    /// feed.
    pub external_in_ports: IndexMap<Port, Vec<crate::flatten::FlatEndpoint>>,
    /// The workflow's own out-ports, mapped to the internal endpoint that
    /// feeds them.
    pub external_out_ports: IndexMap<Port, Vec<crate::flatten::FlatEndpoint>>,
}

impl DeployedWorkflow {
    /// The deployed instance for `component_id`, if it exists.
    #[must_use]
    pub fn component(&self, component_id: &str) -> Option<&DeployedComponent> {
        self.components.get(component_id)
    }

    /// Every deployed component id.
    pub fn component_ids(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    /// The final routing table, as left by `prepare`.
    #[must_use]
    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    /// Every [`WorkerRef`] recorded across every component's deployment
    /// data (a `deploy` hook is expected to report the workers it spawned
    /// under a `"workers"` array, per `nebula-runtime`'s `WorkerRef`
    /// shape).
    #[must_use]
    pub fn worker_refs(&self) -> Vec<WorkerRef> {
        self.components
            .values()
            .flat_map(|deployed| {
                deployed
                    .deployment_data
                    .get("workers")
                    .and_then(|v| serde_json::from_value::<Vec<WorkerRef>>(v.clone()).ok())
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// Resolve one node's strategy: the override, if present, merged as the
/// child over the component's own strategy (the parent).
fn resolve_strategy(component: &Component, strategy_override: Option<&Strategy>) -> Strategy {
    match strategy_override {
        Some(overlay) => merge(overlay, component.strategy()),
        None => component.strategy().clone(),
    }
}

/// Deploy `workflow`: flatten nested sub-workflows, resolve each node's
/// strategy, invoke `deploy` on every component, build and `prepare` the
/// routing table.
///
/// # Errors
/// Returns [`nebula_error::Error::DeploymentPartial`] if any node's
/// strategy is incomplete or its `deploy` hook fails; every
/// already-deployed component is torn down (via `drop_deployment`)
/// before the error is returned.
pub async fn deploy(workflow: &Workflow) -> nebula_error::Result<DeployedWorkflow> {
    let flat = flatten(workflow, "");

    let mut successes: IndexMap<String, DeployedComponent> = IndexMap::new();
    let mut failures: Vec<(String, String)> = Vec::new();

    for (id, node) in &flat.nodes {
        let strategy = resolve_strategy(&node.component, node.strategy_override.as_ref());
        if let Err(err) = require_complete(&strategy) {
            failures.push((id.clone(), err.to_string()));
            continue;
        }
        let strategy = Arc::new(strategy);
        let ctx = Context::pre_deployment(Arc::clone(&node.component), Arc::clone(&strategy));
        match dispatch(&ctx, Hook::Deploy, &StateMap::new(), node.args.clone()) {
            Ok(result) => {
                successes.insert(
                    id.clone(),
                    DeployedComponent {
                        component: Arc::clone(&node.component),
                        strategy,
                        deployment_data: result.result,
                    },
                );
            }
            Err(err) => failures.push((id.clone(), err.to_string())),
        }
    }

    if !failures.is_empty() {
        for (id, deployed) in &successes {
            drop_one_deployment(id, deployed);
        }
        return Err(nebula_error::Error::DeploymentPartial {
            successes: successes.into_keys().collect(),
            failures,
        });
    }

    let mut routing_table = RoutingTable::new();
    for id in successes.keys() {
        routing_table.set_fragment(id.clone(), Default::default());
    }
    for (source, destination) in &flat.links {
        routing_table.add_edge(source.node.clone(), source.port.clone(), (destination.node.clone(), destination.port.clone()));
    }

    for (id, deployed) in &successes {
        let payload = fragment_to_value(&routing_table.fragment(id));
        let ctx = Context::with_deployment(
            Arc::clone(&deployed.component),
            Arc::clone(&deployed.strategy),
            deployed.deployment_data.clone(),
        );
        match dispatch(&ctx, Hook::Prepare, &StateMap::new(), payload) {
            Ok(result) => {
                if let Some(rewritten) = fragment_from_value(&result.result) {
                    routing_table.set_fragment(id.clone(), rewritten);
                }
            }
            Err(err) => warn!(component = %id, %err, "prepare hook failed; keeping flattened routing"),
        }
    }

    Ok(DeployedWorkflow {
        components: successes,
        routing_table,
        external_in_ports: flat.in_port_targets,
        external_out_ports: flat.out_port_source,
    })
}

fn drop_one_deployment(id: &str, deployed: &DeployedComponent) {
    let ctx = Context::with_deployment(
        Arc::clone(&deployed.component),
        Arc::clone(&deployed.strategy),
        deployed.deployment_data.clone(),
    );
    if let Err(err) = dispatch(&ctx, Hook::DropDeployment, &StateMap::new(), Value::Null) {
        warn!(component = %id, %err, "drop_deployment failed during rollback");
    }
}

/// Tear down a deployed workflow: call every component's
/// `drop_deployment` hook. Best-effort — a single component's teardown
/// failure is logged, not propagated, so the rest still tear down.
pub fn destroy(deployed: &DeployedWorkflow) {
    for (id, component) in &deployed.components {
        drop_one_deployment(id, component);
    }
}
