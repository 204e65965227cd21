//! Workflow flattening: expanding nested sub-workflows into one flat graph
//! of component nodes, scoped by `/`-joined id prefixes (§4.8).

use std::sync::Arc;

use indexmap::IndexMap;
use nebula_core::{Component, Port, Strategy};
use nebula_workflow::{Endpoint, Workflow};
use serde_json::Value;

/// A flattened component instantiation: the original `Node::Component`
/// fields, keyed in the flat graph by its globally-scoped id.
#[derive(Clone)]
pub struct FlatNode {
    /// The component being instantiated.
    pub component: Arc<Component>,
    /// Instantiation arguments.
    pub args: Value,
    /// An optional strategy override, to be merged as the child over the
    /// component's own strategy at resolve time.
    pub strategy_override: Option<Strategy>,
}

/// A port on a node in the flat graph, always node-scoped (no boundary
/// endpoints survive flattening except at the outermost workflow, where
/// they describe its own external interface).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlatEndpoint {
    /// Globally-scoped node id.
    pub node: String,
    /// Port name on that node.
    pub port: Port,
}

/// The result of flattening one workflow (recursively expanding every
/// nested sub-workflow it contains).
#[derive(Default)]
pub struct FlattenResult {
    /// Every component node in the flattened graph, keyed by global id.
    pub nodes: IndexMap<String, FlatNode>,
    /// Every link fully resolved to node-scoped endpoints.
    pub links: Vec<(FlatEndpoint, FlatEndpoint)>,
    /// This workflow's own in-ports, mapped to the flattened destinations
    /// they feed (populated for the outermost call; an external caller
    /// feeds tokens here).
    pub in_port_targets: IndexMap<Port, Vec<FlatEndpoint>>,
    /// This workflow's own out-ports, mapped to the flattened source that
    /// feeds them (populated for the outermost call; an external caller
    /// reads tokens here).
    pub out_port_source: IndexMap<Port, Vec<FlatEndpoint>>,
}

fn qualify(prefix: &str, id: &str) -> String {
    if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{prefix}/{id}")
    }
}

/// Flatten `workflow`, scoping every node id under `prefix` (empty for the
/// outermost call).
#[must_use]
pub fn flatten(workflow: &Workflow, prefix: &str) -> FlattenResult {
    let mut result = FlattenResult::default();
    // Per-child-workflow-node boundary maps, needed to resolve links at
    // this level that touch a `Node::Workflow` node.
    let mut child_in_targets: IndexMap<String, IndexMap<Port, Vec<FlatEndpoint>>> = IndexMap::new();
    let mut child_out_source: IndexMap<String, IndexMap<Port, Vec<FlatEndpoint>>> = IndexMap::new();

    for (id, node) in workflow.nodes() {
        let global_id = qualify(prefix, id);
        match node {
            nebula_workflow::Node::Component { component, args, strategy_override } => {
                result.nodes.insert(
                    global_id,
                    FlatNode {
                        component: Arc::clone(component),
                        args: args.clone(),
                        strategy_override: strategy_override.clone(),
                    },
                );
            }
            nebula_workflow::Node::Workflow { workflow: inner, .. } => {
                let child = flatten(inner, &global_id);
                result.nodes.extend(child.nodes);
                result.links.extend(child.links);
                child_in_targets.insert(id.clone(), child.in_port_targets);
                child_out_source.insert(id.clone(), child.out_port_source);
            }
        }
    }

    let resolve_source = |endpoint: &Endpoint| -> Option<Vec<FlatEndpoint>> {
        match endpoint {
            Endpoint::Internal { node, port } => {
                if let Some(sources) = child_out_source.get(node) {
                    sources.get(port).cloned()
                } else {
                    Some(vec![FlatEndpoint { node: qualify(prefix, node), port: port.clone() }])
                }
            }
            Endpoint::Boundary { .. } => None,
        }
    };

    let resolve_destination = |endpoint: &Endpoint| -> Option<Vec<FlatEndpoint>> {
        match endpoint {
            Endpoint::Internal { node, port } => {
                if let Some(targets) = child_in_targets.get(node) {
                    targets.get(port).cloned()
                } else {
                    Some(vec![FlatEndpoint { node: qualify(prefix, node), port: port.clone() }])
                }
            }
            Endpoint::Boundary { .. } => None,
        }
    };

    for (source, destination) in workflow.links() {
        let destinations = resolve_destination(destination);
        match (source, destinations) {
            (Endpoint::Boundary { port }, Some(dests)) => {
                result.in_port_targets.entry(port.clone()).or_default().extend(dests);
            }
            (Endpoint::Boundary { port }, None) => {
                // A boundary-to-boundary pass-through: the destination is
                // itself this workflow's own out-port. Nothing to route
                // internally; a later stage composing this workflow into a
                // parent will wire `out_port_source` directly from the
                // caller-supplied source.
                result.in_port_targets.entry(port.clone()).or_default();
            }
            (other_source, Some(dests)) => {
                let Some(sources) = resolve_source(other_source) else { continue };
                for src in sources {
                    for dst in &dests {
                        result.links.push((src.clone(), dst.clone()));
                    }
                }
            }
            (other_source, None) => {
                // Destination is this workflow's own out-port.
                let Endpoint::Boundary { port } = destination else { continue };
                let Some(sources) = resolve_source(other_source) else { continue };
                result.out_port_source.entry(port.clone()).or_default().extend(sources);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::{Component, Strategy};
    use nebula_workflow::{Endpoint, Node};
    use pretty_assertions::assert_eq;

    fn one_in_one_out(name: &str) -> Arc<Component> {
        Arc::new(
            Component::new(
                Some(name.into()),
                vec![],
                vec![Port::new("in")],
                vec![Port::new("out")],
                IndexMap::new(),
                Strategy::empty(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn flattens_a_flat_two_node_chain_unchanged() {
        let mut nodes = IndexMap::new();
        nodes.insert(
            "a".to_string(),
            Node::Component { component: one_in_one_out("A"), args: Value::Null, strategy_override: None },
        );
        nodes.insert(
            "b".to_string(),
            Node::Component { component: one_in_one_out("B"), args: Value::Null, strategy_override: None },
        );
        let links = vec![(Endpoint::internal("a", "out"), Endpoint::internal("b", "in"))];
        let wf = Workflow::build(vec![], vec![], nodes, links);

        let flat = flatten(&wf, "");
        assert_eq!(flat.nodes.len(), 2);
        assert_eq!(
            flat.links,
            vec![(
                FlatEndpoint { node: "a".to_string(), port: Port::new("out") },
                FlatEndpoint { node: "b".to_string(), port: Port::new("in") },
            )]
        );
    }

    #[test]
    fn nested_sub_workflow_is_expanded_with_prefixed_ids() {
        let mut inner_nodes = IndexMap::new();
        inner_nodes.insert(
            "x".to_string(),
            Node::Component { component: one_in_one_out("X"), args: Value::Null, strategy_override: None },
        );
        let inner = Arc::new(Workflow::build(
            vec![Port::new("value")],
            vec![Port::new("result")],
            inner_nodes,
            vec![
                (Endpoint::boundary("value"), Endpoint::internal("x", "in")),
                (Endpoint::internal("x", "out"), Endpoint::boundary("result")),
            ],
        ));

        let mut outer_nodes = IndexMap::new();
        outer_nodes.insert(
            "source".to_string(),
            Node::Component { component: one_in_one_out("Source"), args: Value::Null, strategy_override: None },
        );
        outer_nodes.insert("inner".to_string(), Node::Workflow { workflow: Arc::clone(&inner), args: Value::Null });
        let links = vec![(Endpoint::internal("source", "out"), Endpoint::internal("inner", "value"))];
        let outer = Workflow::build(vec![], vec![], outer_nodes, links);

        let flat = flatten(&outer, "");
        assert_eq!(flat.nodes.len(), 2);
        assert!(flat.nodes.contains_key("source"));
        assert!(flat.nodes.contains_key("inner/x"));
        assert_eq!(
            flat.links,
            vec![(
                FlatEndpoint { node: "source".to_string(), port: Port::new("out") },
                FlatEndpoint { node: "inner/x".to_string(), port: Port::new("in") },
            )]
        );
    }
}
