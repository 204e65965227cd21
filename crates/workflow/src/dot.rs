//! GraphViz DOT export, per §6's "diagnostic export" collaborator
//! interface: nested workflows as clusters, ports as record-shaped node
//! fields.

use std::fmt::Write as _;

use crate::node::{Endpoint, Node};
use crate::workflow::Workflow;

/// Render `workflow` as a GraphViz `digraph`.
#[must_use]
pub fn to_dot(workflow: &Workflow) -> String {
    let mut out = String::new();
    out.push_str("digraph workflow {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=record];\n");
    render_nodes(workflow, &mut out, "");
    for (index, (source, destination)) in workflow.links().iter().enumerate() {
        let _ = writeln!(
            out,
            "  {} -> {} [label=\"{index}\"];",
            endpoint_ref(source),
            endpoint_ref(destination)
        );
    }
    out.push_str("}\n");
    out
}

fn render_nodes(workflow: &Workflow, out: &mut String, prefix: &str) {
    for (id, node) in workflow.nodes() {
        let qualified = qualify(prefix, id);
        match node {
            Node::Component { component, .. } => {
                let label_ins: Vec<String> = component
                    .in_ports()
                    .iter()
                    .map(|p| format!("<in_{p}> {p}"))
                    .collect();
                let label_outs: Vec<String> = component
                    .out_ports()
                    .iter()
                    .map(|p| format!("<out_{p}> {p}"))
                    .collect();
                let name = component.name().unwrap_or(id.as_str());
                let _ = writeln!(
                    out,
                    "  \"{qualified}\" [label=\"{{ {{{}}} | {name} | {{{}}} }}\"];",
                    label_ins.join("|"),
                    label_outs.join("|"),
                );
            }
            Node::Workflow { workflow: inner, .. } => {
                let _ = writeln!(out, "  subgraph \"cluster_{qualified}\" {{");
                let _ = writeln!(out, "    label=\"{id}\";");
                render_nodes(inner, out, &qualified);
                out.push_str("  }\n");
            }
        }
    }
}

fn qualify(prefix: &str, id: &str) -> String {
    if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{prefix}/{id}")
    }
}

fn endpoint_ref(endpoint: &Endpoint) -> String {
    match endpoint {
        Endpoint::Internal { node, port } => format!("\"{node}\":out_{port}"),
        Endpoint::Boundary { port } => format!("\"boundary_{port}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Endpoint;
    use indexmap::IndexMap;
    use nebula_core::{Component, Port, Strategy};
    use std::sync::Arc;

    #[test]
    fn renders_a_digraph_with_record_nodes() {
        let mut nodes = IndexMap::new();
        nodes.insert(
            "a".to_string(),
            Node::Component {
                component: Arc::new(
                    Component::new(
                        Some("A".into()),
                        vec![],
                        vec![Port::new("in")],
                        vec![Port::new("out")],
                        IndexMap::new(),
                        Strategy::empty(),
                    )
                    .unwrap(),
                ),
                args: serde_json::Value::Null,
                strategy_override: None,
            },
        );
        nodes.insert(
            "b".to_string(),
            Node::Component {
                component: Arc::new(
                    Component::new(
                        Some("B".into()),
                        vec![],
                        vec![Port::new("in")],
                        vec![Port::new("out")],
                        IndexMap::new(),
                        Strategy::empty(),
                    )
                    .unwrap(),
                ),
                args: serde_json::Value::Null,
                strategy_override: None,
            },
        );
        let links = vec![(Endpoint::internal("a", "out"), Endpoint::internal("b", "in"))];
        let wf = Workflow::build(vec![], vec![], nodes, links);
        let dot = to_dot(&wf);
        assert!(dot.starts_with("digraph workflow {"));
        assert!(dot.contains("shape=record"));
        assert!(dot.contains("\"a\" [label="));
        assert!(dot.contains("-> "));
    }
}
