//! The workflow graph: nodes linked port-to-port, plus validation.

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use nebula_core::Port;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;

use crate::node::{Endpoint, Link, Node};

/// Where a validation finding applies, so a caller (e.g. the surface DSL)
/// can point a user at the offending part of their workflow description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// A problem with one node, named by id.
    Node(String),
    /// A problem with one link, named by its index in the link list.
    Link(usize),
    /// A problem with the graph as a whole (e.g. a cycle spanning several
    /// nodes).
    Graph,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Node(id) => write!(f, "node `{id}`"),
            Position::Link(i) => write!(f, "link #{i}"),
            Position::Graph => write!(f, "graph"),
        }
    }
}

/// One validation finding, carrying the position it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDefinitionError {
    /// Where the problem was found.
    pub position: Position,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for WorkflowDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.position, self.message)
    }
}

/// A directed graph of component/sub-workflow nodes linked port-to-port.
#[derive(Clone)]
pub struct Workflow {
    in_ports: Vec<Port>,
    out_ports: Vec<Port>,
    nodes: IndexMap<String, Node>,
    links: Vec<Link>,
}

impl Workflow {
    /// Build a workflow from its external ports, nodes, and links.
    ///
    /// This does not validate the result — call [`Workflow::validate`]
    /// before deploying. Building and validating are separate so a caller
    /// assembling a workflow incrementally (e.g. a surface DSL) can inspect
    /// every problem at once rather than failing on the first invalid
    /// link.
    #[must_use]
    pub fn build(
        in_ports: Vec<Port>,
        out_ports: Vec<Port>,
        nodes: IndexMap<String, Node>,
        links: Vec<Link>,
    ) -> Self {
        Self {
            in_ports,
            out_ports,
            nodes,
            links,
        }
    }

    /// The workflow's external in-ports.
    #[must_use]
    pub fn in_ports(&self) -> &[Port] {
        &self.in_ports
    }

    /// The workflow's external out-ports.
    #[must_use]
    pub fn out_ports(&self) -> &[Port] {
        &self.out_ports
    }

    /// This workflow's nodes, keyed by id.
    #[must_use]
    pub fn nodes(&self) -> &IndexMap<String, Node> {
        &self.nodes
    }

    /// This workflow's links, in declaration order.
    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Validate this workflow against the design document's invariants,
    /// collecting every finding rather than stopping at the first:
    ///
    /// - every link endpoint resolves to an existing port,
    /// - each internal in-port is the destination of at most one link,
    /// - the graph is acyclic once collapsed to node-level edges (a
    ///   component may still loop messages back to itself).
    ///
    /// An empty result means the workflow is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<WorkflowDefinitionError> {
        let mut errors = Vec::new();
        let mut seen_destinations: HashSet<(String, Port)> = HashSet::new();

        for (index, (source, destination)) in self.links.iter().enumerate() {
            self.validate_source(index, source, &mut errors);
            self.validate_destination(index, destination, &mut errors, &mut seen_destinations);
        }

        if let Some(err) = self.validate_acyclic() {
            errors.push(err);
        }

        errors
    }

    fn validate_source(&self, index: usize, endpoint: &Endpoint, errors: &mut Vec<WorkflowDefinitionError>) {
        match endpoint {
            Endpoint::Boundary { port } => {
                if !self.in_ports.contains(port) {
                    errors.push(WorkflowDefinitionError {
                        position: Position::Link(index),
                        message: format!("source boundary port `{port}` is not a workflow in-port"),
                    });
                }
            }
            Endpoint::Internal { node, port } => match self.nodes.get(node) {
                None => errors.push(WorkflowDefinitionError {
                    position: Position::Link(index),
                    message: format!("source node `{node}` does not exist"),
                }),
                Some(n) => {
                    if !n.out_ports().contains(port) {
                        errors.push(WorkflowDefinitionError {
                            position: Position::Link(index),
                            message: format!("node `{node}` has no out-port `{port}`"),
                        });
                    }
                }
            },
        }
    }

    fn validate_destination(
        &self,
        index: usize,
        endpoint: &Endpoint,
        errors: &mut Vec<WorkflowDefinitionError>,
        seen_destinations: &mut HashSet<(String, Port)>,
    ) {
        match endpoint {
            Endpoint::Boundary { port } => {
                if !self.out_ports.contains(port) {
                    errors.push(WorkflowDefinitionError {
                        position: Position::Link(index),
                        message: format!("destination boundary port `{port}` is not a workflow out-port"),
                    });
                }
            }
            Endpoint::Internal { node, port } => match self.nodes.get(node) {
                None => errors.push(WorkflowDefinitionError {
                    position: Position::Link(index),
                    message: format!("destination node `{node}` does not exist"),
                }),
                Some(n) => {
                    if !n.in_ports().contains(port) {
                        errors.push(WorkflowDefinitionError {
                            position: Position::Link(index),
                            message: format!("node `{node}` has no in-port `{port}`"),
                        });
                    } else if !seen_destinations.insert((node.clone(), port.clone())) {
                        errors.push(WorkflowDefinitionError {
                            position: Position::Node(node.clone()),
                            message: format!(
                                "definition_error: duplicate_destination({node}, {port})"
                            ),
                        });
                    }
                }
            },
        }
    }

    fn validate_acyclic(&self) -> Option<WorkflowDefinitionError> {
        let mut graph = DiGraph::<&str, ()>::new();
        let mut index_of = IndexMap::new();
        for id in self.nodes.keys() {
            index_of.insert(id.as_str(), graph.add_node(id.as_str()));
        }
        for (source, destination) in &self.links {
            if let (
                Endpoint::Internal { node: src_node, .. },
                Endpoint::Internal { node: dst_node, .. },
            ) = (source, destination)
            {
                if src_node != dst_node {
                    if let (Some(&s), Some(&d)) = (index_of.get(src_node.as_str()), index_of.get(dst_node.as_str())) {
                        graph.add_edge(s, d, ());
                    }
                }
            }
        }
        if is_cyclic_directed(&graph) {
            Some(WorkflowDefinitionError {
                position: Position::Graph,
                message: "definition_error: cycle among distinct nodes".to_string(),
            })
        } else {
            None
        }
    }
}
