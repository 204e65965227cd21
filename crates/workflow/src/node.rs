//! Workflow nodes and link endpoints.

use std::sync::Arc;

use nebula_core::{Component, Port, Strategy};
use serde_json::Value;

use crate::workflow::Workflow;

/// One node in a workflow graph: either a single component instance, or a
/// nested sub-workflow expanded in place at deployment time.
#[derive(Clone)]
pub enum Node {
    /// A component instantiation.
    Component {
        /// The component being instantiated.
        component: Arc<Component>,
        /// Instantiation arguments, passed to the `deploy` hook.
        args: Value,
        /// An optional strategy override, merged as the child over the
        /// component's own strategy (the parent) when this node deploys.
        strategy_override: Option<Strategy>,
    },
    /// A nested sub-workflow, flattened into the parent graph at deploy
    /// time with this node's id as a scoping prefix.
    Workflow {
        /// The nested workflow.
        workflow: Arc<Workflow>,
        /// Instantiation arguments passed down to the inner workflow.
        args: Value,
    },
}

impl Node {
    /// In-ports this node exposes to the link set.
    #[must_use]
    pub fn in_ports(&self) -> &[Port] {
        match self {
            Node::Component { component, .. } => component.in_ports(),
            Node::Workflow { workflow, .. } => workflow.in_ports(),
        }
    }

    /// Out-ports this node exposes to the link set.
    #[must_use]
    pub fn out_ports(&self) -> &[Port] {
        match self {
            Node::Component { component, .. } => component.out_ports(),
            Node::Workflow { workflow, .. } => workflow.out_ports(),
        }
    }

    /// `true` if this node is a nested sub-workflow.
    #[must_use]
    pub fn is_sub_workflow(&self) -> bool {
        matches!(self, Node::Workflow { .. })
    }
}

/// One endpoint of a link: either a node-scoped port, or one of the
/// workflow's own boundary ports.
///
/// The same variant (`Boundary`) is used for both link sources (the
/// workflow's in-ports, acting as sources) and link destinations (the
/// workflow's out-ports, acting as sinks); [`Workflow::validate`]
/// disambiguates by checking against `in_ports`/`out_ports` depending on
/// the endpoint's position in the link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// A port on an internal node.
    Internal {
        /// The node's id within the owning workflow.
        node: String,
        /// The port name on that node.
        port: Port,
    },
    /// One of the workflow's own external ports.
    Boundary {
        /// The port name.
        port: Port,
    },
}

impl Endpoint {
    /// Build an internal endpoint.
    pub fn internal(node: impl Into<String>, port: impl Into<Port>) -> Self {
        Self::Internal {
            node: node.into(),
            port: port.into(),
        }
    }

    /// Build a boundary endpoint.
    pub fn boundary(port: impl Into<Port>) -> Self {
        Self::Boundary { port: port.into() }
    }
}

/// One `(source, destination)` edge in a workflow's link set.
pub type Link = (Endpoint, Endpoint);
