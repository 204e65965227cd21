#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Deploy
//!
//! The deployment engine: §4.8 of the design document. [`deploy`]
//! flattens a [`nebula_workflow::Workflow`]'s nested sub-workflows into
//! one graph of component instances, resolves each instance's strategy,
//! invokes `deploy` and `prepare` on every component, and returns a
//! [`DeployedWorkflow`] the router can dispatch against. [`destroy`]
//! tears one down.

mod engine;
mod flatten;
mod routing_table;

pub use engine::{DeployedComponent, DeployedWorkflow, deploy, destroy};
pub use flatten::{FlatEndpoint, FlatNode, FlattenResult, flatten};
pub use routing_table::{RoutingFragment, RoutingTable, fragment_from_value, fragment_to_value};
