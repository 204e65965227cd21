#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Runtime
//!
//! The per-node worker runtime: §4.7 of the design document. A
//! [`NodeRuntime`] owns every worker spawned on one node, drains each
//! worker's mailbox, dispatches incoming messages to the deployed
//! component's strategy `receive` hook, and applies the `state:`/
//! `publish:` convention the hook's result follows.
//!
//! Deployment (`nebula-deploy`) spawns workers here; routing
//! (`nebula-router`) delivers to them. This crate knows nothing about
//! either — it only supervises the workers it is told to spawn.

mod lifecycle;
mod node_runtime;
mod receive;
mod worker_ref;

pub use lifecycle::{TransitionError, WorkerLifecycle};
pub use node_runtime::{
    NodeRuntime, PublishSink, DEFAULT_MAX_RESTARTS, DEFAULT_RESTART_WINDOW,
};
pub use receive::{ReceiveOutcome, parse_receive_outcome};
pub use worker_ref::{WorkerId, WorkerRef};
