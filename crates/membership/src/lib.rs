#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Membership
//!
//! Master-side cluster membership: §4.6 of the design document. [`Membership`]
//! owns the connected-worker map, drives the `connect` handshake (beacon
//! verify → master registration → monitor install → join notification),
//! and fans `node_join`/`node_leave` events out to subscribers.
//!
//! [`worker`] hosts the worker-side complement: accepting at most one
//! master registration and reacting to its departure.

mod connection_state;
mod events;
mod master;
mod worker;

pub use connection_state::ConnectionState;
pub use connection_state::TransitionError as ConnectionTransitionError;
pub use events::{LeaveReason, MembershipEvent};
pub use master::{ConnectError, Membership, NodeEntry, DEFAULT_MONITOR_INTERVAL};
pub use worker::{WorkerGuard, spawn_worker_node, spawn_worker_node_with_shutdown};
