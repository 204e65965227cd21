#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Transport
//!
//! The remote transport layer: §4.5 of the design document. Four services
//! over one in-process message fabric ([`Fabric`]):
//!
//! - [`Beacon`] / [`verify`]: the handshake every node answers.
//! - [`Dispatcher`]: routes typed requests ([`WireTag`]) to registered
//!   [`Handler`]s.
//! - [`TaskBroker`]: run a closure on one worker or on every worker,
//!   collecting results under a deadline.
//! - [`LoadBalancer`]: pick a worker node, either stably (`select_permanent`)
//!   or round-robin (`select_transient`).

mod beacon;
mod dispatcher;
mod fabric;
mod load_balancer;
mod node_id;
mod task_broker;
mod wire;

pub use beacon::{Beacon, VerifyOutcome, verify};
pub use dispatcher::{Dispatcher, Handler};
pub use fabric::{Envelope, Fabric, Payload, Task, DEFAULT_MAILBOX_CAPACITY};
pub use load_balancer::{LoadBalancer, SharedLoadBalancer};
pub use node_id::{NodeId, Role};
pub use task_broker::{TaskBroker, TaskOutcome};
pub use wire::WireTag;
