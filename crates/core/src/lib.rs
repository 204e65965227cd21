#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Core
//!
//! The component/callback data model and invocation engine: §3 and §4.2 of
//! the design document. This crate also hosts the [`Strategy`] data type
//! (see [`strategy`] for why it lives here rather than in `nebula-strategy`)
//! since [`Component`] embeds one directly.
//!
//! Everything here is pure data plus the single `call`/`invoke` entry point;
//! the strategy *engine* (merge, completeness, hook dispatch) is
//! `nebula-strategy`, and deployment/routing/transport build on top of both.

mod callback;
mod component;
mod port;
mod strategy;

pub use callback::{Callback, CallbackResult, InvocationEnv, StateCapability, StateMap, invoke};
pub use component::{Component, call, create_empty_state};
pub use port::Port;
pub use strategy::{Hook, Strategy};
