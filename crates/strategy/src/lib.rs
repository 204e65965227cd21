#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Strategy
//!
//! The strategy engine: §4.3 of the design document. Merge composes
//! partial strategies into complete ones with child-wins precedence;
//! dispatch invokes a strategy's hook through `nebula-core`'s callback
//! invocation engine, packing the dispatch [`Context`] and hook payload
//! into one envelope value.
//!
//! The [`nebula_core::Strategy`] data type itself lives in `nebula-core`
//! (see that crate's `strategy` module doc) to avoid a dependency cycle
//! with [`nebula_core::Component`], which embeds a strategy by value.

mod context;
mod merge;

pub use context::{Context, HookEnvelope, dispatch};
pub use merge::{is_complete, merge, merge_chain, require_complete};
