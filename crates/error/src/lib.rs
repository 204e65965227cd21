#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Error
//!
//! Shared error type for the Nebula Skitter distributed workflow runtime.
//!
//! Every crate in the workspace returns [`Error`] (aliased as [`Result`])
//! instead of defining its own error enum. This keeps error kinds —
//! `definition_error`, `unknown_name`, `strategy_incomplete`, membership
//! failures, deployment failures, and so on — centralized in one place
//! that the master, the worker runtime, and the deployment engine can all
//! match on without crate-to-crate conversions.

use std::fmt;

/// Opaque worker handle identifier, used only for error reporting.
///
/// Kept as a plain string here (rather than depending on `nebula-runtime`'s
/// `WorkerRef`) so this crate stays a dependency leaf.
pub type WorkerRefId = String;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// The complete set of error kinds raised anywhere in the runtime.
///
/// Variants correspond 1:1 to the error kinds enumerated in the design
/// document's "Error Handling Design" section.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An invalid component or workflow description, raised at construction
    /// time (before deployment).
    #[error("definition error: {0}")]
    Definition(String),

    /// `Registry::get` was called with a name that has no binding.
    #[error("unknown name: {0}")]
    UnknownName(String),

    /// `call` referenced a callback name the component does not declare.
    #[error("no such callback: {0}")]
    NoSuchCallback(String),

    /// A strategy with at least one `null` hook was used where completeness
    /// is required (deployment time).
    #[error("strategy incomplete: missing hook `{missing_hook}`")]
    StrategyIncomplete {
        /// Name of the first hook found to be missing.
        missing_hook: String,
    },

    /// `connect` was attempted on a node that is not distribution-enabled.
    #[error("not distributed")]
    NotDistributed,

    /// A network connection to a node could not be established.
    #[error("not connected: {0}")]
    NotConnected(String),

    /// A worker already has a registered master and refused a second one.
    #[error("already connected: {0}")]
    AlreadyConnected(String),

    /// The beacon handshake succeeded but the remote node is not a worker
    /// (or is not reachable/is not running compatible software).
    #[error("no skitter worker at: {0}")]
    NoSkitterWorker(String),

    /// The beacon handshake's cookie did not match.
    #[error("wrong cookie: {0}")]
    WrongCookie(String),

    /// A remote call did not complete before its deadline.
    #[error("timeout waiting for: {0}")]
    Timeout(String),

    /// A worker process crashed; the supervisor will restart it with a
    /// fresh empty state.
    #[error("worker crash: {worker_ref} ({reason})")]
    WorkerCrash {
        /// The worker that crashed.
        worker_ref: WorkerRefId,
        /// Human-readable crash reason.
        reason: String,
    },

    /// A deployment partially succeeded: some components/nodes deployed,
    /// others failed.
    #[error("deployment partial: {} succeeded, {} failed", successes.len(), failures.len())]
    DeploymentPartial {
        /// Identifiers of components/nodes that deployed successfully.
        successes: Vec<String>,
        /// `(identifier, reason)` pairs for components/nodes that failed.
        failures: Vec<(String, String)>,
    },
}

impl Error {
    /// Shorthand for [`Error::Definition`].
    pub fn definition(msg: impl Into<String>) -> Self {
        Self::Definition(msg.into())
    }

    /// Shorthand for [`Error::UnknownName`].
    pub fn unknown_name(name: impl Into<String>) -> Self {
        Self::UnknownName(name.into())
    }

    /// Shorthand for [`Error::NoSuchCallback`].
    pub fn no_such_callback(name: impl Into<String>) -> Self {
        Self::NoSuchCallback(name.into())
    }

    /// Shorthand for [`Error::StrategyIncomplete`].
    pub fn strategy_incomplete(missing_hook: impl Into<String>) -> Self {
        Self::StrategyIncomplete {
            missing_hook: missing_hook.into(),
        }
    }

    /// Returns `true` for errors that represent a single node's failure
    /// within a larger aggregate operation (`connect`, `on_all`), as
    /// opposed to whole-operation failures.
    #[must_use]
    pub fn is_per_node(&self) -> bool {
        matches!(
            self,
            Self::NotConnected(_)
                | Self::AlreadyConnected(_)
                | Self::NoSkitterWorker(_)
                | Self::WrongCookie(_)
                | Self::Timeout(_)
        )
    }
}

/// A `(node, error)` pair used by `connect`/`on_all` to report a single
/// target's outcome inside an aggregate result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    /// The node the operation targeted.
    pub node: String,
    /// Short machine-readable reason, matching the `Error` variant name
    /// (e.g. `"not_connected"`, `"no_skitter_worker"`).
    pub reason: &'static str,
}

impl NodeFailure {
    /// Build a `NodeFailure` from an `Error`, returning `None` if the error
    /// is not a per-node kind.
    #[must_use]
    pub fn from_error(node: impl Into<String>, err: &Error) -> Option<Self> {
        let reason = match err {
            Error::NotConnected(_) => "not_connected",
            Error::AlreadyConnected(_) => "already_connected",
            Error::NoSkitterWorker(_) => "no_skitter_worker",
            Error::WrongCookie(_) => "wrong_cookie",
            Error::Timeout(_) => "timeout",
            _ => return None,
        };
        Some(Self {
            node: node.into(),
            reason,
        })
    }
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.node)
    }
}
