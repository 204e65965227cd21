#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nebula Config
//!
//! Environment-driven configuration for the Skitter cluster, per the
//! "Configuration (environment-driven)" section of the design document:
//!
//! - `master.workers` — worker node identities to connect at start.
//! - `worker.master` — optional master node identity to contact at start.
//! - `worker.shutdown_with_master` — terminate this worker if its master
//!   leaves the cluster.
//! - a distribution cookie (shared handshake secret).
//! - an optional node name override.
//!
//! Layering follows the teacher's CLI crate convention (`figment`):
//! built-in defaults, then environment variables, with env taking
//! precedence. A CLI front-end may layer flag-sourced values over this
//! in turn — that belongs to the CLI surface, not to this crate.

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

/// A node identity as written in configuration: `"name@host"`, or just
/// `"host"` when no name is given.
pub type NodeIdentity = String;

/// Parsed cluster configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Worker node identities the master should connect to at start.
    #[serde(default)]
    pub master_workers: Vec<NodeIdentity>,

    /// Master node identity this worker should contact at start.
    #[serde(default)]
    pub worker_master: Option<NodeIdentity>,

    /// If true, a worker terminates when it detects its master has left.
    #[serde(default)]
    pub worker_shutdown_with_master: bool,

    /// Shared secret presented during the beacon handshake.
    #[serde(default = "default_cookie")]
    pub cookie: String,

    /// Optional override for this process's own node name.
    #[serde(default)]
    pub name: Option<String>,
}

fn default_cookie() -> String {
    "skitter".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            master_workers: Vec::new(),
            worker_master: None,
            worker_shutdown_with_master: false,
            cookie: default_cookie(),
            name: None,
        }
    }
}

impl ClusterConfig {
    /// Load configuration from environment variables, layered over
    /// defaults:
    ///
    /// - `SKITTER_MASTER_WORKERS` — space-separated node identities.
    /// - `SKITTER_WORKER_MASTER` — single node identity.
    /// - `SKITTER_WORKER_SHUTDOWN_WITH_MASTER` — `"true"`/`"false"`.
    /// - `SKITTER_COOKIE` — shared secret.
    /// - `SKITTER_NAME` — node name override.
    ///
    /// # Errors
    /// Returns a `definition` error if an environment variable is present
    /// but cannot be parsed into its expected shape (e.g. a non-boolean
    /// value for `SKITTER_WORKER_SHUTDOWN_WITH_MASTER`).
    pub fn from_env() -> nebula_error::Result<Self> {
        Self::from_env_with(std::env::var("SKITTER_MASTER_WORKERS").ok())
    }

    /// [`Self::from_env`]'s body, parameterized over the raw
    /// `SKITTER_MASTER_WORKERS` value so the space-separated-parsing path
    /// is testable without mutating the process environment.
    fn from_env_with(master_workers_raw: Option<String>) -> nebula_error::Result<Self> {
        // `master.workers` is space-separated per the design document, but
        // figment's `Env` provider treats env values as opaque scalars, so
        // we split it ourselves before handing it to figment as a list.
        let mut defaults = Self::default();
        if let Some(raw) = &master_workers_raw {
            defaults.master_workers = raw.split_whitespace().map(str::to_string).collect();
        }

        // `SKITTER_MASTER_WORKERS` is already split into `defaults` above;
        // excluding it from the `Env` merge keeps that split list from being
        // clobbered by figment re-reading the same variable as one opaque
        // scalar (which `extract()` then fails to deserialize as a list).
        let figment = Figment::new()
            .merge(Serialized::defaults(defaults))
            .merge(Env::prefixed("SKITTER_").ignore(&["master_workers"]));

        figment
            .extract()
            .map_err(|e| nebula_error::Error::definition(format!("config: {e}")))
    }

    /// Split a `"name@host"` identity into `(name, host)`. If no `@` is
    /// present, the whole string is treated as the host with no name.
    #[must_use]
    pub fn split_identity(identity: &str) -> (Option<&str>, &str) {
        match identity.split_once('@') {
            Some((name, host)) => (Some(name), host),
            None => (None, identity),
        }
    }
}
