//! Mode dispatch: turns a parsed [`Command`]/[`Flags`] pair into a
//! running node, per §6. `deploy`'s ssh-spawning and the daemon-control
//! commands (`start_iex`, `daemon`, `daemon_iex`, `remote`, `restart`,
//! `stop`, `pid`) are a release-script concern this binary does not
//! implement; it only defines the surface a shell launcher would target.

use std::process::ExitCode;
use std::sync::Arc;

use nebula_config::ClusterConfig;
use nebula_membership::Membership;
use nebula_runtime::NodeRuntime;
use nebula_transport::{Fabric, NodeId, Role};

use crate::cli::{Command, Flags, ModeKind};

/// Argument error: malformed flags or a request clap itself could not parse.
pub const EXIT_ARGUMENT_ERROR: u8 = 1;
/// Missing release files: a daemon-control command with nothing to
/// operate on, or an unreadable `--working-dir`/`--worker-file`.
pub const EXIT_MISSING_RELEASE_FILES: u8 = 2;

/// Run the selected mode/command to completion, returning the process
/// exit code.
pub async fn dispatch(mode: ModeKind, command: Command, flags: Flags) -> ExitCode {
    if let Some(dir) = &flags.working_dir {
        if let Err(err) = std::env::set_current_dir(dir) {
            eprintln!("nebula: --working-dir {}: {err}", dir.display());
            return ExitCode::from(EXIT_MISSING_RELEASE_FILES);
        }
    }

    if mode == ModeKind::Deploy {
        eprintln!(
            "nebula: `deploy` ssh-spawns workers and is a shell-launcher concern; this binary only implements local | worker | master"
        );
        return ExitCode::from(EXIT_MISSING_RELEASE_FILES);
    }

    if command != Command::Start {
        eprintln!("nebula: `{command}` requires a release's daemon control files, which this binary does not produce");
        return ExitCode::from(EXIT_MISSING_RELEASE_FILES);
    }

    let config = match ClusterConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("nebula: {err}");
            return ExitCode::from(EXIT_ARGUMENT_ERROR);
        }
    };

    let node_id = resolve_node_id(mode, &flags, &config);
    let cookie = flags.cookie.clone().unwrap_or_else(|| config.cookie.clone());
    let shutdown_with_master = flags.shutdown_with_master || config.worker_shutdown_with_master;

    let result = match mode {
        ModeKind::Local => run_local(node_id, cookie, shutdown_with_master, flags.stop).await,
        ModeKind::Worker => run_worker(node_id, cookie, shutdown_with_master, flags.stop).await,
        ModeKind::Master => run_master(node_id, cookie, &flags, &config, flags.stop).await,
        ModeKind::Deploy => unreachable!("handled above"),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("nebula: {err}");
            ExitCode::from(EXIT_MISSING_RELEASE_FILES)
        }
    }
}

fn resolve_node_id(mode: ModeKind, flags: &Flags, config: &ClusterConfig) -> NodeId {
    let name = flags
        .name
        .clone()
        .or_else(|| config.name.clone())
        .unwrap_or_else(|| mode.default_name().to_string());
    // The fabric this binary runs on is in-process (§9's open question on
    // the distributed messaging substrate); every node this single OS
    // process hosts shares one host label until that substrate is a real
    // socket transport.
    NodeId::new(name, "local")
}

/// A single node acting as both its own master and its own worker: the
/// `connect` handshake targets itself, per [`Membership::connect`]'s
/// single-node local-mode allowance.
async fn run_local(node_id: NodeId, cookie: String, shutdown_with_master: bool, stop_immediately: bool) -> nebula_error::Result<()> {
    let _span = nebula_log::node_span!(node_id).entered();
    let fabric = Arc::new(Fabric::new());
    let runtime = Arc::new(NodeRuntime::new(node_id.clone()));
    let guard = nebula_membership::spawn_worker_node_with_shutdown(&fabric, node_id.clone(), &cookie, Role::Worker, shutdown_with_master).await;

    let membership = Arc::new(Membership::new(Arc::clone(&fabric), node_id.clone(), cookie, false));
    membership
        .connect(&[node_id.clone()])
        .await
        .map_err(|err| nebula_error::Error::definition(err.to_string()))?;
    tracing::info!("local node connected to itself");

    if !stop_immediately {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            () = guard.wait_for_shutdown() => {}
        }
    }
    runtime.destroy_all();
    Ok(())
}

/// A worker node: answers the beacon and at most one `register_master`,
/// per §4.6's worker-side complement.
async fn run_worker(node_id: NodeId, cookie: String, shutdown_with_master: bool, stop_immediately: bool) -> nebula_error::Result<()> {
    let _span = nebula_log::node_span!(node_id).entered();
    let fabric = Arc::new(Fabric::new());
    let runtime = Arc::new(NodeRuntime::new(node_id.clone()));
    let guard = nebula_membership::spawn_worker_node_with_shutdown(&fabric, node_id.clone(), &cookie, Role::Worker, shutdown_with_master).await;
    tracing::info!("worker node listening for a master");

    if !stop_immediately {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            () = guard.wait_for_shutdown() => {}
        }
    }
    runtime.destroy_all();
    Ok(())
}

/// A master node: connects to its configured workers and disconnects
/// them on shutdown.
async fn run_master(node_id: NodeId, cookie: String, flags: &Flags, config: &ClusterConfig, stop_immediately: bool) -> nebula_error::Result<()> {
    let _span = nebula_log::node_span!(node_id).entered();
    let fabric = Arc::new(Fabric::new());

    let mut identities = config.master_workers.clone();
    if let Some(path) = &flags.worker_file {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| nebula_error::Error::definition(format!("--worker-file {}: {err}", path.display())))?;
        identities.extend(contents.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string));
    }
    let workers: Vec<NodeId> = identities
        .iter()
        .map(|identity| {
            let (name, host) = ClusterConfig::split_identity(identity);
            NodeId::new(name.unwrap_or(host), host)
        })
        .collect();

    let membership = Arc::new(Membership::new(Arc::clone(&fabric), node_id.clone(), cookie, true));
    if !workers.is_empty() {
        if let Err(err) = membership.connect(&workers).await {
            tracing::warn!(%err, "one or more configured workers failed to join at startup");
        }
    }

    if !stop_immediately {
        let _ = tokio::signal::ctrl_c().await;
    }
    for entry in membership.connected() {
        let _ = membership.disconnect(&entry.node).await;
    }
    Ok(())
}
