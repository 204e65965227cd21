//! Argument surface: the `deploy | local | worker | master` modes and the
//! `start | start_iex | daemon | daemon_iex | remote | restart | stop |
//! pid` commands of the design document's external-interfaces section.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Start a Nebula Skitter node.
#[derive(Parser, Debug)]
#[command(name = "nebula", version, about = "Start a Nebula Skitter node")]
pub struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

impl Cli {
    /// Split the parsed mode subcommand into its kind plus the shared
    /// command/flags every mode carries.
    pub fn into_parts(self) -> (ModeKind, Command, Flags) {
        match self.mode {
            Mode::Deploy(invocation) => (ModeKind::Deploy, invocation.command, invocation.flags),
            Mode::Local(invocation) => (ModeKind::Local, invocation.command, invocation.flags),
            Mode::Worker(invocation) => (ModeKind::Worker, invocation.command, invocation.flags),
            Mode::Master(invocation) => (ModeKind::Master, invocation.command, invocation.flags),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// ssh-spawn the configured workers, then launch a local master.
    Deploy(ModeInvocation),
    /// Run one self-contained node acting as its own master and worker.
    Local(ModeInvocation),
    /// Run as a worker, accepting at most one master registration.
    Worker(ModeInvocation),
    /// Run as a master, connecting to its configured workers.
    Master(ModeInvocation),
}

/// Which mode was selected, with its data stripped off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    /// §6 `deploy`.
    Deploy,
    /// §6 `local`.
    Local,
    /// §6 `worker`.
    Worker,
    /// §6 `master`.
    Master,
}

impl ModeKind {
    /// Default node name used when neither `--name` nor `SKITTER_NAME` is set.
    #[must_use]
    pub fn default_name(self) -> &'static str {
        match self {
            ModeKind::Deploy => "deploy",
            ModeKind::Local => "local",
            ModeKind::Worker => "worker",
            ModeKind::Master => "master",
        }
    }
}

impl std::fmt::Display for ModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.default_name())
    }
}

#[derive(Args, Debug)]
struct ModeInvocation {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    flags: Flags,
}

/// A release-script style command, per §6.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the node in the foreground.
    Start,
    /// Start the node with an interactive shell attached.
    StartIex,
    /// Start the node detached, as a background daemon.
    Daemon,
    /// Start the node detached, with an interactive shell attached.
    DaemonIex,
    /// Attach a shell to an already-running daemon.
    Remote,
    /// Restart an already-running daemon.
    Restart,
    /// Stop an already-running daemon.
    Stop,
    /// Print the running daemon's OS process id.
    Pid,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Command::Start => "start",
            Command::StartIex => "start_iex",
            Command::Daemon => "daemon",
            Command::DaemonIex => "daemon_iex",
            Command::Remote => "remote",
            Command::Restart => "restart",
            Command::Stop => "stop",
            Command::Pid => "pid",
        };
        f.write_str(s)
    }
}

/// Flags shared by every mode, per §6.
#[derive(Args, Debug, Default, Clone)]
pub struct Flags {
    /// Distribution cookie, overriding `SKITTER_COOKIE`.
    #[arg(long)]
    pub cookie: Option<String>,
    /// Node name override, overriding `SKITTER_NAME`.
    #[arg(long)]
    pub name: Option<String>,
    /// Skip installing the tracing subscriber.
    #[arg(long)]
    pub no_log: bool,
    /// Terminate this worker when it detects its master has left.
    #[arg(long)]
    pub shutdown_with_master: bool,
    /// Change into this directory before starting.
    #[arg(long)]
    pub working_dir: Option<PathBuf>,
    /// File of newline-separated worker identities, merged with
    /// `SKITTER_MASTER_WORKERS` (master mode only).
    #[arg(long)]
    pub worker_file: Option<PathBuf>,
    /// Stop immediately after the connect handshake instead of running
    /// until interrupted.
    #[arg(long)]
    pub stop: bool,
}
