//! Strategies: a bundle of optional hooks governing how a component is
//! materialized, dispatched to, and torn down.
//!
//! This type lives in `nebula-core` (rather than `nebula-strategy`, despite
//! the design document's module table naming a separate "strategy engine")
//! because [`Component`](crate::Component) embeds a `Strategy` by value —
//! putting the data type in the strategy-engine crate would make `nebula-core`
//! depend on `nebula-strategy` for the field type while `nebula-strategy`'s
//! merge/dispatch logic needs `Callback` from `nebula-core`, an unworkable
//! cycle. `nebula-strategy` owns the *engine* (merge, completeness,
//! dispatch); this module owns the *data*.

use serde::{Deserialize, Serialize};

use crate::callback::Callback;

/// Which of a [`Strategy`]'s hooks is being referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    /// Defines/validates a component instantiation's arguments.
    Define,
    /// Materializes the component on one or more workers.
    Deploy,
    /// Receives routing-table fragments once the whole workflow is deployed.
    Prepare,
    /// Chooses a destination worker and dispatches an outgoing message.
    Send,
    /// Processes one incoming message on a worker.
    Receive,
    /// Tears down a deployment.
    DropDeployment,
    /// Tears down a single in-flight invocation (drain).
    DropInvocation,
}

impl Hook {
    /// All seven hooks, in the order [`Strategy::is_complete`] checks them.
    pub const ALL: [Hook; 7] = [
        Hook::Define,
        Hook::Deploy,
        Hook::Prepare,
        Hook::Send,
        Hook::Receive,
        Hook::DropDeployment,
        Hook::DropInvocation,
    ];

    /// The snake_case name used in `strategy_incomplete` error messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Hook::Define => "define",
            Hook::Deploy => "deploy",
            Hook::Prepare => "prepare",
            Hook::Send => "send",
            Hook::Receive => "receive",
            Hook::DropDeployment => "drop_deployment",
            Hook::DropInvocation => "drop_invocation",
        }
    }
}

/// A bundle of optional hooks, composable via merge (see `nebula-strategy`).
#[derive(Debug, Clone, Default)]
pub struct Strategy {
    name: Option<String>,
    define: Option<Callback>,
    deploy: Option<Callback>,
    prepare: Option<Callback>,
    send: Option<Callback>,
    receive: Option<Callback>,
    drop_deployment: Option<Callback>,
    drop_invocation: Option<Callback>,
}

impl Strategy {
    /// A strategy with every hook `None` (the merge identity).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a strategy from an explicit name and hook set.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: Option<String>,
        define: Option<Callback>,
        deploy: Option<Callback>,
        prepare: Option<Callback>,
        send: Option<Callback>,
        receive: Option<Callback>,
        drop_deployment: Option<Callback>,
        drop_invocation: Option<Callback>,
    ) -> Self {
        Self {
            name,
            define,
            deploy,
            prepare,
            send,
            receive,
            drop_deployment,
            drop_invocation,
        }
    }

    /// This strategy's registry name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set (or clear) this strategy's name, returning the updated value.
    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Fetch one hook by kind.
    #[must_use]
    pub fn hook(&self, kind: Hook) -> Option<&Callback> {
        match kind {
            Hook::Define => self.define.as_ref(),
            Hook::Deploy => self.deploy.as_ref(),
            Hook::Prepare => self.prepare.as_ref(),
            Hook::Send => self.send.as_ref(),
            Hook::Receive => self.receive.as_ref(),
            Hook::DropDeployment => self.drop_deployment.as_ref(),
            Hook::DropInvocation => self.drop_invocation.as_ref(),
        }
    }

    /// Replace one hook by kind, returning the updated value.
    #[must_use]
    pub fn with_hook(mut self, kind: Hook, callback: Option<Callback>) -> Self {
        match kind {
            Hook::Define => self.define = callback,
            Hook::Deploy => self.deploy = callback,
            Hook::Prepare => self.prepare = callback,
            Hook::Send => self.send = callback,
            Hook::Receive => self.receive = callback,
            Hook::DropDeployment => self.drop_deployment = callback,
            Hook::DropInvocation => self.drop_invocation = callback,
        }
        self
    }

    /// `true` iff every hook is `Some`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        Hook::ALL.iter().all(|h| self.hook(*h).is_some())
    }

    /// The first missing hook, in `Hook::ALL` order, or `None` if complete.
    #[must_use]
    pub fn first_missing_hook(&self) -> Option<Hook> {
        Hook::ALL.into_iter().find(|h| self.hook(*h).is_none())
    }
}

impl nebula_registry::Named for Strategy {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
