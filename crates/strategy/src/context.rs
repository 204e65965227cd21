//! Hook dispatch: invoking a strategy hook with its `Context` argument.

use std::sync::Arc;

use nebula_core::{Component, Hook, Strategy};
use serde::Serialize;
use serde_json::Value;

use crate::merge::require_complete;

/// The `(component_ref, strategy_ref, deployment_data_or_null,
/// invocation_data_or_null)` tuple passed to every hook invocation.
///
/// `component`/`strategy` are `Arc`-wrapped since a `Context` is built once
/// per dispatch and handed to potentially many hook calls (e.g. `send` is
/// invoked once per published value).
#[derive(Clone)]
pub struct Context {
    /// The component this hook is being invoked on behalf of.
    pub component: Arc<Component>,
    /// That component's (already-resolved, already-complete) strategy.
    pub strategy: Arc<Strategy>,
    /// Deployment-time data, available once a component has been deployed.
    pub deployment_data: Option<Value>,
    /// Per-invocation data, available only to hooks invoked as part of
    /// processing one message/call (`send`, `receive`).
    pub invocation_data: Option<Value>,
}

impl Context {
    /// Build a context for a hook invoked before deployment data exists
    /// (`deploy` itself).
    #[must_use]
    pub fn pre_deployment(component: Arc<Component>, strategy: Arc<Strategy>) -> Self {
        Self {
            component,
            strategy,
            deployment_data: None,
            invocation_data: None,
        }
    }

    /// Build a context carrying deployment data but no per-invocation data
    /// (`prepare`, `drop_deployment`).
    #[must_use]
    pub fn with_deployment(
        component: Arc<Component>,
        strategy: Arc<Strategy>,
        deployment_data: Value,
    ) -> Self {
        Self {
            component,
            strategy,
            deployment_data: Some(deployment_data),
            invocation_data: None,
        }
    }

    /// Build a context carrying both deployment and per-invocation data
    /// (`send`, `receive`, `drop_invocation`).
    #[must_use]
    pub fn with_invocation(
        component: Arc<Component>,
        strategy: Arc<Strategy>,
        deployment_data: Value,
        invocation_data: Value,
    ) -> Self {
        Self {
            component,
            strategy,
            deployment_data: Some(deployment_data),
            invocation_data: Some(invocation_data),
        }
    }
}

/// A serializable envelope a hook body can deserialize: the dispatch
/// [`Context`] (minus the non-serializable component/strategy handles,
/// represented here by name) alongside the hook-specific payload.
///
/// `Callback` bodies are defined generically over `(InvocationEnv, Value)`
/// in `nebula-core`, with no knowledge of `Context` — packing both into one
/// envelope value lets a hook body recover the dispatch context via
/// `serde_json` without `nebula-core` depending on this crate.
#[derive(Debug, Clone, Serialize)]
pub struct HookEnvelope {
    /// Name of the component the hook runs for, if any.
    pub component_name: Option<String>,
    /// Name of the strategy being dispatched, if any.
    pub strategy_name: Option<String>,
    /// Deployment data, serialized as-is.
    pub deployment_data: Value,
    /// Invocation data, serialized as-is.
    pub invocation_data: Value,
    /// The hook-specific payload (e.g. `deploy`'s node args, `receive`'s
    /// message).
    pub payload: Value,
}

impl HookEnvelope {
    fn from_context(ctx: &Context, payload: Value) -> Self {
        Self {
            component_name: ctx.component.name().map(str::to_string),
            strategy_name: ctx.strategy.name().map(str::to_string),
            deployment_data: ctx.deployment_data.clone().unwrap_or(Value::Null),
            invocation_data: ctx.invocation_data.clone().unwrap_or(Value::Null),
            payload,
        }
    }
}

/// Invoke hook `kind` on `ctx.strategy` with `state` and `payload`.
///
/// The strategy must be complete (checked here, not assumed); `payload` is
/// packed into a [`HookEnvelope`] alongside the context before being handed
/// to the callback invocation engine.
///
/// # Errors
/// Returns [`nebula_error::Error::StrategyIncomplete`] if `ctx.strategy` is
/// missing any hook.
pub fn dispatch(
    ctx: &Context,
    kind: Hook,
    state: &nebula_core::StateMap,
    payload: Value,
) -> nebula_error::Result<nebula_core::CallbackResult> {
    require_complete(&ctx.strategy)?;
    let callback = ctx
        .strategy
        .hook(kind)
        .expect("require_complete checked every hook is Some above");
    let envelope = HookEnvelope::from_context(ctx, payload);
    let envelope_value =
        serde_json::to_value(envelope).unwrap_or(Value::Null);
    Ok(nebula_core::invoke(callback, state, envelope_value))
}
