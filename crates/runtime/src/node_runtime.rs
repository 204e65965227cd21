//! The per-node worker runtime: supervised workers, mailboxes, and
//! strategy `receive` dispatch (§4.7). Each worker's
//! [`crate::WorkerLifecycle`] is tracked alongside its mailbox and
//! advanced at the points §4.10 names: `Ready` the instant its mailbox
//! opens (`prepare` already ran upstream), `Running` on its first
//! delivered message, `Draining` then `Stopped` on teardown.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use nebula_core::{Component, Port, Strategy, StateMap, create_empty_state};
use nebula_strategy::{Context, dispatch};
use nebula_core::Hook;
use nebula_transport::{DEFAULT_MAILBOX_CAPACITY, NodeId};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::lifecycle::WorkerLifecycle;
use crate::receive::parse_receive_outcome;
use crate::worker_ref::{WorkerId, WorkerRef};

/// Called after a message finishes processing, once per `(out_port,
/// values)` entry a `receive` hook published, in the order the hook
/// produced them.
pub type PublishSink = Arc<dyn Fn(&WorkerId, &Port, &[Value]) + Send + Sync>;

/// Default crash-restart budget: a worker that panics/errors more than
/// this many times inside `restart_window` is treated as unrecoverable
/// and stops rather than looping forever (§4.11's "escalate to the node
/// supervisor").
pub const DEFAULT_MAX_RESTARTS: u32 = 5;

/// Default window [`DEFAULT_MAX_RESTARTS`] is measured over.
pub const DEFAULT_RESTART_WINDOW: Duration = Duration::from_secs(10);

struct WorkerHandle {
    tx: mpsc::Sender<Value>,
    state: Arc<Mutex<StateMap>>,
    tag: String,
    task: JoinHandle<()>,
    lifecycle: Arc<Mutex<WorkerLifecycle>>,
}

/// A node-local supervisor owning every worker spawned on this node.
///
/// One `NodeRuntime` models one node's worker pool: `deploy` hooks spawn
/// workers on it (via [`NodeRuntime::spawn_worker`]), the router delivers
/// messages to them (via [`NodeRuntime::deliver`]), and `drop_deployment`
/// tears them down (via [`NodeRuntime::destroy_worker`]).
pub struct NodeRuntime {
    node: NodeId,
    workers: DashMap<WorkerId, WorkerHandle>,
    next_id: AtomicU64,
    max_restarts: u32,
    restart_window: Duration,
}

impl NodeRuntime {
    /// Build an empty runtime for `node`.
    #[must_use]
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            workers: DashMap::new(),
            next_id: AtomicU64::new(0),
            max_restarts: DEFAULT_MAX_RESTARTS,
            restart_window: DEFAULT_RESTART_WINDOW,
        }
    }

    /// Override the crash-restart budget.
    #[must_use]
    pub fn with_supervision(mut self, max_restarts: u32, restart_window: Duration) -> Self {
        self.max_restarts = max_restarts;
        self.restart_window = restart_window;
        self
    }

    /// This runtime's node id.
    #[must_use]
    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// Generate a fresh worker id scoped to this node (`component-name/N`).
    #[must_use]
    pub fn fresh_worker_id(&self, component_hint: &str) -> WorkerId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        WorkerId::new(format!("{component_hint}-{n}"))
    }

    /// Spawn a worker: a task draining a fresh mailbox, dispatching each
    /// message to `strategy`'s `receive` hook and applying its
    /// `state:`/`publish:` result (§4.7).
    pub fn spawn_worker(
        &self,
        worker_id: WorkerId,
        component: Arc<Component>,
        strategy: Arc<Strategy>,
        deployment_data: Value,
        tag: impl Into<String>,
        on_publish: Option<PublishSink>,
    ) -> WorkerRef {
        let tag = tag.into();
        let (tx, rx) = mpsc::channel(DEFAULT_MAILBOX_CAPACITY);
        let state = Arc::new(Mutex::new(create_empty_state(&component)));
        // `prepare` has already run by the time `deploy` hands us a worker
        // to spawn, so the worker is `Ready` the instant its mailbox opens.
        let lifecycle = Arc::new(Mutex::new(
            WorkerLifecycle::Spawned.transition(WorkerLifecycle::Ready).expect("spawned -> ready is always valid"),
        ));

        let task = tokio::spawn(run_worker(
            component,
            strategy,
            deployment_data,
            Arc::clone(&state),
            Arc::clone(&lifecycle),
            tag.clone(),
            on_publish,
            worker_id.clone(),
            rx,
            self.max_restarts,
            self.restart_window,
        ));

        self.workers.insert(worker_id.clone(), WorkerHandle { tx, state, tag, task, lifecycle });
        WorkerRef::new(self.node.clone(), worker_id)
    }

    /// Deliver `message` to `worker_id`'s mailbox.
    ///
    /// # Errors
    /// Returns [`nebula_error::Error::WorkerCrash`] if the worker does not
    /// exist or its mailbox has been closed (the supervisor gave up after
    /// repeated crashes).
    pub async fn deliver(&self, worker_id: &WorkerId, message: Value) -> nebula_error::Result<()> {
        let tx = self
            .workers
            .get(worker_id)
            .map(|entry| entry.tx.clone())
            .ok_or_else(|| nebula_error::Error::WorkerCrash {
                worker_ref: worker_id.to_string(),
                reason: "no such worker".to_string(),
            })?;
        tx.send(message).await.map_err(|_| nebula_error::Error::WorkerCrash {
            worker_ref: worker_id.to_string(),
            reason: "mailbox closed".to_string(),
        })
    }

    /// A snapshot of `worker_id`'s current state, or `None` if it does not
    /// exist.
    #[must_use]
    pub fn worker_state(&self, worker_id: &WorkerId) -> Option<StateMap> {
        self.workers.get(worker_id).map(|entry| entry.state.lock().clone())
    }

    /// `worker_id`'s tag, or `None` if it does not exist.
    #[must_use]
    pub fn worker_tag(&self, worker_id: &WorkerId) -> Option<String> {
        self.workers.get(worker_id).map(|entry| entry.tag.clone())
    }

    /// `worker_id`'s current lifecycle state, or `None` if it does not
    /// exist. A worker removed by [`NodeRuntime::destroy_worker`] no
    /// longer has an observable state (its terminal `Stopped` transition
    /// happens just before removal).
    #[must_use]
    pub fn worker_lifecycle(&self, worker_id: &WorkerId) -> Option<WorkerLifecycle> {
        self.workers.get(worker_id).map(|entry| *entry.lifecycle.lock())
    }

    /// Number of workers currently registered on this node (including any
    /// whose task has since stopped after exhausting its restart budget).
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// `true` if `worker_id` is registered and its task has not stopped.
    #[must_use]
    pub fn is_alive(&self, worker_id: &WorkerId) -> bool {
        self.workers.get(worker_id).is_some_and(|entry| !entry.task.is_finished())
    }

    /// Tear down one worker: abort its task and remove its mailbox.
    pub fn destroy_worker(&self, worker_id: &WorkerId) {
        if let Some((_, handle)) = self.workers.remove(worker_id) {
            drain_to_stopped(&handle.lifecycle);
            handle.task.abort();
        }
    }

    /// Tear down every worker on this node.
    pub fn destroy_all(&self) {
        for entry in self.workers.iter() {
            entry.value().task.abort();
        }
        self.workers.clear();
    }
}

/// Move `lifecycle` to `Stopped`, tolerating whichever of `Ready` or
/// `Running` it was last observed in.
fn drain_to_stopped(lifecycle: &Arc<Mutex<WorkerLifecycle>>) {
    let mut guard = lifecycle.lock();
    if let Ok(next) = guard.transition(WorkerLifecycle::Draining) {
        *guard = next;
    }
    if let Ok(next) = guard.transition(WorkerLifecycle::Stopped) {
        *guard = next;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_worker(
    component: Arc<Component>,
    strategy: Arc<Strategy>,
    deployment_data: Value,
    state: Arc<Mutex<StateMap>>,
    lifecycle: Arc<Mutex<WorkerLifecycle>>,
    tag: String,
    on_publish: Option<PublishSink>,
    worker_id: WorkerId,
    mut rx: mpsc::Receiver<Value>,
    max_restarts: u32,
    restart_window: Duration,
) {
    let mut crash_times: VecDeque<Instant> = VecDeque::new();

    while let Some(message) = rx.recv().await {
        {
            let mut guard = lifecycle.lock();
            if let Ok(next) = guard.transition(WorkerLifecycle::Running) {
                *guard = next;
            }
        }
        let current_state = state.lock().clone();
        let ctx = Context::with_invocation(
            Arc::clone(&component),
            Arc::clone(&strategy),
            deployment_data.clone(),
            json!({ "tag": tag }),
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            dispatch(&ctx, Hook::Receive, &current_state, message.clone())
        }));

        match outcome {
            Ok(Ok(result)) => {
                let parsed = parse_receive_outcome(&result.result);
                if let Some(new_state) = parsed.state {
                    *state.lock() = new_state;
                }
                if let Some(sink) = &on_publish {
                    for (port, values) in &parsed.publish {
                        sink(&worker_id, port, values);
                    }
                }
            }
            Ok(Err(err)) => {
                tracing::warn!(worker = %worker_id, %err, "receive dispatch failed");
                if !record_crash_and_check_budget(&mut crash_times, max_restarts, restart_window) {
                    tracing::error!(worker = %worker_id, "restart budget exhausted, stopping worker");
                    return;
                }
                *state.lock() = create_empty_state(&component);
            }
            Err(_) => {
                tracing::warn!(worker = %worker_id, "receive hook panicked");
                if !record_crash_and_check_budget(&mut crash_times, max_restarts, restart_window) {
                    tracing::error!(worker = %worker_id, "restart budget exhausted, stopping worker");
                    return;
                }
                *state.lock() = create_empty_state(&component);
            }
        }
    }
}

/// Record one crash, pruning entries outside `window`. Returns `true` if
/// the worker is still within its restart budget.
fn record_crash_and_check_budget(crash_times: &mut VecDeque<Instant>, max_restarts: u32, window: Duration) -> bool {
    let now = Instant::now();
    crash_times.push_back(now);
    while let Some(&front) = crash_times.front() {
        if now.duration_since(front) > window {
            crash_times.pop_front();
        } else {
            break;
        }
    }
    crash_times.len() as u32 <= max_restarts
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap as Map;
    use nebula_core::{Callback, Hook as CoreHook, StateCapability};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration as StdDuration;

    fn logging_component_and_strategy(log: Arc<StdMutex<Vec<Value>>>) -> (Arc<Component>, Arc<Strategy>) {
        let component = Arc::new(
            Component::new(
                Some("Logger".into()),
                vec![],
                vec![Port::new("in")],
                vec![],
                Map::new(),
                Strategy::empty(),
            )
            .unwrap(),
        );

        let receive = Callback::new(
            move |_env, args| {
                let message = args.get("payload").cloned().unwrap_or(Value::Null);
                log.lock().unwrap().push(message);
                json!({})
            },
            [] as [String; 0],
            [] as [String; 0],
            [] as [Port; 0],
            StateCapability::None,
            false,
        );

        let noop = || {
            Callback::new(
                |_env, _args| json!({}),
                [] as [String; 0],
                [] as [String; 0],
                [] as [Port; 0],
                StateCapability::None,
                false,
            )
        };

        let mut strategy = Strategy::empty();
        for hook in CoreHook::ALL {
            strategy = strategy.with_hook(hook, Some(noop()));
        }
        strategy = strategy.with_hook(Hook::Receive, Some(receive));

        (component, Arc::new(strategy))
    }

    #[tokio::test]
    async fn delivers_messages_to_one_worker_in_fifo_order() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let (component, strategy) = logging_component_and_strategy(Arc::clone(&log));

        let runtime = NodeRuntime::new(NodeId::new("node-a", "host-a"));
        let worker_id = runtime.fresh_worker_id("logger");
        runtime.spawn_worker(worker_id.clone(), component, strategy, Value::Null, "logger", None);

        for n in 1..=5 {
            runtime.deliver(&worker_id, json!(n)).await.unwrap();
        }

        // Give the draining task a chance to process every message.
        for _ in 0..50 {
            if log.lock().unwrap().len() == 5 {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }

        let observed: Vec<Value> = log.lock().unwrap().clone();
        assert_eq!(observed, vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
    }

    #[tokio::test]
    async fn worker_lifecycle_progresses_from_ready_through_running_to_gone() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let (component, strategy) = logging_component_and_strategy(Arc::clone(&log));

        let runtime = NodeRuntime::new(NodeId::new("node-a", "host-a"));
        let worker_id = runtime.fresh_worker_id("logger");
        runtime.spawn_worker(worker_id.clone(), component, strategy, Value::Null, "logger", None);
        assert_eq!(runtime.worker_lifecycle(&worker_id), Some(WorkerLifecycle::Ready));

        runtime.deliver(&worker_id, json!(1)).await.unwrap();
        for _ in 0..50 {
            if runtime.worker_lifecycle(&worker_id) == Some(WorkerLifecycle::Running) {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert_eq!(runtime.worker_lifecycle(&worker_id), Some(WorkerLifecycle::Running));

        runtime.destroy_worker(&worker_id);
        assert_eq!(runtime.worker_lifecycle(&worker_id), None);
    }

    #[tokio::test]
    async fn delivering_to_unknown_worker_fails() {
        let runtime = NodeRuntime::new(NodeId::new("node-a", "host-a"));
        let err = runtime.deliver(&WorkerId::new("ghost"), json!(1)).await.unwrap_err();
        assert!(matches!(err, nebula_error::Error::WorkerCrash { .. }));
    }

    #[tokio::test]
    async fn destroy_worker_removes_it_and_stops_delivery() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let (component, strategy) = logging_component_and_strategy(log);

        let runtime = NodeRuntime::new(NodeId::new("node-a", "host-a"));
        let worker_id = runtime.fresh_worker_id("logger");
        runtime.spawn_worker(worker_id.clone(), component, strategy, Value::Null, "logger", None);
        assert_eq!(runtime.worker_count(), 1);

        runtime.destroy_worker(&worker_id);
        assert_eq!(runtime.worker_count(), 0);

        let err = runtime.deliver(&worker_id, json!(1)).await.unwrap_err();
        assert!(matches!(err, nebula_error::Error::WorkerCrash { .. }));
    }

    #[tokio::test]
    async fn publish_sink_receives_published_values_in_order() {
        let published = Arc::new(StdMutex::new(Vec::new()));
        let sink_published = Arc::clone(&published);

        let component = Arc::new(
            Component::new(
                Some("Doubler".into()),
                vec![],
                vec![Port::new("in")],
                vec![Port::new("out")],
                Map::new(),
                Strategy::empty(),
            )
            .unwrap(),
        );

        let receive = Callback::new(
            |_env, args| {
                let n = args.get("payload").and_then(Value::as_i64).unwrap_or(0);
                json!({ "publish": { "out": [n * 2] } })
            },
            [] as [String; 0],
            [] as [String; 0],
            [] as [Port; 0],
            StateCapability::None,
            false,
        );
        let mut strategy = Strategy::empty();
        for hook in CoreHook::ALL {
            strategy = strategy.with_hook(
                hook,
                Some(Callback::new(
                    |_env, _args| json!({}),
                    [] as [String; 0],
                    [] as [String; 0],
                    [] as [Port; 0],
                    StateCapability::None,
                    false,
                )),
            );
        }
        strategy = strategy.with_hook(Hook::Receive, Some(receive));

        let runtime = NodeRuntime::new(NodeId::new("node-a", "host-a"));
        let worker_id = runtime.fresh_worker_id("doubler");
        let sink: PublishSink = Arc::new(move |_worker, _port, values| {
            sink_published.lock().unwrap().extend_from_slice(values);
        });
        runtime.spawn_worker(worker_id.clone(), component, Arc::new(strategy), Value::Null, "doubler", Some(sink));

        runtime.deliver(&worker_id, json!(21)).await.unwrap();

        for _ in 0..50 {
            if !published.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }

        assert_eq!(published.lock().unwrap().clone(), vec![json!(42)]);
    }
}
