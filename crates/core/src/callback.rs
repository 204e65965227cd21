//! Callbacks: pure descriptions of a component's or strategy's user logic,
//! and the invocation environment that enforces their declared
//! read/write/publish capabilities while they run.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::port::Port;

/// How much of `state` a callback is allowed to see and change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateCapability {
    /// The body has no access to state; any write attempt is a bug in the
    /// callback body and `new_state` is always forced to `None`.
    #[default]
    None,
    /// The body may read fields in its `read`/`write` sets but not mutate
    /// them; `new_state` is always forced to `None`.
    Read,
    /// The body may read and mutate fields in its `write` set.
    ReadWrite,
}

/// State mapping threaded through an invocation: field name → value, with
/// `null` as the explicit "absent" marker.
pub type StateMap = IndexMap<String, Value>;

/// The `(new_state_or_null, published_or_null, result_value)` triple the
/// design document specifies for every callback invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackResult {
    /// Replacement state, or `None` if the callback left state unchanged
    /// (or has no write capability at all).
    pub new_state: Option<StateMap>,
    /// Ordered `(out_port, value)` pairs published during the invocation,
    /// or `None` if nothing was published.
    pub published: Option<Vec<(Port, Value)>>,
    /// The callback body's own return value.
    pub result: Value,
}

impl CallbackResult {
    /// A result that changes nothing and publishes nothing.
    #[must_use]
    pub fn unchanged(result: Value) -> Self {
        Self {
            new_state: None,
            published: None,
            result,
        }
    }
}

/// The mutable environment a callback body executes against: a view of
/// current state, and an accumulator for published values.
///
/// Reads, writes, and publishes are checked against the callback's declared
/// `read`/`write`/`publish` sets. A violation is a programming error in the
/// callback body (the design document calls this "a static error at
/// callback definition time"); since bodies are opaque closures this crate
/// cannot verify them before the first call, so the check happens on first
/// use and panics rather than returning a recoverable error, matching how
/// the teacher's codebase treats violated internal invariants.
pub struct InvocationEnv {
    state: StateMap,
    read: Arc<BTreeSet<String>>,
    write: Arc<BTreeSet<String>>,
    publish: Arc<BTreeSet<Port>>,
    state_capability: StateCapability,
    publish_capability: bool,
    published: Vec<(Port, Value)>,
    dirty: bool,
}

impl InvocationEnv {
    fn new(
        state: StateMap,
        read: Arc<BTreeSet<String>>,
        write: Arc<BTreeSet<String>>,
        publish: Arc<BTreeSet<Port>>,
        state_capability: StateCapability,
        publish_capability: bool,
    ) -> Self {
        Self {
            state,
            read,
            write,
            publish,
            state_capability,
            publish_capability,
            published: Vec::new(),
            dirty: false,
        }
    }

    /// Read a field's current value. Returns `Value::Null` if the field has
    /// never been set.
    ///
    /// # Panics
    /// Panics if `field` is not in this callback's declared `read` or
    /// `write` set.
    #[must_use]
    pub fn read(&self, field: &str) -> Value {
        assert!(
            self.read.contains(field) || self.write.contains(field),
            "callback read undeclared field `{field}`"
        );
        self.state.get(field).cloned().unwrap_or(Value::Null)
    }

    /// Write a field's value.
    ///
    /// # Panics
    /// Panics if `field` is not in this callback's declared `write` set, or
    /// if its `state_capability` is not [`StateCapability::ReadWrite`].
    pub fn write(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        assert!(
            self.state_capability == StateCapability::ReadWrite,
            "callback wrote field `{field}` without read-write state capability"
        );
        assert!(
            self.write.contains(&field),
            "callback wrote undeclared field `{field}`"
        );
        self.state.insert(field, value);
        self.dirty = true;
    }

    /// Append `(port, value)` to the publish accumulator.
    ///
    /// # Panics
    /// Panics if `port` is not in this callback's declared `publish` set, or
    /// if its `publish_capability` is `false`.
    pub fn publish(&mut self, port: impl Into<Port>, value: Value) {
        let port = port.into();
        assert!(
            self.publish_capability,
            "callback published to `{port}` without publish capability"
        );
        assert!(
            self.publish.contains(&port),
            "callback published to undeclared port `{port}`"
        );
        self.published.push((port, value));
    }
}

impl fmt::Debug for InvocationEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationEnv")
            .field("state", &self.state)
            .field("published_so_far", &self.published.len())
            .finish()
    }
}

/// A callback body: a plain function value over `(env, args) -> result`.
pub type CallbackBody = Arc<dyn Fn(&mut InvocationEnv, Value) -> Value + Send + Sync>;

/// A pure description of one user-defined operation, plus its declared
/// read/write/publish capabilities.
#[derive(Clone)]
pub struct Callback {
    body: CallbackBody,
    read: Arc<BTreeSet<String>>,
    write: Arc<BTreeSet<String>>,
    publish: Arc<BTreeSet<Port>>,
    state_capability: StateCapability,
    publish_capability: bool,
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("read", &self.read)
            .field("write", &self.write)
            .field("publish", &self.publish)
            .field("state_capability", &self.state_capability)
            .field("publish_capability", &self.publish_capability)
            .finish_non_exhaustive()
    }
}

impl Callback {
    /// Build a callback from a body closure and its declared capabilities.
    pub fn new(
        body: impl Fn(&mut InvocationEnv, Value) -> Value + Send + Sync + 'static,
        read: impl IntoIterator<Item = impl Into<String>>,
        write: impl IntoIterator<Item = impl Into<String>>,
        publish: impl IntoIterator<Item = impl Into<Port>>,
        state_capability: StateCapability,
        publish_capability: bool,
    ) -> Self {
        Self {
            body: Arc::new(body),
            read: Arc::new(read.into_iter().map(Into::into).collect()),
            write: Arc::new(write.into_iter().map(Into::into).collect()),
            publish: Arc::new(publish.into_iter().map(Into::into).collect()),
            state_capability,
            publish_capability,
        }
    }

    /// Fields this callback's body observes.
    #[must_use]
    pub fn read_set(&self) -> &BTreeSet<String> {
        &self.read
    }

    /// Fields this callback's body mutates.
    #[must_use]
    pub fn write_set(&self) -> &BTreeSet<String> {
        &self.write
    }

    /// Out-ports this callback's body may publish to.
    #[must_use]
    pub fn publish_set(&self) -> &BTreeSet<Port> {
        &self.publish
    }

    /// This callback's declared state capability.
    #[must_use]
    pub fn state_capability(&self) -> StateCapability {
        self.state_capability
    }

    /// This callback's declared publish capability.
    #[must_use]
    pub fn publish_capability(&self) -> bool {
        self.publish_capability
    }
}

/// Run `callback` against `state` with `args`, enforcing its declared
/// capabilities and producing a [`CallbackResult`] per the design
/// document's per-invocation semantics:
///
/// - `new_state` is forced to `None` when `state_capability` is not
///   `ReadWrite`, even if the body does not attempt a write.
/// - `published` is forced to `None` when `publish_capability` is `false`.
#[must_use]
pub fn invoke(callback: &Callback, state: &StateMap, args: Value) -> CallbackResult {
    let mut env = InvocationEnv::new(
        state.clone(),
        Arc::clone(&callback.read),
        Arc::clone(&callback.write),
        Arc::clone(&callback.publish),
        callback.state_capability,
        callback.publish_capability,
    );

    let result = (callback.body)(&mut env, args);

    let new_state = match (callback.state_capability, env.dirty) {
        (StateCapability::ReadWrite, true) => Some(env.state),
        _ => None,
    };
    let published = if callback.publish_capability && !env.published.is_empty() {
        Some(env.published)
    } else {
        None
    };

    CallbackResult {
        new_state,
        published,
        result,
    }
}
