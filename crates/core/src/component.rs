//! Components: immutable descriptions of a reactive processing unit.

use indexmap::{IndexMap, IndexSet};

use crate::callback::{Callback, CallbackResult, StateMap, invoke};
use crate::port::Port;
use crate::strategy::Strategy;

/// An immutable component description: state fields, in/out ports, named
/// callbacks, and the strategy governing its deployment and dispatch.
///
/// Constructed only via [`Component::new`], which enforces the design
/// document's invariant that every port a callback publishes to appears in
/// `out_ports`, and every field it reads or writes appears in `fields`.
#[derive(Debug, Clone)]
pub struct Component {
    name: Option<String>,
    fields: IndexSet<String>,
    in_ports: Vec<Port>,
    out_ports: Vec<Port>,
    callbacks: IndexMap<String, Callback>,
    strategy: Strategy,
}

impl Component {
    /// Build a component, validating it against the invariants in the
    /// design document's data model.
    ///
    /// # Errors
    /// Returns a `definition` error if:
    /// - `in_ports` is empty,
    /// - `fields` contains a duplicate,
    /// - a callback reads or writes a field not in `fields`,
    /// - a callback publishes to a port not in `out_ports`.
    pub fn new(
        name: Option<String>,
        fields: Vec<String>,
        in_ports: Vec<Port>,
        out_ports: Vec<Port>,
        callbacks: IndexMap<String, Callback>,
        strategy: Strategy,
    ) -> nebula_error::Result<Self> {
        if in_ports.is_empty() {
            return Err(nebula_error::Error::definition(
                "component must declare at least one in-port",
            ));
        }

        let mut field_set = IndexSet::new();
        for field in &fields {
            if !field_set.insert(field.clone()) {
                return Err(nebula_error::Error::definition(format!(
                    "duplicate field `{field}`"
                )));
            }
        }

        let out_port_set: IndexSet<&Port> = out_ports.iter().collect();

        for (callback_name, callback) in &callbacks {
            for field in callback.read_set().iter().chain(callback.write_set()) {
                if !field_set.contains(field) {
                    return Err(nebula_error::Error::definition(format!(
                        "callback `{callback_name}` references undeclared field `{field}`"
                    )));
                }
            }
            for port in callback.publish_set() {
                if !out_port_set.contains(port) {
                    return Err(nebula_error::Error::definition(format!(
                        "callback `{callback_name}` publishes to undeclared out-port `{port}`"
                    )));
                }
            }
        }

        Ok(Self {
            name,
            fields: field_set,
            in_ports,
            out_ports,
            callbacks,
            strategy,
        })
    }

    /// This component's registry name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Ordered, unique state slot names.
    #[must_use]
    pub fn fields(&self) -> &IndexSet<String> {
        &self.fields
    }

    /// Non-empty ordered in-ports.
    #[must_use]
    pub fn in_ports(&self) -> &[Port] {
        &self.in_ports
    }

    /// Ordered out-ports (possibly empty).
    #[must_use]
    pub fn out_ports(&self) -> &[Port] {
        &self.out_ports
    }

    /// Named callbacks.
    #[must_use]
    pub fn callbacks(&self) -> &IndexMap<String, Callback> {
        &self.callbacks
    }

    /// Look up one callback by name.
    #[must_use]
    pub fn callback(&self, name: &str) -> Option<&Callback> {
        self.callbacks.get(name)
    }

    /// This component's strategy.
    #[must_use]
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Build a copy of this component with a different strategy, used by
    /// the deployment engine to apply a node-level strategy override merged
    /// over the component's own strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl nebula_registry::Named for Component {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Build an empty state mapping: every field name bound to `null`, per
/// `create_empty_state(component)`.
#[must_use]
pub fn create_empty_state(component: &Component) -> StateMap {
    component
        .fields()
        .iter()
        .map(|f| (f.clone(), serde_json::Value::Null))
        .collect()
}

/// Invoke `callback_name` on `component` with the given `state` and `args`.
///
/// # Errors
/// Returns [`nebula_error::Error::NoSuchCallback`] if `component` has no
/// callback named `callback_name`.
pub fn call(
    component: &Component,
    callback_name: &str,
    state: &StateMap,
    args: serde_json::Value,
) -> nebula_error::Result<CallbackResult> {
    let callback = component
        .callback(callback_name)
        .ok_or_else(|| nebula_error::Error::no_such_callback(callback_name))?;
    Ok(invoke(callback, state, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::StateCapability;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn average_component() -> Component {
        let mut callbacks = IndexMap::new();
        callbacks.insert(
            "init".to_string(),
            Callback::new(
                |env, _| {
                    env.write("total", json!(0));
                    env.write("count", json!(0));
                    serde_json::Value::Null
                },
                [] as [String; 0],
                ["total", "count"],
                [] as [Port; 0],
                StateCapability::ReadWrite,
                false,
            ),
        );
        callbacks.insert(
            "react".to_string(),
            Callback::new(
                |env, args| {
                    let v = args.as_f64().unwrap_or(0.0);
                    let total = env.read("total").as_f64().unwrap_or(0.0) + v;
                    let count = env.read("count").as_i64().unwrap_or(0) + 1;
                    env.write("total", json!(total));
                    env.write("count", json!(count));
                    env.publish("current", json!(total / count as f64));
                    serde_json::Value::Null
                },
                ["total", "count"],
                ["total", "count"],
                [Port::new("current")],
                StateCapability::ReadWrite,
                true,
            ),
        );
        Component::new(
            Some("Average".to_string()),
            vec!["total".to_string(), "count".to_string()],
            vec![Port::new("value")],
            vec![Port::new("current")],
            callbacks,
            crate::strategy::Strategy::empty(),
        )
        .unwrap()
    }

    #[test]
    fn average_scenario_from_design_document() {
        let avg = average_component();
        let mut state = StateMap::new();
        state.insert("total".into(), json!(0));
        state.insert("count".into(), json!(0));

        let out = call(&avg, "react", &state, json!(10)).unwrap();
        let new_state = out.new_state.unwrap();
        assert_eq!(new_state.get("total"), Some(&json!(10.0)));
        assert_eq!(new_state.get("count"), Some(&json!(1)));
        assert_eq!(out.published.unwrap(), vec![(Port::new("current"), json!(10.0))]);
    }

    #[test]
    fn create_empty_state_nulls_every_field() {
        let avg = average_component();
        let state = create_empty_state(&avg);
        assert_eq!(state.get("total"), Some(&serde_json::Value::Null));
        assert_eq!(state.get("count"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn call_unknown_callback_is_an_error() {
        let avg = average_component();
        let err = call(&avg, "missing", &StateMap::new(), serde_json::Value::Null).unwrap_err();
        assert_eq!(err.to_string(), "no such callback: missing");
    }

    #[test]
    fn component_with_no_in_ports_is_rejected() {
        let err = Component::new(
            None,
            vec![],
            vec![],
            vec![],
            IndexMap::new(),
            crate::strategy::Strategy::empty(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("in-port"));
    }

    #[test]
    fn callback_publishing_to_undeclared_port_is_rejected_at_construction() {
        let mut callbacks = IndexMap::new();
        callbacks.insert(
            "bad".to_string(),
            Callback::new(
                |env, _| {
                    env.publish("ghost", serde_json::Value::Null);
                    serde_json::Value::Null
                },
                [] as [String; 0],
                [] as [String; 0],
                [Port::new("ghost")],
                StateCapability::None,
                true,
            ),
        );
        let err = Component::new(
            None,
            vec![],
            vec![Port::new("in")],
            vec![],
            callbacks,
            crate::strategy::Strategy::empty(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }
}
