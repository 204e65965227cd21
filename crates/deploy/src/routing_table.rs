//! The routing table: per-component, per-out-port destination fragments
//! built during deployment and consumed by `nebula-router` (§3, §4.8, §4.9).

use indexmap::IndexMap;
use nebula_core::Port;
use serde_json::{Map, Value, json};

/// One component's out-port → destinations fragment.
pub type RoutingFragment = IndexMap<Port, Vec<(String, Port)>>;

/// Serialize a fragment as `{"out_port": [["dest_component", "dest_port"],
/// ...]}` for the `prepare` hook payload — built by hand rather than via
/// `#[derive(Serialize)]` since `Port` (a transparent string newtype) is
/// the map's key type.
#[must_use]
pub fn fragment_to_value(fragment: &RoutingFragment) -> Value {
    let mut map = Map::new();
    for (port, destinations) in fragment {
        let list: Vec<Value> = destinations
            .iter()
            .map(|(component, dest_port)| json!([component, dest_port.as_str()]))
            .collect();
        map.insert(port.as_str().to_string(), Value::Array(list));
    }
    Value::Object(map)
}

/// Parse a fragment back from the shape [`fragment_to_value`] produces. A
/// value that is not an object (e.g. `null`, meaning `prepare` chose not
/// to rewrite anything) parses as `None`.
#[must_use]
pub fn fragment_from_value(value: &Value) -> Option<RoutingFragment> {
    let Value::Object(map) = value else { return None };
    let mut fragment = RoutingFragment::new();
    for (port, destinations) in map {
        let Value::Array(entries) = destinations else { continue };
        let mut parsed = Vec::new();
        for entry in entries {
            let Value::Array(pair) = entry else { continue };
            let [component, dest_port] = pair.as_slice() else { continue };
            let (Some(component), Some(dest_port)) = (component.as_str(), dest_port.as_str()) else { continue };
            parsed.push((component.to_string(), Port::new(dest_port)));
        }
        fragment.insert(Port::new(port.clone()), parsed);
    }
    Some(fragment)
}

/// `component_instance_id -> (out_port -> destinations)`, the flattened
/// and `prepare`-finalized shape of §3's `RoutingTable`.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    fragments: IndexMap<String, RoutingFragment>,
}

impl RoutingTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// This component's current fragment, or an empty one if it publishes
    /// nothing.
    #[must_use]
    pub fn fragment(&self, component_id: &str) -> RoutingFragment {
        self.fragments.get(component_id).cloned().unwrap_or_default()
    }

    /// Destinations for one `(component_id, out_port)` pair.
    #[must_use]
    pub fn destinations(&self, component_id: &str, out_port: &Port) -> Vec<(String, Port)> {
        self.fragments
            .get(component_id)
            .and_then(|fragment| fragment.get(out_port))
            .cloned()
            .unwrap_or_default()
    }

    /// Replace `component_id`'s fragment wholesale (used when `prepare`
    /// rewrites its destinations).
    pub fn set_fragment(&mut self, component_id: impl Into<String>, fragment: RoutingFragment) {
        self.fragments.insert(component_id.into(), fragment);
    }

    /// Add one `(out_port) -> (dest_component, dest_port)` edge to
    /// `component_id`'s fragment, preserving publish order (fan-out to
    /// several destinations is appended in link-declaration order).
    pub fn add_edge(&mut self, component_id: impl Into<String>, out_port: Port, destination: (String, Port)) {
        self.fragments.entry(component_id.into()).or_default().entry(out_port).or_default().push(destination);
    }

    /// Every component id this table has a fragment for.
    pub fn component_ids(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_edge_appends_in_order_and_fragment_reads_it_back() {
        let mut table = RoutingTable::new();
        table.add_edge("a", Port::new("out"), ("b".to_string(), Port::new("in")));
        table.add_edge("a", Port::new("out"), ("c".to_string(), Port::new("in")));

        assert_eq!(
            table.destinations("a", &Port::new("out")),
            vec![("b".to_string(), Port::new("in")), ("c".to_string(), Port::new("in"))]
        );
    }

    #[test]
    fn unknown_component_has_an_empty_fragment() {
        let table = RoutingTable::new();
        assert!(table.fragment("ghost").is_empty());
    }

    #[test]
    fn fragment_round_trips_through_value() {
        let mut fragment = RoutingFragment::new();
        fragment.insert(Port::new("out"), vec![("b".to_string(), Port::new("in"))]);
        let value = fragment_to_value(&fragment);
        assert_eq!(fragment_from_value(&value), Some(fragment));
    }

    #[test]
    fn non_object_value_parses_as_no_rewrite() {
        assert_eq!(fragment_from_value(&Value::Null), None);
    }
}
