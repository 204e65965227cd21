//! Parsing a `receive` hook's result into the `state:`/`publish:` mapping
//! §4.7 describes.

use indexmap::IndexMap;
use nebula_core::{Port, StateMap};
use serde_json::Value;

/// The `state:`/`publish:` mapping a `receive` hook's
/// [`nebula_core::CallbackResult::result`] is expected to carry.
///
/// `publish` preserves both the out-port iteration order and each port's
/// value order, since both are load-bearing for the ordering guarantees in
/// §5.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiveOutcome {
    /// Replacement worker state, if the hook chose to replace it.
    pub state: Option<StateMap>,
    /// Out-port → ordered values to forward, if anything was published.
    pub publish: IndexMap<Port, Vec<Value>>,
}

/// Parse a `receive` hook's result value.
///
/// Accepts `{"state": {...}, "publish": {"port": [v1, v2, ...]}}`; any
/// field may be absent. A result that is not a JSON object (or is `null`)
/// parses as "no state change, nothing published" rather than an error —
/// a strategy with no observable effect from one message is valid.
#[must_use]
pub fn parse_receive_outcome(result: &Value) -> ReceiveOutcome {
    let Value::Object(map) = result else {
        return ReceiveOutcome::default();
    };

    let state = map.get("state").and_then(|v| v.as_object()).map(|obj| {
        obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<StateMap>()
    });

    let mut publish = IndexMap::new();
    if let Some(Value::Object(publish_map)) = map.get("publish") {
        for (port, values) in publish_map {
            let values = match values {
                Value::Array(vs) => vs.clone(),
                other => vec![other.clone()],
            };
            publish.insert(Port::new(port.clone()), values);
        }
    }

    ReceiveOutcome { state, publish }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_state_and_publish() {
        let result = json!({
            "state": {"count": 2},
            "publish": {"current": [1, 2, 3]},
        });
        let outcome = parse_receive_outcome(&result);
        assert_eq!(outcome.state.unwrap().get("count"), Some(&json!(2)));
        assert_eq!(outcome.publish.get(&Port::new("current")).unwrap(), &vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn missing_fields_parse_as_empty() {
        let outcome = parse_receive_outcome(&json!({}));
        assert!(outcome.state.is_none());
        assert!(outcome.publish.is_empty());
    }

    #[test]
    fn non_object_result_parses_as_empty() {
        let outcome = parse_receive_outcome(&Value::Null);
        assert!(outcome.state.is_none());
        assert!(outcome.publish.is_empty());
    }

    #[test]
    fn scalar_publish_value_is_wrapped_as_single_element_sequence() {
        let outcome = parse_receive_outcome(&json!({"publish": {"current": 5}}));
        assert_eq!(outcome.publish.get(&Port::new("current")).unwrap(), &vec![json!(5)]);
    }
}
