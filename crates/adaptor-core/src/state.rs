//! Job state threaded through a pipeline
//!
//! `data` and `references` are private: the only way to move `data` forward
//! is [`State::advance`] (or its borrowing twin [`compose_next_state`]), so
//! every step that produces a result also records the previous one.

use adaptor_common::{AdaptorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const DATA: &str = "data";
const REFERENCES: &str = "references";
const CONFIGURATION: &str = "configuration";

/// The evolving context of a single job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Output of the most recently completed step
    #[serde(default)]
    data: Value,

    /// Prior `data` values, oldest first
    #[serde(default)]
    references: Vec<Value>,

    /// Credentials and connection settings, fixed for the job
    #[serde(default)]
    configuration: Value,

    /// Any other top-level keys supplied by the caller or set by steps
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl State {
    /// Empty state carrying only `configuration`
    pub fn new(configuration: Value) -> Self {
        Self {
            data: Value::Null,
            references: Vec::new(),
            configuration,
            fields: Map::new(),
        }
    }

    /// Default keys every job starts from: `references = []`, `data = null`
    pub fn defaults() -> Map<String, Value> {
        let mut defaults = Map::new();
        defaults.insert(REFERENCES.to_string(), Value::Array(Vec::new()));
        defaults.insert(DATA.to_string(), Value::Null);
        defaults
    }

    /// Build the working state for a job from the caller's initial state.
    ///
    /// The caller's keys are overlaid on [`State::defaults`] and win on
    /// collision. `initial` must be a JSON object (or null for "no input").
    pub fn from_initial(initial: Value) -> Result<Self> {
        let overlay = match initial {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(AdaptorError::config(format!(
                    "initial state must be an object, got {}",
                    type_name(&other)
                )))
            },
        };

        let merged = merge_states(&Self::defaults(), &overlay);
        Ok(serde_json::from_value(Value::Object(merged))?)
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn references(&self) -> &[Value] {
        &self.references
    }

    /// The `data` value recorded by the most recent step, if any
    pub fn last_reference(&self) -> Option<&Value> {
        self.references.last()
    }

    pub fn configuration(&self) -> &Value {
        &self.configuration
    }

    /// A caller or step supplied top-level field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Return this state with a scratch field set.
    ///
    /// `data`, `references` and `configuration` are reserved: use
    /// [`State::advance`] to move `data`, and configuration never changes.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Result<Self> {
        let key = key.into();
        if matches!(key.as_str(), DATA | REFERENCES | CONFIGURATION) {
            return Err(AdaptorError::operation(format!(
                "'{}' is a reserved state key and cannot be set as a field",
                key
            )));
        }
        self.fields.insert(key, value);
        Ok(self)
    }

    /// Return this state without a scratch field
    pub fn without_field(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    /// Consume this state and produce the next one: `data := result`, with
    /// the previous `data` appended to `references`.
    pub fn advance(mut self, result: Value) -> Self {
        let previous = std::mem::replace(&mut self.data, result);
        self.references.push(previous);
        self
    }

    /// The whole state as a single JSON object
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert(DATA.to_string(), self.data.clone());
        map.insert(
            REFERENCES.to_string(),
            Value::Array(self.references.clone()),
        );
        map.insert(CONFIGURATION.to_string(), self.configuration.clone());
        Value::Object(map)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

/// Return a new state whose `data` is `result` and whose `references` gain
/// the previous `data`. `state` itself is left untouched.
pub fn compose_next_state(state: &State, result: Value) -> State {
    state.clone().advance(result)
}

/// Shallow merge of two state objects; keys in `overlay` win.
pub fn merge_states(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, value) in overlay {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn json_object() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map("[a-z]{1,6}", json_value(), 0..5)
            .prop_map(|m| m.into_iter().collect())
    }

    #[test]
    fn test_from_initial_applies_defaults() {
        let state = State::from_initial(json!({
            "configuration": {"project": "p"},
            "year": "2019"
        }))
        .unwrap();

        assert_eq!(state.data(), &Value::Null);
        assert!(state.references().is_empty());
        assert_eq!(state.configuration(), &json!({"project": "p"}));
        assert_eq!(state.field("year"), Some(&json!("2019")));
    }

    #[test]
    fn test_from_initial_caller_wins() {
        let state = State::from_initial(json!({
            "data": {"rows": 3},
            "references": ["earlier"]
        }))
        .unwrap();

        assert_eq!(state.data(), &json!({"rows": 3}));
        assert_eq!(state.references(), &[json!("earlier")]);
    }

    #[test]
    fn test_from_initial_rejects_non_objects() {
        let err = State::from_initial(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));

        // references must stay a list even when supplied by the caller
        assert!(State::from_initial(json!({"references": "nope"})).is_err());

        assert_eq!(State::from_initial(Value::Null).unwrap(), State::default());
    }

    #[test]
    fn test_two_step_trace() {
        let start = State::from_initial(json!({"data": null, "references": []})).unwrap();
        let after_a = compose_next_state(&start, json!("x"));
        let after_b = compose_next_state(&after_a, json!("y"));

        assert_eq!(after_b.data(), &json!("y"));
        assert_eq!(after_b.references(), &[Value::Null, json!("x")]);
        assert_eq!(after_b.last_reference(), Some(&json!("x")));
    }

    #[test]
    fn test_reserved_fields() {
        let state = State::default();
        for key in ["data", "references", "configuration"] {
            assert!(state.clone().with_field(key, json!(1)).is_err());
        }

        let state = state.with_field("response", json!({"ok": true})).unwrap();
        assert_eq!(state.field("response"), Some(&json!({"ok": true})));
        assert!(state.without_field("response").field("response").is_none());
    }

    #[test]
    fn test_to_value_round_trips_through_from_initial() {
        let state = State::from_initial(json!({"configuration": {"k": "v"}, "month": "01"}))
            .unwrap()
            .advance(json!([1, 2]));

        let value = state.to_value();
        assert_eq!(value["data"], json!([1, 2]));
        assert_eq!(value["references"], json!([null]));
        assert_eq!(value["month"], json!("01"));
        assert_eq!(State::from_initial(value).unwrap(), state);
    }

    proptest! {
        #[test]
        fn prop_compose_next_state_is_pure(
            fields in json_object(),
            data in json_value(),
            result in json_value(),
        ) {
            let mut initial = fields;
            initial.insert("data".to_string(), data.clone());
            initial.remove("references");
            initial.remove("configuration");
            let state = State::from_initial(Value::Object(initial)).unwrap();
            let before = state.clone();

            let first = compose_next_state(&state, result.clone());
            let second = compose_next_state(&state, result.clone());

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(&state, &before);
            prop_assert_eq!(first.data(), &result);
            prop_assert_eq!(first.references().len(), state.references().len() + 1);
            prop_assert_eq!(first.last_reference(), Some(&data));
            prop_assert_eq!(first.fields(), state.fields());
        }

        #[test]
        fn prop_merge_overlay_wins(base in json_object(), overlay in json_object()) {
            let merged = merge_states(&base, &overlay);

            for (key, value) in &overlay {
                prop_assert_eq!(merged.get(key), Some(value));
            }
            for (key, value) in &base {
                if !overlay.contains_key(key) {
                    prop_assert_eq!(merged.get(key), Some(value));
                }
            }
            prop_assert!(merged.keys().all(|k| base.contains_key(k) || overlay.contains_key(k)));
        }
    }
}
