//! General-purpose operations shared by every adaptor

use adaptor_common::{AdaptorError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::execute::Sequence;
use crate::operation::{BoxOperation, Operation};
use crate::param::Param;
use crate::path::source_value;
use crate::state::{compose_next_state, State};

const INDEX_FIELD: &str = "index";

/// A synchronous step
pub struct AlterState<F> {
    f: F,
}

/// Run a plain function over the state.
///
/// The function owns the state and returns the next one, so results still
/// have to go through [`State::advance`] or
/// [`compose_next_state`](crate::compose_next_state).
pub fn alter_state<F>(f: F) -> AlterState<F>
where
    F: Fn(State) -> Result<State> + Send + Sync + 'static,
{
    AlterState { f }
}

#[async_trait]
impl<F> Operation for AlterState<F>
where
    F: Fn(State) -> Result<State> + Send + Sync + 'static,
{
    async fn run(&self, state: State) -> Result<State> {
        (self.f)(state)
    }

    fn name(&self) -> &str {
        "alter_state"
    }
}

/// Group operations into a single step.
///
/// Unlike [`execute`](crate::execute), the group runs on the state it is
/// handed; no defaults are applied.
pub fn combine(operations: Vec<BoxOperation>) -> Sequence {
    Sequence::new(operations)
}

/// Runs an operation once per item of a JSON array
pub struct Each {
    items: Param<Value>,
    operation: BoxOperation,
}

/// Run `operation` for every item `items` resolves to.
///
/// Each item is advanced into `data` before its run and the item's position
/// is available as the `index` field. Items are processed one at a time and
/// the first failure stops the loop.
pub fn each(items: impl Into<Param<Value>>, operation: impl Operation + 'static) -> Each {
    Each {
        items: items.into(),
        operation: Box::new(operation),
    }
}

#[async_trait]
impl Operation for Each {
    async fn run(&self, state: State) -> Result<State> {
        let items = match self.items.resolve(&state)? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                return Err(AdaptorError::operation(format!(
                    "each expects an array of items, got {}",
                    other
                )))
            },
        };

        debug!(count = items.len(), "Iterating items");

        let previous = state.field(INDEX_FIELD).cloned();
        let mut state = state;
        for (index, item) in items.into_iter().enumerate() {
            let next = state.advance(item).with_field(INDEX_FIELD, Value::from(index))?;
            state = self.operation.run(next).await?;
        }

        match previous {
            Some(index) => state.with_field(INDEX_FIELD, index),
            None => Ok(state.without_field(INDEX_FIELD)),
        }
    }

    fn name(&self) -> &str {
        "each"
    }
}

/// A named value for [`fields`]
pub type Field = (String, Param<Value>);

/// Pair a key with a value, fixed or derived from the state
pub fn field(key: impl Into<String>, value: impl Into<Param<Value>>) -> Field {
    (key.into(), value.into())
}

/// Build a JSON object from [`field`] pairs. Each value is resolved against
/// the state the step receives; later pairs win on duplicate keys.
pub fn fields(pairs: impl IntoIterator<Item = Field>) -> Param<Value> {
    let pairs: Vec<Field> = pairs.into_iter().collect();
    Param::try_derived(move |state: &State| {
        let mut object = Map::new();
        for (key, value) in &pairs {
            object.insert(key.clone(), value.resolve(state)?);
        }
        Ok(Value::Object(object))
    })
}

/// Overlays extra fields onto a list of objects
pub struct Merge {
    items: Param<Value>,
    fields: Param<Value>,
}

/// Copy `fields` onto every object `path` selects from the state.
///
/// `path` is looked up from the state root, e.g. `$.data.rows`. The merged
/// list becomes the next `data`. Keys from `fields` replace keys already on
/// an item.
pub fn merge(path: &str, fields: impl Into<Param<Value>>) -> Merge {
    Merge {
        items: source_value(path),
        fields: fields.into(),
    }
}

#[async_trait]
impl Operation for Merge {
    async fn run(&self, state: State) -> Result<State> {
        let items = match self.items.resolve(&state)? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        let extra = match self.fields.resolve(&state)? {
            Value::Object(map) => map,
            other => {
                return Err(AdaptorError::operation(format!(
                    "merge expects an object of fields, got {}",
                    other
                )))
            },
        };

        let merged = items
            .into_iter()
            .map(|item| match item {
                Value::Object(mut object) => {
                    object.extend(extra.clone());
                    Ok(Value::Object(object))
                },
                other => Err(AdaptorError::operation(format!(
                    "merge can only add fields to objects, got {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(count = merged.len(), "Merged fields");
        Ok(compose_next_state(&state, Value::Array(merged)))
    }

    fn name(&self) -> &str {
        "merge"
    }
}
