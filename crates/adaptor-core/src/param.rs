//! Step arguments that are either fixed or computed from the job state

use adaptor_common::Result;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::state::State;

type Resolver<T> = Arc<dyn Fn(&State) -> Result<T> + Send + Sync>;

/// An argument to an operation factory.
///
/// Literal arguments are fixed when the job is defined. Derived arguments
/// are evaluated against the state the step receives, which lets a step use
/// values produced by earlier steps or supplied with the initial state.
pub enum Param<T> {
    Literal(T),
    Derived(Resolver<T>),
}

impl<T: Clone> Param<T> {
    /// Argument computed from the state when the step runs
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&State) -> T + Send + Sync + 'static,
    {
        Param::Derived(Arc::new(move |state: &State| Ok(f(state))))
    }

    /// Like [`Param::derived`], for lookups that can fail
    pub fn try_derived<F>(f: F) -> Self
    where
        F: Fn(&State) -> Result<T> + Send + Sync + 'static,
    {
        Param::Derived(Arc::new(f))
    }

    pub fn resolve(&self, state: &State) -> Result<T> {
        match self {
            Param::Literal(value) => Ok(value.clone()),
            Param::Derived(resolver) => resolver(state),
        }
    }
}

impl Param<Value> {
    /// View a JSON argument as text: strings as-is, anything else as JSON
    pub fn into_string(self) -> Param<String> {
        match self {
            Param::Literal(value) => Param::Literal(value_to_string(&value)),
            Param::Derived(resolver) => {
                Param::Derived(Arc::new(move |state: &State| {
                    resolver(state).map(|v| value_to_string(&v))
                }))
            },
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl<T> From<T> for Param<T> {
    fn from(value: T) -> Self {
        Param::Literal(value)
    }
}

impl From<&str> for Param<String> {
    fn from(value: &str) -> Self {
        Param::Literal(value.to_string())
    }
}

impl<T: Clone> Clone for Param<T> {
    fn clone(&self) -> Self {
        match self {
            Param::Literal(value) => Param::Literal(value.clone()),
            Param::Derived(resolver) => Param::Derived(Arc::clone(resolver)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Param<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Param::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}
