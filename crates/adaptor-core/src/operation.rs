//! The pipeline step abstraction

use adaptor_common::Result;
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::state::State;

/// One step of a job.
///
/// A step takes ownership of the state it is given and returns the state
/// for the next step. Steps that produce a result move it into `data` with
/// [`State::advance`]; steps with nothing to report return the state as is.
#[async_trait]
pub trait Operation: Send + Sync {
    async fn run(&self, state: State) -> Result<State>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "operation"
    }
}

/// Type-erased operation, the element type of a job definition
pub type BoxOperation = Box<dyn Operation>;

#[async_trait]
impl Operation for Box<dyn Operation> {
    async fn run(&self, state: State) -> Result<State> {
        (**self).run(state).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<O: Operation + ?Sized> Operation for Arc<O> {
    async fn run(&self, state: State) -> Result<State> {
        (**self).run(state).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Convenience methods for concrete operations
pub trait OperationExt: Operation + Sized + 'static {
    fn boxed(self) -> BoxOperation {
        Box::new(self)
    }
}

impl<T: Operation + Sized + 'static> OperationExt for T {}

/// An operation backed by an async closure
pub struct FnOperation<F, Fut> {
    name: String,
    f: F,
    _future: PhantomData<fn() -> Fut>,
}

/// Wrap an async closure as a named operation.
///
/// ```no_run
/// use adaptor_core::{operation, State};
/// use serde_json::json;
///
/// let op = operation("stamp", |state: State| async move {
///     Ok(state.advance(json!({"stamped": true})))
/// });
/// ```
pub fn operation<F, Fut>(name: impl Into<String>, f: F) -> FnOperation<F, Fut>
where
    F: Fn(State) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<State>> + Send + 'static,
{
    FnOperation {
        name: name.into(),
        f,
        _future: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> Operation for FnOperation<F, Fut>
where
    F: Fn(State) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<State>> + Send + 'static,
{
    async fn run(&self, state: State) -> Result<State> {
        (self.f)(state).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_operation_runs_closure() {
        let op = operation("double", |state: State| async move {
            let n = state.data().as_i64().unwrap_or(0);
            Ok(state.advance(json!(n * 2)))
        });

        let start = State::default().advance(json!(21));
        let next = op.run(start).await.unwrap();

        assert_eq!(op.name(), "double");
        assert_eq!(next.data(), &json!(42));
        assert_eq!(next.references(), &[json!(null), json!(21)]);
    }

    #[tokio::test]
    async fn test_boxed_and_shared_forward_name() {
        let boxed = operation("named", |state: State| async move { Ok(state) }).boxed();
        assert_eq!(boxed.name(), "named");

        let shared: Arc<dyn Operation> = Arc::new(boxed);
        assert_eq!(shared.name(), "named");
        assert_eq!(shared.run(State::default()).await.unwrap(), State::default());
    }
}
