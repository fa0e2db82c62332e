//! Sequential composition of operations

use adaptor_common::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info_span, Instrument};

use crate::operation::{BoxOperation, Operation};
use crate::state::State;

/// An ordered list of operations run one after another.
///
/// Step `n + 1` starts only after step `n` has settled, and the first failure
/// ends the run: later steps never execute and the error is returned as is.
/// There is no timeout here; a step that never settles stalls the job.
pub struct Sequence {
    operations: Vec<BoxOperation>,
}

/// Compose `operations` into a job.
///
/// Run it with [`Sequence::call`], which builds the working state from the
/// caller's initial state and the defaults.
pub fn execute(operations: Vec<BoxOperation>) -> Sequence {
    Sequence::new(operations)
}

impl Sequence {
    pub fn new(operations: Vec<BoxOperation>) -> Self {
        Self { operations }
    }

    /// Append a step
    pub fn then(mut self, operation: impl Operation + 'static) -> Self {
        self.operations.push(Box::new(operation));
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Run the job from a caller-supplied initial state.
    ///
    /// `initial` is overlaid on [`State::defaults`], caller keys winning.
    pub async fn call(&self, initial: Value) -> Result<State> {
        let state = State::from_initial(initial)?;
        self.run_steps(state).await
    }

    async fn run_steps(&self, mut state: State) -> Result<State> {
        let total = self.operations.len();

        for (index, operation) in self.operations.iter().enumerate() {
            let step = index + 1;
            let name = operation.name();
            let span = info_span!("step", step, total, operation = name);

            state = match operation.run(state).instrument(span).await {
                Ok(next) => {
                    debug!(step, total, operation = name, "Step completed");
                    next
                },
                Err(err) => {
                    error!(step, total, operation = name, error = %err, "Step failed, stopping job");
                    return Err(err);
                },
            };
        }

        Ok(state)
    }
}

// Nested sequences receive a complete `State`, so overlaying the defaults
// would change nothing; the steps run on it directly.
#[async_trait]
impl Operation for Sequence {
    async fn run(&self, state: State) -> Result<State> {
        self.run_steps(state).await
    }

    fn name(&self) -> &str {
        "sequence"
    }
}
