//! Adaptor Core
//!
//! Sequential composition of pipeline steps over a threaded job state.
//!
//! A job is an ordered list of [`Operation`]s. [`execute`] merges the
//! caller's initial state over the defaults and runs each step strictly
//! after the previous one settles, stopping at the first failure. Steps
//! advance `data` only through [`compose_next_state`], which keeps the
//! `references` history intact.
//!
//! # Example
//!
//! ```no_run
//! use adaptor_core::{alter_state, compose_next_state, execute, OperationExt};
//! use serde_json::json;
//!
//! # async fn run() -> adaptor_common::Result<()> {
//! let job = execute(vec![
//!     alter_state(|state| Ok(compose_next_state(&state, json!("x")))).boxed(),
//!     alter_state(|state| Ok(compose_next_state(&state, json!("y")))).boxed(),
//! ]);
//!
//! let state = job.call(json!({ "configuration": {} })).await?;
//! assert_eq!(state.data(), &json!("y"));
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod common;
pub mod execute;
pub mod operation;
pub mod param;
pub mod path;
pub mod state;

pub use common::{alter_state, combine, each, field, fields, merge, Field};
pub use execute::{execute, Sequence};
pub use operation::{operation, BoxOperation, FnOperation, Operation, OperationExt};
pub use param::Param;
pub use path::{data_path, data_value, last_reference_value, source_value, JsonPath};
pub use state::{compose_next_state, merge_states, State};
