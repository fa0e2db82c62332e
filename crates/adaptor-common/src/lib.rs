//! Adaptor Common Library
//!
//! Shared error handling and logging for the adaptor workspace.
//!
//! - **Error Handling**: the error every pipeline step fails with, and its taxonomy
//! - **Logging**: `tracing` subscriber setup driven by config or environment
//!
//! # Example
//!
//! ```no_run
//! use adaptor_common::{AdaptorError, Result};
//!
//! fn read_archive(path: &str) -> Result<Vec<u8>> {
//!     Ok(std::fs::read(path)?)
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{AdaptorError, ErrorKind, Result};
