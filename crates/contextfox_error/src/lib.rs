//! Error types for ContextFox.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use contextfox_error::{ContextFoxResult, PipelineError, PipelineErrorKind};
//!
//! fn next_chunk() -> ContextFoxResult<String> {
//!     Err(PipelineError::new(PipelineErrorKind::NoNewContent))?
//! }
//!
//! assert!(next_chunk().unwrap_err().is_no_new_content());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod completion;
mod config;
mod error;
mod http;
mod json;
mod pipeline;
mod storage;

pub use completion::{CompletionError, CompletionErrorKind, RetryableError};
pub use config::ConfigError;
pub use error::{ContextFoxError, ContextFoxErrorKind, ContextFoxResult};
pub use http::HttpError;
pub use json::JsonError;
pub use pipeline::{PipelineError, PipelineErrorKind};
pub use storage::{StorageError, StorageErrorKind};
