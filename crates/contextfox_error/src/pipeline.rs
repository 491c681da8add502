//! Pipeline error types.

/// Specific error conditions raised while processing a story.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PipelineErrorKind {
    /// Extraction found nothing left to process
    #[display("No new content to process")]
    NoNewContent,
    /// Requested part index is absent from the part map
    #[display("Part {} not found", _0)]
    PartNotFound(u32),
    /// Model refused the request after all attempts
    #[display("Request refused for task '{}': {}", task, reason)]
    Refusal {
        /// Task id
        task: String,
        /// Last reported reason
        reason: String,
    },
    /// Structured output could not be recovered
    #[display("Could not parse response for task '{}': {}", task, reason)]
    ParseFailure {
        /// Task id
        task: String,
        /// What went wrong
        reason: String,
    },
    /// Network or API failure after all attempts
    #[display("Transport failure for task '{}': {}", task, reason)]
    TransportFailure {
        /// Task id
        task: String,
        /// Last reported reason
        reason: String,
    },
    /// A critical task did not produce a usable result
    #[display("Task '{}' failed: {}", task, reason)]
    TaskFailed {
        /// Task id
        task: String,
        /// Reason reported by the retry executor
        reason: String,
    },
    /// Prompt template failed validation
    #[display("Template error: {}", _0)]
    Template(String),
    /// No task with this id exists on the board
    #[display("Unknown task: {}", _0)]
    UnknownTask(String),
    /// Operation not allowed in the current phase
    #[display("Invalid transition: {}", _0)]
    InvalidTransition(String),
}

/// Error type for pipeline operations.
///
/// # Examples
///
/// ```
/// use contextfox_error::{PipelineError, PipelineErrorKind};
///
/// let err = PipelineError::new(PipelineErrorKind::PartNotFound(3));
/// assert!(format!("{}", err).contains("Part 3"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Pipeline Error: {} at line {} in {}", kind, line, file)]
pub struct PipelineError {
    /// The specific error condition
    pub kind: PipelineErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl PipelineError {
    /// Create a new PipelineError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PipelineErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
