//! Completion API error types and retry classification.

/// Completion-provider error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum CompletionErrorKind {
    /// API key not found in environment
    #[display("API key environment variable {} not set", _0)]
    MissingApiKey(String),
    /// The model withheld its answer on content-policy grounds
    #[display("Model refused the request: {}", _0)]
    Refusal(String),
    /// Network-level failure before a response arrived
    #[display("Transport failure: {}", _0)]
    Transport(String),
    /// HTTP error with status code and message
    #[display("HTTP {} error: {}", status_code, message)]
    HttpStatus {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },
    /// The provider returned an `error` object in an otherwise successful response
    #[display("API error: {}", _0)]
    Api(String),
    /// Response body did not have the expected shape
    #[display("Malformed response: {}", _0)]
    MalformedResponse(String),
    /// Response had no choices
    #[display("Response contained no choices")]
    EmptyChoices,
}

impl CompletionErrorKind {
    /// Check if this error type should be retried with backoff by the client.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionErrorKind::HttpStatus { status_code, .. } => {
                matches!(*status_code, 429 | 503)
            }
            _ => false,
        }
    }

    /// Get retry strategy parameters for this error type.
    ///
    /// Returns `(initial_backoff_ms, max_retries, max_delay_secs)`.
    pub fn retry_strategy_params(&self) -> (u64, usize, u64) {
        match self {
            CompletionErrorKind::HttpStatus { status_code, .. } => match *status_code {
                429 => (5000, 3, 40),
                503 => (2000, 4, 30),
                _ => (2000, 3, 30),
            },
            _ => (2000, 3, 30),
        }
    }
}

/// Completion error with source location tracking.
///
/// # Examples
///
/// ```
/// use contextfox_error::{CompletionError, CompletionErrorKind};
///
/// let err = CompletionError::new(CompletionErrorKind::MissingApiKey("OPENROUTER_API_KEY".into()));
/// assert!(format!("{}", err).contains("OPENROUTER_API_KEY"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Completion Error: {} at line {} in {}", kind, line, file)]
pub struct CompletionError {
    /// The kind of error that occurred
    pub kind: CompletionErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CompletionError {
    /// Create a new CompletionError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CompletionErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// True when the provider signalled a content-policy refusal.
    pub fn is_refusal(&self) -> bool {
        matches!(self.kind, CompletionErrorKind::Refusal(_))
    }
}

/// Trait for errors that support retry logic.
///
/// # Examples
///
/// ```
/// use contextfox_error::{CompletionError, CompletionErrorKind, RetryableError};
///
/// let err = CompletionError::new(CompletionErrorKind::HttpStatus {
///     status_code: 429,
///     message: "Too many requests".to_string(),
/// });
///
/// assert!(err.is_retryable());
/// let (backoff, retries, _max_delay) = err.retry_strategy_params();
/// assert_eq!(backoff, 5000);
/// assert_eq!(retries, 3);
/// ```
pub trait RetryableError {
    /// Returns true if this error should trigger a backoff retry.
    fn is_retryable(&self) -> bool;

    /// Returns `(initial_backoff_ms, max_retries, max_delay_secs)`.
    fn retry_strategy_params(&self) -> (u64, usize, u64) {
        (2000, 3, 30)
    }
}

impl RetryableError for CompletionError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    fn retry_strategy_params(&self) -> (u64, usize, u64) {
        self.kind.retry_strategy_params()
    }
}
