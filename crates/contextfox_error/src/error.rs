//! Top-level error wrapper types.

use crate::{
    CompletionError, CompletionErrorKind, ConfigError, HttpError, JsonError, PipelineError,
    PipelineErrorKind, StorageError,
};

/// Every error the workspace can produce.
///
/// # Examples
///
/// ```
/// use contextfox_error::{ContextFoxError, HttpError};
///
/// let err: ContextFoxError = HttpError::new("Connection failed").into();
/// assert!(format!("{}", err).contains("HTTP Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum ContextFoxErrorKind {
    /// HTTP error
    #[from(HttpError)]
    Http(HttpError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Completion provider error
    #[from(CompletionError)]
    Completion(CompletionError),
    /// Pipeline error
    #[from(PipelineError)]
    Pipeline(PipelineError),
}

/// ContextFox error with kind discrimination.
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("ContextFox Error: {}", _0)]
pub struct ContextFoxError(Box<ContextFoxErrorKind>);

impl ContextFoxError {
    /// Create a new error from a kind.
    pub fn new(kind: ContextFoxErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ContextFoxErrorKind {
        &self.0
    }

    /// True when the underlying failure is a content-policy refusal.
    pub fn is_refusal(&self) -> bool {
        match self.kind() {
            ContextFoxErrorKind::Completion(e) => e.is_refusal(),
            ContextFoxErrorKind::Pipeline(e) => {
                matches!(e.kind, PipelineErrorKind::Refusal { .. })
            }
            _ => false,
        }
    }

    /// True when extraction found nothing new to process.
    pub fn is_no_new_content(&self) -> bool {
        matches!(
            self.kind(),
            ContextFoxErrorKind::Pipeline(PipelineError {
                kind: PipelineErrorKind::NoNewContent,
                ..
            })
        )
    }

    /// True when a response arrived but could not be decoded.
    pub fn is_parse_failure(&self) -> bool {
        match self.kind() {
            ContextFoxErrorKind::Json(_) => true,
            ContextFoxErrorKind::Completion(e) => {
                matches!(e.kind, CompletionErrorKind::MalformedResponse(_))
            }
            _ => false,
        }
    }

    /// True for network-level or HTTP status failures.
    pub fn is_transport(&self) -> bool {
        match self.kind() {
            ContextFoxErrorKind::Http(_) => true,
            ContextFoxErrorKind::Completion(e) => matches!(
                e.kind,
                CompletionErrorKind::Transport(_) | CompletionErrorKind::HttpStatus { .. }
            ),
            _ => false,
        }
    }
}

impl<T> From<T> for ContextFoxError
where
    T: Into<ContextFoxErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for ContextFox operations.
pub type ContextFoxResult<T> = std::result::Result<T, ContextFoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refusal_detection() {
        let err: ContextFoxError =
            CompletionError::new(CompletionErrorKind::Refusal("content_filter".into())).into();
        assert!(err.is_refusal());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_parse_failure_detection() {
        let malformed: ContextFoxError =
            CompletionError::new(CompletionErrorKind::MalformedResponse("no choices".into())).into();
        assert!(malformed.is_parse_failure());
        assert!(!malformed.is_transport());

        let json: ContextFoxError = JsonError::new("expected value").into();
        assert!(json.is_parse_failure());

        let transport: ContextFoxError =
            CompletionError::new(CompletionErrorKind::Transport("reset".into())).into();
        assert!(!transport.is_parse_failure());
    }

    #[test]
    fn test_no_new_content_detection() {
        let err: ContextFoxError = PipelineError::new(PipelineErrorKind::NoNewContent).into();
        assert!(err.is_no_new_content());
        assert!(!err.is_refusal());
    }

    #[test]
    fn test_location_is_captured() {
        let err = PipelineError::new(PipelineErrorKind::PartNotFound(2));
        assert!(err.file.ends_with("error.rs"));
        assert!(err.line > 0);
    }
}
