//! Bounded retries around a single model call.
//!
//! HTTP-level backoff for 429/503 lives in the client. This layer retries
//! whole attempts: blank replies are retried softly and refusals trigger a
//! prompt adjustment before the next attempt.

use contextfox_core::CompletionResponse;
use contextfox_error::{ContextFoxError, ContextFoxResult};
use derive_getters::Getters;
use std::future::Future;
use tracing::{debug, warn};

/// Attempt budget for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct RetryPolicy {
    /// Total attempts, first call included
    max_attempts: usize,
}

impl RetryPolicy {
    /// A policy with at least one attempt.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Result of a retried call.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The call produced a value
    Fulfilled(T),
    /// Every attempt failed; carries the last error
    Rejected(ContextFoxError),
}

impl<T> RetryOutcome<T> {
    /// The value, if fulfilled.
    pub fn ok(self) -> Option<T> {
        match self {
            RetryOutcome::Fulfilled(value) => Some(value),
            RetryOutcome::Rejected(_) => None,
        }
    }

    /// Convert into a result.
    pub fn into_result(self) -> ContextFoxResult<T> {
        match self {
            RetryOutcome::Fulfilled(value) => Ok(value),
            RetryOutcome::Rejected(err) => Err(err),
        }
    }
}

/// Responses that can come back empty.
pub trait BlankResponse {
    /// True when the response carries no usable text.
    fn is_blank(&self) -> bool;
}

impl BlankResponse for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl BlankResponse for CompletionResponse {
    fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Run `action` up to `policy.max_attempts` times.
///
/// - A blank response is retried unless it came from the final attempt,
///   in which case it is returned as is.
/// - A refusal invokes `on_refusal` before the next attempt, so the caller
///   can swap in an adjusted prompt. The hook is not called after the
///   final attempt.
/// - Any other error is retried until the budget runs out.
///
/// `action` receives the zero-based attempt number.
pub async fn call_with_retry<T, F, Fut, R>(
    label: &str,
    policy: &RetryPolicy,
    mut action: F,
    mut on_refusal: R,
) -> RetryOutcome<T>
where
    T: BlankResponse,
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = ContextFoxResult<T>>,
    R: FnMut(),
{
    let attempts = policy.max_attempts;
    let mut attempt = 0;

    loop {
        let is_last = attempt + 1 >= attempts;
        match action(attempt).await {
            Ok(response) if response.is_blank() && !is_last => {
                warn!(task = label, attempt, "Blank response, retrying");
            }
            Ok(response) => {
                debug!(task = label, attempt, "Call fulfilled");
                return RetryOutcome::Fulfilled(response);
            }
            Err(err) if is_last => {
                warn!(task = label, attempt, error = %err, "Giving up");
                return RetryOutcome::Rejected(err);
            }
            Err(err) if err.is_refusal() => {
                warn!(task = label, attempt, error = %err, "Model refused request");
                on_refusal();
            }
            Err(err) => {
                warn!(task = label, attempt, error = %err, "Call failed, retrying");
            }
        }
        attempt += 1;
    }
}
