//! OpenRouter HTTP client.
//!
//! Sends chat completions with backoff on retryable failures and lists
//! the text models the provider offers.

use super::{ChatResponse, ModelEntry, ModelsResponse};
use async_trait::async_trait;
use contextfox_core::{CompletionRequest, CompletionResponse, ModelInfo};
use contextfox_error::{
    CompletionError, CompletionErrorKind, ContextFoxResult, HttpError, RetryableError,
};
use contextfox_interface::{CompletionDriver, ModelCatalog};
use derive_builder::Builder;
use derive_getters::Getters;
use reqwest::Client;
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, error, instrument, warn};

/// Default OpenRouter API root.
pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

/// Connection settings for [`OpenRouterClient`].
#[derive(Debug, Clone, Builder, Getters)]
#[builder(setter(into))]
pub struct OpenRouterSettings {
    /// Bearer token
    api_key: String,
    /// API root without trailing slash
    #[builder(default = "OPENROUTER_API_URL.to_string()")]
    base_url: String,
    /// Whole-request timeout
    #[builder(default = "300")]
    timeout_secs: u64,
    /// First backoff after a 429 or 503
    #[builder(default = "5000")]
    backoff_ms: u64,
    /// Backoff retries after a 429 or 503
    #[builder(default = "3")]
    backoff_retries: usize,
    /// Longest single backoff delay
    #[builder(default = "40")]
    max_delay_secs: u64,
    /// Value for the `X-Title` attribution header
    #[builder(default = "\"ContextFox\".to_string()")]
    app_title: String,
}

impl OpenRouterSettings {
    /// Creates a new settings builder.
    pub fn builder() -> OpenRouterSettingsBuilder {
        OpenRouterSettingsBuilder::default()
    }

    /// Settings with an API key read from `env_var`.
    pub fn from_env(env_var: &str) -> Result<OpenRouterSettingsBuilder, CompletionError> {
        let api_key = std::env::var(env_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                CompletionError::new(CompletionErrorKind::MissingApiKey(env_var.to_string()))
            })?;
        let mut builder = Self::builder();
        builder.api_key(api_key);
        Ok(builder)
    }
}

/// OpenRouter chat completion and model catalog client.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    settings: OpenRouterSettings,
}

impl OpenRouterClient {
    /// Creates a new client.
    pub fn new(settings: OpenRouterSettings) -> ContextFoxResult<Self> {
        debug!(base_url = %settings.base_url(), "Creating new OpenRouter client");
        let client = Client::builder()
            .timeout(Duration::from_secs(*settings.timeout_secs()))
            .build()
            .map_err(|e| HttpError::new(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.base_url().trim_end_matches('/'), path)
    }

    /// One POST to `/chat/completions` with no retry.
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn send_once(&self, request: &CompletionRequest) -> Result<ChatResponse, CompletionError> {
        debug!("Sending request to OpenRouter");

        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(self.settings.api_key())
            .header("X-Title", self.settings.app_title())
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, "Failed to send request to OpenRouter");
                CompletionError::new(CompletionErrorKind::Transport(format!(
                    "Request failed: {}",
                    e
                )))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "OpenRouter returned error");
            return Err(CompletionError::new(CompletionErrorKind::HttpStatus {
                status_code: status.as_u16(),
                message: body,
            }));
        }

        response.json().await.map_err(|e| {
            error!(error = ?e, "Failed to parse OpenRouter response");
            CompletionError::new(CompletionErrorKind::MalformedResponse(e.to_string()))
        })
    }
}

/// Turn a decoded chat response into pipeline terms.
///
/// Content-filter stops and non-empty refusals become
/// `CompletionErrorKind::Refusal`. A `length` stop is kept but flagged as
/// truncated.
pub fn interpret_chat_response(response: ChatResponse) -> Result<CompletionResponse, CompletionError> {
    if let Some(err) = response.error() {
        return Err(CompletionError::new(CompletionErrorKind::Api(
            err.message().clone(),
        )));
    }

    let choice = response
        .choices()
        .first()
        .ok_or_else(|| CompletionError::new(CompletionErrorKind::EmptyChoices))?;
    let finish_reason = choice.finish_reason().clone();

    let refusal = choice
        .message()
        .refusal()
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());
    if finish_reason.as_deref() == Some("content_filter") || refusal.is_some() {
        let reason = refusal.unwrap_or("content_filter").to_string();
        warn!(reason = %reason, "Model refused the request");
        return Err(CompletionError::new(CompletionErrorKind::Refusal(reason)));
    }

    let truncated = finish_reason.as_deref() == Some("length");
    if truncated {
        warn!("Response truncated at the token limit");
    }

    Ok(CompletionResponse {
        content: choice.message().content().clone().unwrap_or_default(),
        finish_reason,
        truncated,
    })
}

/// Keep models that produce text only, sorted by id.
pub fn text_output_models(entries: Vec<ModelEntry>) -> Vec<ModelInfo> {
    let mut models: Vec<ModelInfo> = entries
        .into_iter()
        .filter(|entry| {
            entry
                .architecture()
                .as_ref()
                .map(|arch| !arch.output_modalities().iter().any(|m| m == "image"))
                .unwrap_or(true)
        })
        .map(|entry| ModelInfo {
            id: entry.id().clone(),
            name: entry.name().clone(),
            context_length: entry.context_length().unwrap_or(0),
        })
        .collect();
    models.sort_by(|a, b| a.id.cmp(&b.id));
    models
}

#[async_trait]
impl CompletionDriver for OpenRouterClient {
    fn provider_name(&self) -> &'static str {
        "openrouter"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &CompletionRequest) -> ContextFoxResult<CompletionResponse> {
        let strategy = ExponentialBackoff::from_millis(*self.settings.backoff_ms())
            .factor(2)
            .max_delay(Duration::from_secs(*self.settings.max_delay_secs()))
            .map(jitter)
            .take(*self.settings.backoff_retries());

        let this = self;
        let response = Retry::spawn(strategy, || async move {
            match this.send_once(request).await {
                Ok(response) => Ok(response),
                Err(e) if e.is_retryable() => {
                    warn!(error = %e, "Rate limited or unavailable, backing off");
                    Err(RetryError::Transient {
                        err: e,
                        retry_after: None,
                    })
                }
                Err(e) => Err(RetryError::Permanent(e)),
            }
        })
        .await?;

        Ok(interpret_chat_response(response)?)
    }
}

#[async_trait]
impl ModelCatalog for OpenRouterClient {
    #[instrument(skip(self))]
    async fn list_models(&self) -> ContextFoxResult<Vec<ModelInfo>> {
        debug!("Fetching OpenRouter model catalog");
        let response = self
            .client
            .get(self.url("models"))
            .bearer_auth(self.settings.api_key())
            .send()
            .await
            .map_err(|e| HttpError::new(format!("Model list request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Model list request failed");
            return Err(CompletionError::new(CompletionErrorKind::HttpStatus {
                status_code: status.as_u16(),
                message: body,
            })
            .into());
        }

        let listing: ModelsResponse = response.json().await.map_err(|e| {
            CompletionError::new(CompletionErrorKind::MalformedResponse(e.to_string()))
        })?;
        let models = text_output_models(listing.data().clone());
        debug!(count = models.len(), "Fetched model catalog");
        Ok(models)
    }
}
