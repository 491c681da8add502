//! Trait definitions for the pipeline's external collaborators.

use async_trait::async_trait;
use contextfox_core::{CompletionRequest, CompletionResponse, ModelInfo};
use contextfox_error::ContextFoxResult;

/// A chat completion backend.
///
/// Implementations map content-policy refusals to
/// `CompletionErrorKind::Refusal` so the retry executor can react to them.
#[async_trait]
pub trait CompletionDriver: Send + Sync {
    /// Send one request and return the model's text.
    async fn complete(&self, req: &CompletionRequest) -> ContextFoxResult<CompletionResponse>;

    /// Provider name (e.g., "openrouter").
    fn provider_name(&self) -> &'static str;
}

/// Lists the models a provider offers.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    /// Text-output models with their context window lengths.
    async fn list_models(&self) -> ContextFoxResult<Vec<ModelInfo>>;

    /// Context length of one model, 0 when unknown.
    async fn context_length(&self, model_id: &str) -> ContextFoxResult<u64> {
        Ok(self
            .list_models()
            .await?
            .into_iter()
            .find(|m| m.id == model_id)
            .map(|m| m.context_length)
            .unwrap_or(0))
    }
}

/// Durable string key/value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent.
    async fn get(&self, key: &str) -> ContextFoxResult<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> ContextFoxResult<()>;

    /// Delete a value. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> ContextFoxResult<()>;

    /// All keys starting with `prefix`, sorted.
    async fn keys(&self, prefix: &str) -> ContextFoxResult<Vec<String>>;
}
