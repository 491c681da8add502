//! Wiring the pipeline to its collaborators.

use contextfox_core::ModelInfo;
use contextfox_error::{ConfigError, ContextFoxResult};
use contextfox_interface::ModelCatalog;
use contextfox_models::{OpenRouterClient, OpenRouterSettings};
use contextfox_pipeline::ContextFoxConfig;
use contextfox_storage::{FileKeyValueStore, StoryRepository};
use std::sync::Arc;
use tracing::{debug, warn};

/// OpenRouter client for the configured API. Fails when the key
/// environment variable is unset.
pub fn open_client(config: &ContextFoxConfig) -> ContextFoxResult<OpenRouterClient> {
    let api = config.api();
    let mut builder = OpenRouterSettings::from_env(api.api_key_env())?;
    builder
        .base_url(api.base_url().clone())
        .timeout_secs(*api.timeout_secs())
        .backoff_ms(*api.backoff_ms())
        .backoff_retries(*api.backoff_retries())
        .max_delay_secs(*api.max_delay_secs());
    let settings = builder
        .build()
        .map_err(|e| ConfigError::new(format!("Invalid API settings: {}", e)))?;
    OpenRouterClient::new(settings)
}

/// Story repository in the configured state directory.
pub fn open_repository(config: &ContextFoxConfig) -> ContextFoxResult<StoryRepository> {
    let dir = config.storage().resolved_state_dir();
    debug!(dir = %dir.display(), "Opening story store");
    Ok(StoryRepository::new(Arc::new(FileKeyValueStore::new(dir)?)))
}

/// The model catalog, or nothing when it cannot be fetched. Only the
/// advisory content split depends on it.
pub async fn fetch_catalog(catalog: &dyn ModelCatalog) -> Vec<ModelInfo> {
    match catalog.list_models().await {
        Ok(models) => models,
        Err(e) => {
            warn!(error = %e, "Model catalog unavailable, content will not be split");
            Vec::new()
        }
    }
}
