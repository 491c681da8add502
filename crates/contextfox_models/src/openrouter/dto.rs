//! OpenRouter wire types.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Body of a `/chat/completions` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
pub struct ChatResponse {
    /// Response id
    #[serde(default)]
    id: Option<String>,
    /// Generated choices, normally one
    #[serde(default)]
    choices: Vec<ChatChoice>,
    /// Error reported in place of choices
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

/// One generated choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
pub struct ChatChoice {
    /// Assistant message
    #[serde(default)]
    message: ChoiceMessage,
    /// Why generation stopped
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Assistant message of a choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
pub struct ChoiceMessage {
    /// Text, may be null when reasoning consumed the budget
    #[serde(default)]
    content: Option<String>,
    /// Refusal explanation
    #[serde(default)]
    refusal: Option<String>,
}

/// Provider error object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
pub struct ApiErrorBody {
    /// Error message
    #[serde(default)]
    message: String,
    /// Provider error code
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Body of a `/models` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
pub struct ModelsResponse {
    /// Listed models
    #[serde(default)]
    data: Vec<ModelEntry>,
}

/// One model in the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
pub struct ModelEntry {
    /// Model id
    id: String,
    /// Display name
    #[serde(default)]
    name: String,
    /// Context window in tokens
    #[serde(default)]
    context_length: Option<u64>,
    /// Input and output modalities
    #[serde(default)]
    architecture: Option<ModelArchitecture>,
}

/// Modalities a model supports.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Getters)]
pub struct ModelArchitecture {
    /// Output modalities such as `text` or `image`
    #[serde(default)]
    output_modalities: Vec<String>,
}
