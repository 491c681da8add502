//! OpenRouter integration.

mod client;
mod dto;

pub use client::{
    OPENROUTER_API_URL, OpenRouterClient, OpenRouterSettings, OpenRouterSettingsBuilder,
    interpret_chat_response, text_output_models,
};
pub use dto::{
    ApiErrorBody, ChatChoice, ChatResponse, ChoiceMessage, ModelArchitecture, ModelEntry,
    ModelsResponse,
};
