//! Completion provider integrations for ContextFox.
//!
//! [`OpenRouterClient`] implements both
//! [`CompletionDriver`](contextfox_interface::CompletionDriver) and
//! [`ModelCatalog`](contextfox_interface::ModelCatalog) against the
//! OpenRouter chat completions API.
//!
//! ```no_run
//! use contextfox_models::{OpenRouterClient, OpenRouterSettings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = OpenRouterSettings::from_env("OPENROUTER_API_KEY")?.build()?;
//! let client = OpenRouterClient::new(settings)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod openrouter;

pub use openrouter::{
    ApiErrorBody, ChatChoice, ChatResponse, ChoiceMessage, ModelArchitecture, ModelEntry,
    ModelsResponse, OPENROUTER_API_URL, OpenRouterClient, OpenRouterSettings,
    OpenRouterSettingsBuilder, interpret_chat_response, text_output_models,
};
