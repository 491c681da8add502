//! Core data types for ContextFox.
//!
//! Story cards, exclusion rules, per-story processing state, pipeline tasks
//! and the completion request/response shapes shared by every other crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod card;
mod content;
mod exclusion;
mod model;
mod request;
mod state;
mod task;

pub use card::{CardKind, CardUpdate, StoryCard};
pub use content::StoryContent;
pub use exclusion::ExclusionState;
pub use model::{ModelChoice, ModelInfo, ModelParams, ReasoningEffort};
pub use request::{
    CompletionRequest, CompletionRequestBuilder, CompletionResponse, Message, Reasoning,
    ResponseFormat, Role,
};
pub use state::ProcessingState;
pub use task::{Task, TaskKind, TaskStatus};
