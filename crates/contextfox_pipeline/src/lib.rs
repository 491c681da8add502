//! Story metadata extraction pipeline for ContextFox.
//!
//! Turns long-form story text into AI Dungeon story cards, a running
//! summary, plot essentials and per-character core selves by delegating
//! each extraction to a chat completion model.
//!
//! # Features
//!
//! - **Resumable parts**: stories are processed chunk by chunk, optionally
//!   stopping for permission between parts
//! - **Concurrent stages**: independent stages of a part run together
//! - **Refusal-aware retries**: a refused call is retried with an adjusted prompt
//! - **Recovering parser**: truncated or wrapped JSON is salvaged tier by tier
//!
//! # Example
//!
//! ```rust,ignore
//! use contextfox_pipeline::{ContextFoxConfig, StoryProcessor};
//!
//! let config = ContextFoxConfig::load()?;
//! let mut processor =
//!     StoryProcessor::open("harbor", driver, config.pipeline_settings()?, repository).await?;
//! let outcome = processor.process(&content).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod board;
mod cards;
mod config;
mod content;
mod executors;
mod parsing;
mod processor;
mod prompts;
mod retry;
mod sink;
mod splitting;

pub use board::{SharedBoard, TaskBoard};
pub use cards::{
    ContextCard, CoreSelfCard, GenerationCard, SeparatedCards, apply_core_self_updates,
    brain_cards, cards_json, finalize_cards, merge_cards, separate_cards, splice_core_self,
    strip_for_card_generation, strip_for_context, strip_for_core_self,
};
pub use config::{
    ApiConfig, ContextFoxConfig, ModelsConfig, PipelineSettings, ProcessingConfig, PromptsConfig,
    StorageConfig, TaskModels,
};
pub use content::{Extraction, extract_new_content, part_indicator};
pub use executors::{
    ExecutionContext, IDENTITY_PREAMBLE, StageInput, TaskRetrier, detect_identity, parse_stage,
    run_cards_and_summary, run_core_self, run_plot_essentials,
};
pub use parsing::{
    CoreSelfUpdate, ParseTier, Parsed, extract_json, parse_cards_response,
    parse_core_self_response, parse_identity_field, parse_plot_essentials_response,
    parse_summary_response, parse_text_field, recover_cards, regex_field, reparse_field,
    strict_cards, strict_field, unescape,
};
pub use processor::{Phase, RunOutcome, StoryProcessor, apply_report};
pub use prompts::{PreparedPrompt, PromptSet, PromptTemplate, Slot, SlotValues, hard_rules};
pub use retry::{BlankResponse, RetryOutcome, RetryPolicy, call_with_retry};
pub use sink::{Origin, ReportSender, ResultSink, StageResult, TaskReport};
pub use splitting::{DEFAULT_SPLIT_THRESHOLD, SplitReport, apply_splitting, minimum_context_length};
