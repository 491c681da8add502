//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the contextfox binary.

mod catalog;
mod commands;
mod setup;
mod story;

pub use catalog::{list_models, show_presets};
pub use commands::{Cli, Commands};
pub use story::{
    ProcessOptions, export_cards, list_stories, process_story, resume_story, retry_task,
    show_cards, show_status,
};
