//! ContextFox command-line support.
//!
//! The `contextfox` binary wires the pipeline to an OpenRouter client and a
//! file-backed story store. This library half holds the pieces that touch
//! the local filesystem so they can be tested without the binary:
//!
//! - [`load_story_content`] - a story file, or a directory of numbered parts
//! - [`load_cards`] / [`cards_to_json`] - card import and export
//! - [`write_task_models`] - saving a preset into the local `contextfox.toml`
//! - [`init_logging`] - `tracing` subscriber setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod content_loader;
mod local_config;
mod logging;

pub use content_loader::{cards_to_json, load_cards, load_story_content, part_files};
pub use local_config::{LOCAL_CONFIG_FILE, write_task_models};
pub use logging::{LoggingConfig, init_logging};
