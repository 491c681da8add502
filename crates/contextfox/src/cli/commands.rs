//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ContextFox - story cards, summaries and plot notes for AI Dungeon
#[derive(Parser, Debug)]
#[command(name = "contextfox")]
#[command(about = "Extract AI Dungeon story cards, summaries and plot essentials from long stories", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process new story content
    Process {
        /// Story id
        story: String,

        /// Story file, or a directory of numbered part files. Defaults to
        /// the source used last time.
        #[arg(long)]
        source: Option<PathBuf>,

        /// Replace the story's cards with a JSON card export first
        #[arg(long)]
        cards: Option<PathBuf>,

        /// Stop after each part until `resume` is run
        #[arg(long)]
        require_permission: bool,

        /// Never split content for small-context models
        #[arg(long)]
        no_split: bool,

        /// Use a model preset for this run
        #[arg(long)]
        preset: Option<String>,
    },

    /// Continue a story waiting for permission
    Resume {
        /// Story id
        story: String,

        /// Use a model preset for this run
        #[arg(long)]
        preset: Option<String>,
    },

    /// Re-run one task and apply its result
    Retry {
        /// Story id
        story: String,

        /// Task id, e.g. "summary (2/5)"
        task: String,

        /// Replace the task's system prompt with this file's contents
        #[arg(long)]
        prompt_file: Option<PathBuf>,
    },

    /// Show a story's progress and tasks
    Status {
        /// Story id
        story: String,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// List stored stories
    List {
        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Show a story's cards or toggle a card's exclusion
    Cards {
        /// Story id
        story: String,

        /// Flip the exclusion of the card with this title
        #[arg(long)]
        toggle: Option<String>,
    },

    /// Write a story's cards as a JSON array
    Export {
        /// Story id
        story: String,

        /// Output file, stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List available models with their context lengths
    Models {
        /// Only models whose id contains this text
        #[arg(long)]
        filter: Option<String>,
    },

    /// Show model presets
    Presets {
        /// Save a preset as the stage models in ./contextfox.toml
        #[arg(long)]
        apply: Option<String>,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
