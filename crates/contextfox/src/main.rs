//! ContextFox CLI binary.
//!
//! This binary provides command-line access to the extraction pipeline:
//! - Process a story file or a directory of parts
//! - Inspect, retry and export the results
//! - Browse models and presets

use clap::Parser;
use contextfox::{LoggingConfig, init_logging};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{
        Cli, Commands, ProcessOptions, export_cards, list_models, list_stories, process_story,
        resume_story, retry_task, show_cards, show_presets, show_status,
    };

    // The API key usually lives in .env
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut logging = LoggingConfig::new().with_json_logs(cli.json_logs);
    if cli.verbose {
        logging = logging.with_log_level("debug");
    }
    init_logging(logging)?;

    match cli.command {
        Commands::Process {
            story,
            source,
            cards,
            require_permission,
            no_split,
            preset,
        } => {
            let options = ProcessOptions {
                source,
                cards,
                require_permission,
                no_split,
                preset,
            };
            process_story(&story, options).await?;
        }

        Commands::Resume { story, preset } => {
            resume_story(&story, preset.as_deref()).await?;
        }

        Commands::Retry {
            story,
            task,
            prompt_file,
        } => {
            retry_task(&story, &task, prompt_file.as_deref()).await?;
        }

        Commands::Status { story, format } => {
            show_status(&story, format).await?;
        }

        Commands::List { format } => {
            list_stories(format).await?;
        }

        Commands::Cards { story, toggle } => {
            show_cards(&story, toggle.as_deref()).await?;
        }

        Commands::Export { story, out } => {
            export_cards(&story, out.as_deref()).await?;
        }

        Commands::Models { filter } => {
            list_models(filter.as_deref()).await?;
        }

        Commands::Presets { apply } => {
            show_presets(apply.as_deref()).await?;
        }
    }

    Ok(())
}
