//! Story command handlers.

use super::commands::OutputFormat;
use super::setup::{fetch_catalog, open_client, open_repository};
use contextfox::{cards_to_json, load_cards, load_story_content};
use contextfox_core::{StoryContent, TaskStatus};
use contextfox_error::{
    ConfigError, ContextFoxResult, JsonError, StorageError, StorageErrorKind,
};
use contextfox_pipeline::{ContextFoxConfig, RunOutcome, StoryProcessor};
use contextfox_storage::StoryRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument};

/// Options for [`process_story`].
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Story file or part directory
    pub source: Option<PathBuf>,
    /// Card export to import first
    pub cards: Option<PathBuf>,
    /// Stop between parts
    pub require_permission: bool,
    /// Disable the low-context split
    pub no_split: bool,
    /// Model preset for this run
    pub preset: Option<String>,
}

fn load_config(preset: Option<&str>) -> ContextFoxResult<ContextFoxConfig> {
    let mut config = ContextFoxConfig::load()?;
    if let Some(preset) = preset {
        config.apply_preset(preset)?;
    }
    Ok(config)
}

async fn open_processor(
    story: &str,
    config: &ContextFoxConfig,
) -> ContextFoxResult<(StoryProcessor, Arc<contextfox_models::OpenRouterClient>)> {
    let client = Arc::new(open_client(config)?);
    let processor = StoryProcessor::open(
        story,
        client.clone(),
        config.pipeline_settings()?,
        open_repository(config)?,
    )
    .await?;
    Ok((processor, client))
}

fn source_of(record: &StoryRecord) -> ContextFoxResult<PathBuf> {
    record.source.clone().ok_or_else(|| {
        ConfigError::new(format!(
            "Story '{}' has no source yet, pass --source",
            record.id
        ))
        .into()
    })
}

/// Process new content of a story.
#[instrument(skip(options))]
pub async fn process_story(story: &str, options: ProcessOptions) -> ContextFoxResult<()> {
    let mut config = load_config(options.preset.as_deref())?;
    if options.require_permission {
        config.set_require_permission(true);
    }
    if options.no_split {
        config.set_split_on_low_context(false);
    }

    let (mut processor, client) = open_processor(story, &config).await?;
    if let Some(source) = options.source {
        processor.record_mut().source = Some(source);
    }
    let source = source_of(processor.record())?;
    if let Some(cards) = &options.cards {
        let cards = load_cards(cards)?;
        info!(count = cards.len(), "Imported cards");
        processor.record_mut().import_cards(cards);
    }

    let content = load_story_content(&source)?;
    let catalog = if *config.processing().split_on_low_context() {
        fetch_catalog(client.as_ref()).await
    } else {
        Vec::new()
    };
    let content = processor.prepare_content(content, &catalog);

    let outcome = processor.process(&content).await;
    finish_run(&mut processor, &content, outcome).await
}

/// Continue a story stopped at the permission gate.
#[instrument]
pub async fn resume_story(story: &str, preset: Option<&str>) -> ContextFoxResult<()> {
    let config = load_config(preset)?;
    let (mut processor, _client) = open_processor(story, &config).await?;
    let source = source_of(processor.record())?;
    let content = processor.prepare_content(load_story_content(&source)?, &[]);

    let outcome = processor.resume(&content).await;
    finish_run(&mut processor, &content, outcome).await
}

async fn finish_run(
    processor: &mut StoryProcessor,
    content: &StoryContent,
    outcome: ContextFoxResult<RunOutcome>,
) -> ContextFoxResult<()> {
    processor.save().await?;
    for message in processor.status_messages() {
        println!("{}", message);
    }
    match outcome? {
        RunOutcome::AwaitingPermission { next_part } => println!(
            "Run `contextfox resume {}` to process part {}/{}.",
            processor.record().id,
            next_part,
            content.total_parts()
        ),
        RunOutcome::Done | RunOutcome::NoNewContent => {}
    }
    Ok(())
}

/// Re-run one finished task, optionally with an edited system prompt.
#[instrument(skip(prompt_file))]
pub async fn retry_task(story: &str, task: &str, prompt_file: Option<&Path>) -> ContextFoxResult<()> {
    let edited = prompt_file
        .map(|path| {
            std::fs::read_to_string(path).map_err(|e| {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })
        })
        .transpose()?;

    let config = load_config(None)?;
    let (mut processor, _client) = open_processor(story, &config).await?;
    let result = processor.retry_task(task, edited).await;
    for message in processor.status_messages() {
        println!("{}", message);
    }
    result
}

/// Print a story's progress and task board.
#[instrument]
pub async fn show_status(story: &str, format: OutputFormat) -> ContextFoxResult<()> {
    let config = ContextFoxConfig::load()?;
    let record = open_repository(&config)?.require(story).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&record)
                .map_err(|e| JsonError::new(e.to_string()))?;
            println!("{}", json);
        }
        OutputFormat::Human => {
            let state = &record.state;
            let excluded = state
                .accumulated_cards
                .iter()
                .filter(|card| record.exclusions.is_excluded(card))
                .count();
            println!("Story:       {}", record.name);
            println!("Title:       {}", or_unknown(&state.story_title));
            println!("Perspective: {}", or_unknown(&state.character));
            println!("Part:        {}", state.current_part);
            if let Some(next_part) = record.awaiting_part {
                println!("Waiting:     for permission to process part {}", next_part);
            }
            println!(
                "Cards:       {} ({} excluded)",
                state.accumulated_cards.len(),
                excluded
            );
            println!("Summary:     {} characters", state.accumulated_summary.len());
            println!("Plot notes:  {} characters", state.plot_essentials.len());
            if !record.tasks.is_empty() {
                println!("{:-<80}", "");
                for task in &record.tasks {
                    println!("{:<11} {:<32} {}", task.status, task.id, task.model);
                    if task.status == TaskStatus::Error {
                        println!("            {}", task.output);
                    }
                }
            }
        }
    }
    Ok(())
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        "(unknown)"
    } else {
        value
    }
}

/// List stored story ids.
pub async fn list_stories(format: OutputFormat) -> ContextFoxResult<()> {
    let config = ContextFoxConfig::load()?;
    let ids = open_repository(&config)?.list().await?;
    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&ids).map_err(|e| JsonError::new(e.to_string()))?;
            println!("{}", json);
        }
        OutputFormat::Human => {
            for id in &ids {
                println!("{}", id);
            }
            println!("Total: {} stories", ids.len());
        }
    }
    Ok(())
}

/// Print a story's cards, toggling one card's exclusion first.
#[instrument]
pub async fn show_cards(story: &str, toggle: Option<&str>) -> ContextFoxResult<()> {
    let config = ContextFoxConfig::load()?;
    let repository = open_repository(&config)?;
    let mut record = repository.require(story).await?;

    if let Some(title) = toggle {
        let card = record
            .state
            .accumulated_cards
            .iter()
            .find(|card| card.title == title)
            .cloned()
            .ok_or_else(|| {
                StorageError::new(StorageErrorKind::NotFound(format!("card '{}'", title)))
            })?;
        let excluded = record.exclusions.toggle(&card);
        repository.save(&record).await?;
        println!(
            "'{}' is now {}",
            title,
            if excluded { "excluded" } else { "included" }
        );
    }

    for card in &record.state.accumulated_cards {
        let marker = if record.exclusions.is_excluded(card) {
            "x"
        } else {
            " "
        };
        println!("[{}] {} ({})", marker, card.title, card.card_type);
    }
    Ok(())
}

/// Write a story's cards as a JSON array.
#[instrument]
pub async fn export_cards(story: &str, out: Option<&Path>) -> ContextFoxResult<()> {
    let config = ContextFoxConfig::load()?;
    let record = open_repository(&config)?.require(story).await?;
    let json = cards_to_json(&record.state.accumulated_cards)?;
    match out {
        Some(path) => {
            std::fs::write(path, json).map_err(|e| {
                StorageError::new(StorageErrorKind::FileWrite(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })?;
            println!(
                "Exported {} cards to {}",
                record.state.accumulated_cards.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
