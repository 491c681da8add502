//! Model catalog and preset handlers.

use super::setup::open_client;
use contextfox::{LOCAL_CONFIG_FILE, write_task_models};
use contextfox_core::TaskKind;
use contextfox_error::ContextFoxResult;
use contextfox_interface::ModelCatalog;
use contextfox_pipeline::{ContextFoxConfig, TaskModels};
use std::path::Path;
use strum::IntoEnumIterator;
use tracing::instrument;

/// Print the text models the provider offers, marking those the stages use.
#[instrument]
pub async fn list_models(filter: Option<&str>) -> ContextFoxResult<()> {
    let config = ContextFoxConfig::load()?;
    let client = open_client(&config)?;
    let in_use: Vec<&str> = config
        .models()
        .tasks()
        .all()
        .into_iter()
        .filter_map(|choice| choice.model_id())
        .collect();

    let models = client.list_models().await?;
    let mut shown = 0;
    for model in models
        .iter()
        .filter(|model| filter.is_none_or(|filter| model.id.contains(filter)))
    {
        let marker = if in_use.contains(&model.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {:>9}  {}", marker, model.context_length, model.id);
        shown += 1;
    }
    println!("Total: {} models (* = used by a stage)", shown);
    Ok(())
}

/// Print every preset, optionally saving one as the local stage models.
#[instrument]
pub async fn show_presets(apply: Option<&str>) -> ContextFoxResult<()> {
    let mut config = ContextFoxConfig::load()?;

    if let Some(name) = apply {
        config.apply_preset(name)?;
        write_task_models(Path::new(LOCAL_CONFIG_FILE), config.models().tasks())?;
        println!("Saved preset '{}' to {}", name, LOCAL_CONFIG_FILE);
    }

    let active = config.models().tasks();
    for (name, models) in config.models().presets() {
        let marker = if models == active { " (active)" } else { "" };
        println!("{}{}", name, marker);
        print_models(models);
    }
    Ok(())
}

fn print_models(models: &TaskModels) {
    for kind in TaskKind::iter() {
        println!("  {:<16} {}", kind.id_prefix(), models.for_kind(kind));
    }
}
