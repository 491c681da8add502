//! Editing the working-directory `contextfox.toml`.

use contextfox_error::{ConfigError, ContextFoxResult, StorageError, StorageErrorKind};
use contextfox_pipeline::TaskModels;
use std::path::Path;
use tracing::{debug, instrument};

/// File name of the per-directory override layer.
pub const LOCAL_CONFIG_FILE: &str = "contextfox.toml";

/// Write `models` as `[models.tasks]` into the TOML file at `path`.
///
/// Every other key already in the file is preserved. A missing file is
/// created.
#[instrument(skip(models), fields(path = %path.display()))]
pub fn write_task_models(path: &Path, models: &TaskModels) -> ContextFoxResult<()> {
    let mut table = if path.exists() {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", path.display(), e)))
        })?;
        text.parse::<toml::Table>()
            .map_err(|e| ConfigError::new(format!("{}: {}", path.display(), e)))?
    } else {
        toml::Table::new()
    };

    let tasks = toml::Value::try_from(models)
        .map_err(|e| ConfigError::new(format!("Failed to encode task models: {}", e)))?;
    let models_entry = table
        .entry("models")
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    match models_entry {
        toml::Value::Table(models_table) => {
            models_table.insert("tasks".to_string(), tasks);
        }
        _ => {
            return Err(
                ConfigError::new(format!("{}: 'models' is not a table", path.display())).into(),
            );
        }
    }

    let text = toml::to_string_pretty(&table)
        .map_err(|e| ConfigError::new(format!("Failed to write configuration: {}", e)))?;
    std::fs::write(path, text).map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!("{}: {}", path.display(), e)))
    })?;
    debug!("Wrote task models");
    Ok(())
}
