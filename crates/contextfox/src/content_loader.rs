//! Loading story text and card exports from disk.

use contextfox_core::{StoryCard, StoryContent};
use contextfox_error::{ContextFoxResult, JsonError, StorageError, StorageErrorKind};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, instrument, warn};

static PART_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)").expect("Valid part number regex"));

/// Load story text from a file or a directory of part files.
///
/// A file becomes single content. A directory becomes partitioned content:
/// every file whose name contains a number is a part, ordered by the first
/// number in its name (`part-2.txt` before `part-10.txt`) and renumbered
/// from 1.
#[instrument(fields(path = %path.display()))]
pub fn load_story_content(path: &Path) -> ContextFoxResult<StoryContent> {
    if path.is_dir() {
        let parts = part_files(path)?;
        if parts.is_empty() {
            return Err(StorageError::new(StorageErrorKind::NotFound(format!(
                "no numbered part files in {}",
                path.display()
            )))
            .into());
        }
        let texts = parts
            .iter()
            .map(|(_, file)| read_text(file))
            .collect::<ContextFoxResult<Vec<_>>>()?;
        debug!(parts = texts.len(), "Loaded partitioned story");
        Ok(StoryContent::from_parts(texts))
    } else {
        let text = read_text(path)?;
        debug!(bytes = text.len(), "Loaded story");
        Ok(StoryContent::Single(text))
    }
}

/// Numbered files of a part directory, in part order.
pub fn part_files(dir: &Path) -> ContextFoxResult<Vec<(u64, PathBuf)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", dir.display(), e)))
    })?;

    let mut parts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", dir.display(), e)))
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let number = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| PART_NUMBER.captures(stem))
            .and_then(|caps| caps[1].parse::<u64>().ok());
        match number {
            Some(number) => parts.push((number, path)),
            None => warn!(file = %path.display(), "Skipping file without a part number"),
        }
    }
    parts.sort();
    Ok(parts)
}

/// Load a JSON array of story cards, e.g. a previous export.
#[instrument(fields(path = %path.display()))]
pub fn load_cards(path: &Path) -> ContextFoxResult<Vec<StoryCard>> {
    let text = read_text(path)?;
    let cards: Vec<StoryCard> = serde_json::from_str(&text)
        .map_err(|e| JsonError::new(format!("{}: {}", path.display(), e)))?;
    debug!(count = cards.len(), "Loaded story cards");
    Ok(cards)
}

/// Cards as the pretty-printed JSON array [`load_cards`] reads back.
pub fn cards_to_json(cards: &[StoryCard]) -> ContextFoxResult<String> {
    Ok(serde_json::to_string_pretty(cards)
        .map_err(|e| JsonError::new(format!("Failed to serialize cards: {}", e)))?)
}

fn read_text(path: &Path) -> ContextFoxResult<String> {
    Ok(std::fs::read_to_string(path).map_err(|e| {
        StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", path.display(), e)))
    })?)
}
