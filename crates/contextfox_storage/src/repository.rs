//! Story records on top of any key/value store.

use contextfox_core::{ExclusionState, ProcessingState, StoryCard, Task};
use contextfox_error::{ContextFoxResult, JsonError, StorageError, StorageErrorKind};
use contextfox_interface::KeyValueStore;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};

const STORY_PREFIX: &str = "story:";

/// Everything persisted for one story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    /// Story id, also the storage key suffix
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Pipeline progress
    #[serde(default)]
    pub state: ProcessingState,
    /// Card exclusion overrides
    #[serde(default)]
    pub exclusions: ExclusionState,
    /// Where the story text was loaded from
    #[serde(default)]
    pub source: Option<PathBuf>,
    /// Whether the text is split into parts
    #[serde(default)]
    pub partitioned: bool,
    /// Context length that triggered a split, 0 when unsplit
    #[serde(default)]
    pub split_min_context: u64,
    /// Next part, when the run stopped at the permission gate
    #[serde(default)]
    pub awaiting_part: Option<u32>,
    /// Tasks of the most recent runs, kept for inspection and retry
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl StoryRecord {
    /// A fresh story at part 1 with nothing accumulated.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            state: ProcessingState::default(),
            exclusions: ExclusionState::default(),
            source: None,
            partitioned: false,
            split_min_context: 0,
            awaiting_part: None,
            tasks: Vec::new(),
        }
    }

    /// Replace the card list, e.g. from an imported export.
    pub fn import_cards(&mut self, cards: Vec<StoryCard>) {
        self.state.accumulated_cards = cards;
    }
}

/// Loads and saves [`StoryRecord`]s as JSON.
#[derive(Clone, Getters)]
pub struct StoryRepository {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for StoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryRepository").finish_non_exhaustive()
    }
}

impl StoryRepository {
    /// Wrap a store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(id: &str) -> String {
        format!("{STORY_PREFIX}{id}")
    }

    /// Load a story, `None` if it was never saved.
    #[instrument(skip(self))]
    pub async fn load(&self, id: &str) -> ContextFoxResult<Option<StoryRecord>> {
        let Some(raw) = self.store.get(&Self::key(id)).await? else {
            debug!("No stored record");
            return Ok(None);
        };
        let record = serde_json::from_str(&raw).map_err(|e| {
            StorageError::new(StorageErrorKind::Corrupt(format!("story {}: {}", id, e)))
        })?;
        Ok(Some(record))
    }

    /// Load a story that must exist.
    pub async fn require(&self, id: &str) -> ContextFoxResult<StoryRecord> {
        self.load(id).await?.ok_or_else(|| {
            StorageError::new(StorageErrorKind::NotFound(format!("story {}", id))).into()
        })
    }

    /// Load a story or start a new one.
    pub async fn load_or_create(&self, id: &str) -> ContextFoxResult<StoryRecord> {
        Ok(self
            .load(id)
            .await?
            .unwrap_or_else(|| StoryRecord::new(id)))
    }

    /// Save a story, replacing any previous record.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn save(&self, record: &StoryRecord) -> ContextFoxResult<()> {
        let contents = serde_json::to_string_pretty(record)
            .map_err(|e| JsonError::new(format!("Failed to serialize story: {}", e)))?;
        self.store.set(&Self::key(&record.id), &contents).await?;
        debug!(
            part = record.state.current_part,
            cards = record.state.accumulated_cards.len(),
            "Saved story"
        );
        Ok(())
    }

    /// Delete a story. Deleting an unknown story is not an error.
    pub async fn delete(&self, id: &str) -> ContextFoxResult<()> {
        self.store.remove(&Self::key(id)).await
    }

    /// Ids of all stored stories, sorted.
    pub async fn list(&self) -> ContextFoxResult<Vec<String>> {
        Ok(self
            .store
            .keys(STORY_PREFIX)
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(STORY_PREFIX).map(str::to_string))
            .collect())
    }
}
