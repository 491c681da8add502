//! Tests for story persistence.

use contextfox_core::StoryCard;
use contextfox_interface::KeyValueStore;
use contextfox_storage::{FileKeyValueStore, MemoryKeyValueStore, StoryRecord, StoryRepository};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_file_store_set_get_remove() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileKeyValueStore::new(temp_dir.path().join("state"))?;

    assert_eq!(store.get("story:a").await?, None);
    store.set("story:a", "{}").await?;
    store.set("story:b", "[]").await?;
    store.set("settings", "x").await?;
    assert_eq!(store.get("story:a").await?.as_deref(), Some("{}"));
    assert_eq!(store.keys("story:").await?, vec!["story:a", "story:b"]);

    store.remove("story:a").await?;
    store.remove("story:a").await?;
    assert_eq!(store.get("story:a").await?, None);
    Ok(())
}

#[tokio::test]
async fn test_file_store_rejects_empty_key() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileKeyValueStore::new(temp_dir.path()).unwrap();
    assert!(store.set("", "x").await.is_err());
}

#[tokio::test]
async fn test_repository_round_trip_through_files() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let repo = StoryRepository::new(Arc::new(FileKeyValueStore::new(temp_dir.path())?));

    let mut record = StoryRecord::new("harbor");
    record.state.last_line = "The tide rose.".into();
    record.state.current_part = 3;
    record.exclusions.exclude("Docks");
    record.import_cards(vec![StoryCard::new("Mira", "character")]);
    repo.save(&record).await?;

    let loaded = repo.require("harbor").await?;
    assert_eq!(loaded, record);
    assert_eq!(repo.list().await?, vec!["harbor"]);
    Ok(())
}

#[tokio::test]
async fn test_missing_story_is_not_found() {
    let repo = StoryRepository::new(Arc::new(MemoryKeyValueStore::new()));
    assert!(repo.load("nope").await.unwrap().is_none());
    assert!(repo.require("nope").await.is_err());
    repo.delete("nope").await.unwrap();
}

#[tokio::test]
async fn test_corrupt_record_is_an_error() {
    let store = Arc::new(MemoryKeyValueStore::new());
    store.set("story:bad", "not json").await.unwrap();
    let repo = StoryRepository::new(store);
    assert!(repo.load("bad").await.is_err());
}
