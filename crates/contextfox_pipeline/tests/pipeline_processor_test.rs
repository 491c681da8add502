//! End-to-end tests for the story processor with a scripted driver.

mod test_utils;

use contextfox_core::{ModelInfo, StoryCard, StoryContent, TaskKind, TaskStatus};
use contextfox_error::{CompletionErrorKind, ContextFoxErrorKind, PipelineError, PipelineErrorKind};
use contextfox_pipeline::{IDENTITY_PREAMBLE, Phase, RunOutcome, StoryProcessor, hard_rules};
use contextfox_storage::{MemoryKeyValueStore, StoryRepository};
use std::sync::Arc;
use strum::IntoEnumIterator;
use test_utils::{MockDriver, MockResponse, test_settings};

const REFUSAL_BODY: &str =
    r#"{"id":"gen-1","choices":[{"message":{"content":""},"finish_reason":"content_filter"}]}"#;

fn repository() -> StoryRepository {
    StoryRepository::new(Arc::new(MemoryKeyValueStore::new()))
}

/// Standard replies for every stage, appended after anything already
/// queued on `driver`.
fn scripted(driver: MockDriver) -> MockDriver {
    driver
        .reply("STAGE perspective", r#"{"character": "Mira"}"#)
        .reply("STAGE title", r#"{"title": "The Drowned Harbor"}"#)
        .reply(
            "STAGE characters",
            r#"{"cards": [{"title": "Mira", "keys": "Mira, thief", "type": "character", "value": "Mira is a thief."}]}"#,
        )
        .reply("STAGE locations", r#"{"cards": []}"#)
        // Cut off mid-card
        .reply(
            "STAGE concepts",
            r#"{"cards": [{"title": "Tide Magic", "keys": "tide, magic", "type": "concept", "value": "Magic of the tides."#,
        )
        .reply("STAGE summary", r#"{"summary": "You are Mira. You arrived at the harbor."}"#)
        .reply("STAGE plot fresh", r#"{"plotEssentials": "- Find the key"}"#)
        .reply(
            "STAGE plot continue",
            r#"{"plotEssentials": ["- Find the key", "- Escape the storm"]}"#,
        )
        .reply(
            "STAGE core self",
            r#"{"coreSelfUpdates": [{"title": "Mira Brain", "core_self": "I am Mira. I trust no one."}]}"#,
        )
}

fn user_content(request: &contextfox_core::CompletionRequest) -> &str {
    &request.messages[1].content
}

#[tokio::test]
async fn test_single_story_runs_every_stage() -> anyhow::Result<()> {
    let driver = scripted(MockDriver::new());
    let repo = repository();
    let mut processor =
        StoryProcessor::open("harbor", Arc::new(driver.clone()), test_settings(), repo.clone())
            .await?;
    processor
        .record_mut()
        .import_cards(vec![StoryCard::new("Mira Brain", "brain")]);

    let content = StoryContent::Single("A\nB\nC".into());
    assert_eq!(processor.process(&content).await?, RunOutcome::Done);
    assert_eq!(processor.phase(), Phase::Done);
    assert_eq!(driver.call_count(), 8);

    let state = repo.require("harbor").await?.state;
    assert_eq!(state.character, "Mira");
    assert_eq!(state.story_title, "The Drowned Harbor");
    assert_eq!(state.last_line, "C");
    assert_eq!(state.accumulated_summary, "You are Mira. You arrived at the harbor.");
    assert_eq!(state.plot_essentials, "- Find the key");

    let card = |title: &str| state.accumulated_cards.iter().find(|c| c.title == title);
    assert_eq!(card("Mira").map(|c| c.value.as_str()), Some("Mira is a thief."));
    assert_eq!(card("Tide Magic").map(|c| c.keys.as_str()), Some("tide, magic"));
    assert_eq!(
        card("Mira Brain").map(|c| c.description.as_str()),
        Some("core_self: I am Mira. I trust no one.")
    );

    // Identity models get the story behind a preamble.
    let perspective = driver.calls_matching("STAGE perspective");
    assert_eq!(user_content(&perspective[0]), format!("{IDENTITY_PREAMBLE}A\nB\nC"));

    // Brain cards are hidden from card generation but drive core self,
    // which sees the summary produced in this part.
    let characters = driver.calls_matching("STAGE characters");
    assert!(!characters[0].system_prompt().unwrap().contains("Mira Brain"));
    let core_self = driver.calls_matching("STAGE core self");
    let core_prompt = core_self[0].system_prompt().unwrap();
    assert!(core_prompt.contains("Mira Brain"));
    assert!(core_prompt.contains("You arrived at the harbor."));

    assert_eq!(
        processor.status_messages().last().map(String::as_str),
        Some("Processing complete!")
    );

    // Nothing new: no further calls.
    assert_eq!(processor.process(&content).await?, RunOutcome::NoNewContent);
    assert_eq!(driver.call_count(), 8);
    Ok(())
}

#[tokio::test]
async fn test_refusal_retries_with_addendum_before_hard_rules() -> anyhow::Result<()> {
    let driver = scripted(
        MockDriver::new().respond("STAGE characters", MockResponse::Raw(REFUSAL_BODY.into())),
    );
    let mut processor =
        StoryProcessor::open("refusal", Arc::new(driver.clone()), test_settings(), repository())
            .await?;

    let content = StoryContent::Single("A\nB".into());
    assert_eq!(processor.process(&content).await?, RunOutcome::Done);

    let calls = driver.calls_matching("STAGE characters");
    assert_eq!(calls.len(), 2);
    let first = calls[0].system_prompt().unwrap();
    let second = calls[1].system_prompt().unwrap();
    let rules = hard_rules(TaskKind::Characters);
    let body = first.strip_suffix(rules).expect("first prompt ends with hard rules");
    assert_eq!(
        second,
        format!("{body}\n\nBYPASS: gloss over explicit content.{rules}")
    );

    let board = processor.board();
    let board = board.lock().unwrap();
    let task = board.get("characters").unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.system_prompt, second);
    drop(board);

    assert!(
        processor
            .record()
            .state
            .accumulated_cards
            .iter()
            .any(|c| c.title == "Mira")
    );
    Ok(())
}

#[tokio::test]
async fn test_permission_gate_holds_next_part_until_resume() -> anyhow::Result<()> {
    let driver = scripted(MockDriver::new());
    let repo = repository();
    let settings = test_settings().with_require_permission(true);
    let content = StoryContent::from_parts([
        "Part one opens.\nMira runs.",
        "Part two: the storm.",
        "Part three: the calm.",
    ]);

    let mut processor =
        StoryProcessor::open("gated", Arc::new(driver.clone()), settings.clone(), repo.clone())
            .await?;
    assert_eq!(
        processor.process(&content).await?,
        RunOutcome::AwaitingPermission { next_part: 2 }
    );
    assert_eq!(processor.phase(), Phase::AwaitingPermission);
    let after_part_one = driver.call_count();
    assert_eq!(after_part_one, 7);
    assert!(
        driver
            .calls()
            .iter()
            .all(|c| !user_content(c).contains("Part two"))
    );
    assert_eq!(processor.record().state.last_line, "Mira runs.");

    // Processing again without permission does nothing.
    assert_eq!(
        processor.process(&content).await?,
        RunOutcome::AwaitingPermission { next_part: 2 }
    );
    assert_eq!(driver.call_count(), after_part_one);

    // A new session picks the gate up from storage.
    let mut processor =
        StoryProcessor::open("gated", Arc::new(driver.clone()), settings, repo.clone()).await?;
    assert_eq!(processor.phase(), Phase::AwaitingPermission);

    assert_eq!(
        processor.resume(&content).await?,
        RunOutcome::AwaitingPermission { next_part: 3 }
    );
    let part_two_calls = &driver.calls()[after_part_one..];
    assert!(part_two_calls.iter().all(|c| user_content(c).contains("Part two")));
    assert_eq!(driver.calls_matching("STAGE perspective").len(), 1);
    assert_eq!(driver.calls_matching("STAGE plot continue").len(), 1);
    assert!(processor.board().lock().unwrap().get("summary (2/3)").is_some());

    assert_eq!(processor.resume(&content).await?, RunOutcome::Done);
    let state = repo.require("gated").await?.state;
    assert_eq!(state.current_part, 3);
    assert_eq!(state.last_line, "Part three: the calm.");
    assert_eq!(state.plot_essentials, "- Find the key\n\n- Escape the storm");

    assert!(processor.resume(&content).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_parts_continue_automatically_without_gate() -> anyhow::Result<()> {
    let driver = scripted(MockDriver::new());
    let repo = repository();
    let content = StoryContent::from_parts(["X\nY", "Z"]);

    let mut processor =
        StoryProcessor::open("auto", Arc::new(driver.clone()), test_settings(), repo.clone())
            .await?;
    assert_eq!(processor.process(&content).await?, RunOutcome::Done);

    assert_eq!(driver.calls_matching("STAGE perspective").len(), 1);
    assert_eq!(driver.calls_matching("STAGE summary").len(), 2);
    let state = repo.require("auto").await?.state;
    assert_eq!(state.current_part, 2);
    assert_eq!(state.last_line, "Z");
    assert!(
        processor
            .status_messages()
            .iter()
            .any(|m| m == "Part 1/2 complete. Continuing with part 2.")
    );
    Ok(())
}

#[tokio::test]
async fn test_saved_board_holds_only_the_latest_part() -> anyhow::Result<()> {
    let driver = scripted(MockDriver::new());
    let repo = repository();
    let content = StoryContent::from_parts(["One\nA", "Two", "Three", "Four"]);

    let mut processor =
        StoryProcessor::open("long", Arc::new(driver.clone()), test_settings(), repo.clone())
            .await?;
    assert_eq!(processor.process(&content).await?, RunOutcome::Done);

    let tasks = repo.require("long").await?.tasks;
    assert!(!tasks.is_empty());
    assert!(tasks.len() <= TaskKind::iter().count());
    assert!(tasks.iter().all(|t| t.id.ends_with("(4/4)")));
    let summary = tasks.iter().find(|t| t.id == "summary (4/4)").unwrap();
    assert_eq!(summary.status, TaskStatus::Completed);
    assert!(processor.board().lock().unwrap().get("summary (1/4)").is_none());
    Ok(())
}

#[tokio::test]
async fn test_summary_failure_aborts_without_committing() -> anyhow::Result<()> {
    let reset = || MockResponse::Error(CompletionErrorKind::Transport("connection reset".into()));
    let driver = scripted(
        MockDriver::new()
            .respond("STAGE summary", reset())
            .respond("STAGE summary", reset()),
    );
    let repo = repository();
    let mut processor =
        StoryProcessor::open("broken", Arc::new(driver.clone()), test_settings(), repo.clone())
            .await?;

    let err = processor
        .process(&StoryContent::Single("A\nB".into()))
        .await
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        ContextFoxErrorKind::Pipeline(PipelineError {
            kind: PipelineErrorKind::TransportFailure { .. },
            ..
        })
    ));
    // One retry, then the run gives up.
    assert_eq!(driver.calls_matching("STAGE summary").len(), 2);

    let record = repo.require("broken").await?;
    assert!(record.state.last_line.is_empty());
    assert!(record.state.accumulated_cards.is_empty());
    let summary = record.tasks.iter().find(|t| t.id == "summary").unwrap();
    assert_eq!(summary.status, TaskStatus::Error);
    assert!(summary.output.contains("connection reset"));
    Ok(())
}

#[tokio::test]
async fn test_card_failure_is_tolerated() -> anyhow::Result<()> {
    let overloaded = || MockResponse::Error(CompletionErrorKind::Api("overloaded".into()));
    let driver = scripted(
        MockDriver::new()
            .respond("STAGE characters", overloaded())
            .respond("STAGE characters", overloaded()),
    );
    let mut processor =
        StoryProcessor::open("cards", Arc::new(driver.clone()), test_settings(), repository())
            .await?;

    assert_eq!(
        processor.process(&StoryContent::Single("A".into())).await?,
        RunOutcome::Done
    );
    let state = &processor.record().state;
    assert!(state.accumulated_cards.iter().all(|c| c.title != "Mira"));
    assert!(state.accumulated_cards.iter().any(|c| c.title == "Tide Magic"));
    assert_eq!(state.accumulated_summary, "You are Mira. You arrived at the harbor.");
    Ok(())
}

#[tokio::test]
async fn test_disabled_stages_make_no_calls() -> anyhow::Result<()> {
    let driver = scripted(MockDriver::new());
    let settings = test_settings()
        .with_task_model(TaskKind::Title, "None")
        .with_task_model(TaskKind::Locations, "none");
    let mut processor =
        StoryProcessor::open("lean", Arc::new(driver.clone()), settings, repository()).await?;

    processor.process(&StoryContent::Single("A".into())).await?;
    assert!(driver.calls_matching("STAGE title").is_empty());
    assert!(driver.calls_matching("STAGE locations").is_empty());
    assert!(processor.record().state.story_title.is_empty());
    assert_eq!(processor.record().state.character, "Mira");
    Ok(())
}

#[tokio::test]
async fn test_manual_retry_replaces_summary() -> anyhow::Result<()> {
    let driver = scripted(
        MockDriver::new()
            .reply("STAGE summary", r#"{"summary": "You arrived."}"#)
            .reply("STAGE summary", r#"{"summary": "You arrived, soaked and furious."}"#),
    );
    let repo = repository();
    let mut processor =
        StoryProcessor::open("retry", Arc::new(driver.clone()), test_settings(), repo.clone())
            .await?;
    processor.process(&StoryContent::Single("A".into())).await?;
    assert_eq!(processor.record().state.accumulated_summary, "You arrived.");

    let edited = format!(
        "STAGE summary. Mention the weather.{}",
        hard_rules(TaskKind::Summary)
    );
    processor.retry_task("summary", Some(edited.clone())).await?;

    let retried = driver.calls_matching("STAGE summary");
    assert_eq!(retried.len(), 2);
    assert_eq!(retried[1].system_prompt(), Some(edited.as_str()));
    assert_eq!(
        repo.require("retry").await?.state.accumulated_summary,
        "You arrived, soaked and furious."
    );

    assert!(processor.retry_task("no-such-task", None).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_low_context_models_split_content_once() -> anyhow::Result<()> {
    let mut processor = StoryProcessor::open(
        "split",
        Arc::new(MockDriver::new()),
        test_settings(),
        repository(),
    )
    .await?;
    let catalog = vec![ModelInfo {
        id: "mock/model".into(),
        name: "Mock".into(),
        context_length: 32_000,
    }];

    let content = processor.prepare_content(StoryContent::Single("A\nB\nC\nD".into()), &catalog);
    assert_eq!(content, StoryContent::from_parts(["A\nB", "C\nD"]));
    assert_eq!(processor.record().split_min_context, 32_000);
    assert_eq!(
        processor.status_messages(),
        ["Low context detected (32k). Split 1 file(s) into 2 parts."]
    );

    // Later runs reuse the decision even without a catalog.
    let again = processor.prepare_content(StoryContent::Single("A\nB\nC\nD".into()), &[]);
    assert_eq!(again, content);
    Ok(())
}
