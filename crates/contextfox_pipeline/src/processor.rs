//! Per-story orchestration.
//!
//! A run moves through
//! `Idle -> DetectingIdentity -> GeneratingCardsAndSummary ->
//! GeneratingPlotAndCoreSelf -> PartComplete` for every part, then either
//! continues with the next part, stops at the permission gate, or finishes.
//! Processing state is only written here, from drained [`TaskReport`]s,
//! and is committed once per part.

use crate::board::{SharedBoard, TaskBoard, with_board};
use crate::cards::{apply_core_self_updates, finalize_cards, separate_cards};
use crate::config::PipelineSettings;
use crate::content::{extract_new_content, part_indicator};
use crate::executors::{
    ExecutionContext, StageInput, TaskRetrier, detect_identity, run_cards_and_summary,
    run_core_self, run_plot_essentials,
};
use crate::sink::{ResultSink, StageResult, TaskReport};
use crate::splitting::{apply_splitting, minimum_context_length};
use contextfox_core::{ExclusionState, ModelInfo, ProcessingState, StoryContent};
use contextfox_error::{ContextFoxResult, PipelineError, PipelineErrorKind};
use contextfox_interface::CompletionDriver;
use contextfox_storage::{StoryRecord, StoryRepository};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Where a processor stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Phase {
    /// Not running
    Idle,
    /// Perspective and title detection
    DetectingIdentity,
    /// Cards and summary
    GeneratingCardsAndSummary,
    /// Plot essentials and core self
    GeneratingPlotAndCoreSelf,
    /// Part committed
    PartComplete,
    /// Stopped before the next part until resumed
    AwaitingPermission,
    /// Nothing left to process
    Done,
}

/// How a call to [`StoryProcessor::process`] or
/// [`StoryProcessor::resume`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every available part was processed
    Done,
    /// Stopped at the permission gate
    AwaitingPermission {
        /// Part that [`StoryProcessor::resume`] will process
        next_part: u32,
    },
    /// Extraction found nothing new
    NoNewContent,
}

/// Apply one report to `state`.
///
/// Card updates aimed at excluded cards are dropped. Blank summaries and
/// plot notes keep the previous text.
pub fn apply_report(state: &mut ProcessingState, exclusions: &ExclusionState, report: TaskReport) {
    let task = report.task_id.as_str();
    match report.result {
        StageResult::Perspective(Some(character)) => {
            debug!(task, %character, "Perspective detected");
            state.character = character;
        }
        StageResult::Title(Some(title)) => {
            debug!(task, %title, "Title detected");
            state.story_title = title;
        }
        StageResult::Perspective(None) | StageResult::Title(None) => {
            warn!(task, "Identity response had no usable value");
        }
        StageResult::Cards(updates) => {
            debug!(task, count = updates.len(), "Merging cards");
            let separated = separate_cards(&state.accumulated_cards, exclusions);
            state.accumulated_cards = finalize_cards(separated, updates);
        }
        StageResult::Summary(summary) if summary.trim().is_empty() => {
            warn!(task, "Blank summary, keeping the previous one");
        }
        StageResult::Summary(summary) => state.accumulated_summary = summary,
        StageResult::PlotEssentials(notes) if notes.trim().is_empty() => {
            warn!(task, "Blank plot essentials, keeping the previous notes");
        }
        StageResult::PlotEssentials(notes) => state.plot_essentials = notes,
        StageResult::CoreSelf(updates) => {
            let applied = apply_core_self_updates(&mut state.accumulated_cards, &updates);
            debug!(task, applied, "Applied core self updates");
        }
        StageResult::Failed(reason) => debug!(task, %reason, "Task reported failure"),
    }
}

/// Drives the pipeline for one story.
pub struct StoryProcessor {
    ctx: ExecutionContext,
    repository: StoryRepository,
    record: StoryRecord,
    sink: ResultSink,
    phase: Phase,
    status: Vec<String>,
}

impl std::fmt::Debug for StoryProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryProcessor")
            .field("story", &self.record.id)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl StoryProcessor {
    /// Load (or start) a story and prepare a processor for it.
    #[instrument(skip(driver, settings, repository))]
    pub async fn open(
        story_id: &str,
        driver: Arc<dyn CompletionDriver>,
        settings: PipelineSettings,
        repository: StoryRepository,
    ) -> ContextFoxResult<Self> {
        let record = repository.load_or_create(story_id).await?;
        let mut board = TaskBoard::default();
        for task in &record.tasks {
            board.upsert(task.clone());
        }
        let sink = ResultSink::new();
        let ctx = ExecutionContext::new(
            driver,
            Arc::new(settings),
            Arc::new(Mutex::new(board)),
            sink.sender(),
        );
        let phase = if record.awaiting_part.is_some() {
            Phase::AwaitingPermission
        } else {
            Phase::Idle
        };
        debug!(part = record.state.current_part, %phase, "Opened story");
        Ok(Self {
            ctx,
            repository,
            record,
            sink,
            phase,
            status: Vec::new(),
        })
    }

    /// The story as last committed.
    pub fn record(&self) -> &StoryRecord {
        &self.record
    }

    /// Edit the record, e.g. to import cards or toggle exclusions. Call
    /// [`save`](Self::save) afterwards.
    pub fn record_mut(&mut self) -> &mut StoryRecord {
        &mut self.record
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Status lines produced so far.
    pub fn status_messages(&self) -> &[String] {
        &self.status
    }

    /// Live task board.
    pub fn board(&self) -> SharedBoard {
        Arc::clone(self.ctx.board())
    }

    /// A retrier whose results this processor will pick up.
    pub fn retrier(&self) -> TaskRetrier {
        TaskRetrier::new(self.ctx.clone())
    }

    fn status(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(story = %self.record.id, "{}", message);
        self.status.push(message);
    }

    /// Persist the record together with the task board.
    pub async fn save(&mut self) -> ContextFoxResult<()> {
        self.record.tasks = with_board(self.ctx.board(), |board| board.tasks().to_vec());
        self.repository.save(&self.record).await
    }

    /// Split content for small-context models.
    ///
    /// The split decision is taken once, before the first part is
    /// processed, and remembered so later runs see the same part
    /// numbering.
    pub fn prepare_content(&mut self, content: StoryContent, catalog: &[ModelInfo]) -> StoryContent {
        let settings = self.ctx.settings();
        let (content, report) = if self.record.split_min_context > 0 {
            apply_splitting(content, self.record.split_min_context, u64::MAX)
        } else if *settings.split_on_low_context() && self.is_fresh() {
            let min = minimum_context_length(settings.task_models().all(), catalog);
            apply_splitting(content, min, *settings.context_split_threshold())
        } else {
            (content, None)
        };
        if let Some(report) = report {
            self.record.split_min_context = report.min_context;
            self.status(report.message());
        }
        self.record.partitioned = content.is_partitioned();
        content
    }

    fn is_fresh(&self) -> bool {
        let state = &self.record.state;
        state.current_part == 1 && state.last_line.is_empty() && state.accumulated_summary.is_empty()
    }

    /// Process new content, part after part.
    ///
    /// A story stopped at the permission gate stays there until
    /// [`resume`](Self::resume) is called.
    #[instrument(skip_all, fields(story = %self.record.id))]
    pub async fn process(&mut self, content: &StoryContent) -> ContextFoxResult<RunOutcome> {
        if let Some(next_part) = self.record.awaiting_part {
            self.phase = Phase::AwaitingPermission;
            self.status(format!(
                "Waiting for permission to process part {}/{}",
                next_part,
                content.total_parts()
            ));
            return Ok(RunOutcome::AwaitingPermission { next_part });
        }
        self.run(content).await
    }

    /// Continue past the permission gate with the next part.
    #[instrument(skip_all, fields(story = %self.record.id))]
    pub async fn resume(&mut self, content: &StoryContent) -> ContextFoxResult<RunOutcome> {
        let next_part = self.record.awaiting_part.ok_or_else(|| {
            PipelineError::new(PipelineErrorKind::InvalidTransition(format!(
                "story '{}' is not waiting for permission",
                self.record.id
            )))
        })?;
        if content.part(next_part).is_none() {
            return Err(PipelineError::new(PipelineErrorKind::PartNotFound(next_part)).into());
        }
        self.record.awaiting_part = None;
        self.record.state.current_part = next_part;
        self.record.state.last_line.clear();
        self.run(content).await
    }

    /// Re-run a finished task and apply its result as a correction.
    #[instrument(skip(self, edited_prompt), fields(story = %self.record.id))]
    pub async fn retry_task(
        &mut self,
        task_id: &str,
        edited_prompt: Option<String>,
    ) -> ContextFoxResult<()> {
        let result = self.retrier().retry(task_id, edited_prompt).await;
        let mut state = self.record.state.clone();
        self.apply_pending(&mut state);
        self.record.state = state;
        self.save().await?;
        match &result {
            Ok(()) => self.status(format!("Retried {}", task_id)),
            Err(e) => self.status(format!("Retry of {} failed: {}", task_id, e)),
        }
        result
    }

    async fn run(&mut self, content: &StoryContent) -> ContextFoxResult<RunOutcome> {
        loop {
            if let Some(outcome) = self.process_part(content).await? {
                return Ok(outcome);
            }
        }
    }

    fn apply_pending(&mut self, state: &mut ProcessingState) {
        for report in self.sink.drain() {
            apply_report(state, &self.record.exclusions, report);
        }
    }

    /// Process one part. `None` means the next part should follow.
    async fn process_part(&mut self, content: &StoryContent) -> ContextFoxResult<Option<RunOutcome>> {
        self.phase = Phase::Idle;
        let extraction = match extract_new_content(
            content,
            &self.record.state.last_line,
            self.record.state.current_part,
        ) {
            Ok(extraction) => extraction,
            Err(e) if e.kind == PipelineErrorKind::NoNewContent => {
                self.phase = Phase::Done;
                self.status("No new content to process");
                return Ok(Some(RunOutcome::NoNewContent));
            }
            Err(e) => return Err(e.into()),
        };

        let part = extraction.new_part;
        let total = content.total_parts();
        let indicator = part_indicator(content, part);
        let mut working = self.record.state.clone();
        if part != working.current_part {
            working.current_part = part;
            working.last_line.clear();
        }
        self.sink.reset();
        with_board(self.ctx.board(), TaskBoard::clear);
        self.status(format!("Processing part {}/{}", part, total));

        if part == 1 && !working.identity_known() {
            self.phase = Phase::DetectingIdentity;
            detect_identity(&self.ctx, self.input(&indicator, &extraction.content, &working)).await;
            self.apply_pending(&mut working);
        }

        self.phase = Phase::GeneratingCardsAndSummary;
        let generated =
            run_cards_and_summary(&self.ctx, self.input(&indicator, &extraction.content, &working))
                .await;
        if let Err(e) = generated {
            // The stage is not committed. Explicit retries still apply.
            for report in self.sink.drain_retries() {
                apply_report(&mut self.record.state, &self.record.exclusions, report);
            }
            self.phase = Phase::Idle;
            self.status(format!("Summary failed: {}", e.kind));
            self.save().await?;
            return Err(e.into());
        }
        self.apply_pending(&mut working);

        self.phase = Phase::GeneratingPlotAndCoreSelf;
        {
            let input = self.input(&indicator, &extraction.content, &working);
            futures::join!(
                run_plot_essentials(&self.ctx, input),
                run_core_self(&self.ctx, input)
            );
        }
        self.apply_pending(&mut working);

        self.phase = Phase::PartComplete;
        working.last_line = extraction.new_last_line;
        self.record.state = working;
        let more_parts = content.is_partitioned() && part < total;
        let gated = more_parts && *self.ctx.settings().require_permission_between_parts();
        if gated {
            self.record.awaiting_part = Some(part + 1);
        }
        self.save().await?;

        if !more_parts {
            self.phase = Phase::Done;
            self.status("Processing complete!");
            return Ok(Some(RunOutcome::Done));
        }
        if gated {
            self.phase = Phase::AwaitingPermission;
            self.status(format!(
                "Part {}/{} complete. Waiting for permission to continue.",
                part, total
            ));
            return Ok(Some(RunOutcome::AwaitingPermission {
                next_part: part + 1,
            }));
        }
        self.status(format!(
            "Part {}/{} complete. Continuing with part {}.",
            part,
            total,
            part + 1
        ));
        Ok(None)
    }

    fn input<'a>(
        &'a self,
        part_indicator: &'a str,
        content: &'a str,
        state: &'a ProcessingState,
    ) -> StageInput<'a> {
        StageInput {
            part_indicator,
            content,
            state,
            exclusions: &self.record.exclusions,
        }
    }
}
