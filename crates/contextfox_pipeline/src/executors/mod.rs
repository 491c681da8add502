//! Stage executors.
//!
//! Each executor renders its prompt, runs the call through
//! [`call_with_retry`](crate::call_with_retry), parses the reply and sends
//! a [`TaskReport`] to the result sink. Executors never touch
//! [`ProcessingState`]; the processor applies reports at stage boundaries.

mod core_self;
mod generation;
mod identity;
mod plot;
mod retrier;

pub use core_self::run_core_self;
pub use generation::run_cards_and_summary;
pub use identity::{IDENTITY_PREAMBLE, detect_identity};
pub use plot::run_plot_essentials;
pub use retrier::TaskRetrier;

use crate::board::{SharedBoard, with_board};
use crate::config::PipelineSettings;
use crate::parsing::{
    parse_cards_response, parse_core_self_response, parse_identity_field,
    parse_plot_essentials_response, parse_summary_response,
};
use crate::prompts::{PreparedPrompt, SlotValues};
use crate::retry::{RetryOutcome, call_with_retry};
use crate::sink::{Origin, ReportSender, StageResult, TaskReport};
use contextfox_core::{CompletionRequest, ExclusionState, ProcessingState, Task, TaskKind};
use contextfox_error::{ContextFoxError, PipelineError, PipelineErrorKind};
use contextfox_interface::CompletionDriver;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument, warn};

/// Shared handles every executor needs.
#[derive(Clone)]
pub struct ExecutionContext {
    driver: Arc<dyn CompletionDriver>,
    settings: Arc<PipelineSettings>,
    board: SharedBoard,
    reports: ReportSender,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("provider", &self.driver.provider_name())
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Bundle the handles.
    pub fn new(
        driver: Arc<dyn CompletionDriver>,
        settings: Arc<PipelineSettings>,
        board: SharedBoard,
        reports: ReportSender,
    ) -> Self {
        Self {
            driver,
            settings,
            board,
            reports,
        }
    }

    /// Resolved settings.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Task board.
    pub fn board(&self) -> &SharedBoard {
        &self.board
    }

    /// Model id for a stage, `None` when the stage is disabled.
    pub(crate) fn model_for(&self, kind: TaskKind) -> Option<String> {
        self.settings
            .task_models()
            .for_kind(kind)
            .model_id()
            .map(str::to_string)
    }

    /// Template values shared by every stage of a part.
    pub(crate) fn base_slots(&self, state: &ProcessingState) -> SlotValues {
        SlotValues {
            model: self.settings.story_model().clone(),
            character: state.character.clone(),
            story_title: state.story_title.clone(),
            last_summary: state.accumulated_summary.clone(),
            last_plot_essentials: state.plot_essentials.clone(),
            cards: String::new(),
        }
    }
}

/// What a stage sees of the current part.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    /// `" (n/total)"` or empty
    pub part_indicator: &'a str,
    /// The extracted chunk
    pub content: &'a str,
    /// State as of the start of the stage
    pub state: &'a ProcessingState,
    /// Card exclusion overrides
    pub exclusions: &'a ExclusionState,
}

/// One model call ready to run.
#[derive(Debug, Clone)]
pub(crate) struct TaskCall {
    pub kind: TaskKind,
    pub part_indicator: String,
    pub model: String,
    pub prompt: PreparedPrompt,
    pub user_content: String,
}

/// Turn the reply of a stage into its result.
pub fn parse_stage(kind: TaskKind, text: &str) -> StageResult {
    match kind {
        TaskKind::Perspective => StageResult::Perspective(parse_identity_field(text, "character")),
        TaskKind::Title => StageResult::Title(parse_identity_field(text, "title")),
        TaskKind::Characters | TaskKind::Locations | TaskKind::Concepts => {
            StageResult::Cards(parse_cards_response(text).value)
        }
        TaskKind::Summary => StageResult::Summary(parse_summary_response(text).value),
        TaskKind::PlotEssentials => {
            StageResult::PlotEssentials(parse_plot_essentials_response(text).value)
        }
        TaskKind::CoreSelf => StageResult::CoreSelf(parse_core_self_response(text)),
    }
}

/// Classify an exhausted call for the stage that made it.
#[track_caller]
pub(crate) fn stage_failure(task_id: &str, err: &ContextFoxError) -> PipelineError {
    let task = task_id.to_string();
    let reason = err.to_string();
    let kind = if err.is_refusal() {
        PipelineErrorKind::Refusal { task, reason }
    } else if err.is_transport() {
        PipelineErrorKind::TransportFailure { task, reason }
    } else if err.is_parse_failure() {
        PipelineErrorKind::ParseFailure { task, reason }
    } else {
        PipelineErrorKind::TaskFailed { task, reason }
    };
    PipelineError::new(kind)
}

/// Run one call, record it on the board and report the parsed result.
///
/// Returns the stage failure when every attempt was rejected.
#[instrument(skip_all, fields(task = %call.kind.task_id(&call.part_indicator), model = %call.model, %origin))]
pub(crate) async fn execute(
    ctx: &ExecutionContext,
    call: TaskCall,
    origin: Origin,
) -> Result<(), PipelineError> {
    let mut task = Task::new(
        call.kind,
        &call.part_indicator,
        &call.model,
        call.prompt.render(),
        &call.user_content,
    );
    let task_id = task.id.clone();
    if let Err(e) = task.start() {
        warn!(error = %e, "Task could not start cleanly");
    }
    with_board(&ctx.board, |board| board.upsert(task));

    let params = ctx.settings.params_for(&call.model).clone();
    let bypassed = AtomicBool::new(false);

    let outcome = call_with_retry(
        &task_id,
        ctx.settings.retry(),
        |attempt| {
            let system_prompt = if bypassed.load(Ordering::Relaxed) {
                call.prompt.with_bypass(ctx.settings.refusal_prompt())
            } else {
                call.prompt.render()
            };
            debug!(attempt, "Sending request");
            let request = CompletionRequest::for_stage(
                &call.model,
                system_prompt,
                &call.user_content,
                &params,
            );
            let driver = Arc::clone(&ctx.driver);
            async move { driver.complete(&request).await }
        },
        || {
            bypassed.store(true, Ordering::Relaxed);
            let prompt = call.prompt.with_bypass(ctx.settings.refusal_prompt());
            with_board(&ctx.board, |board| {
                let _ = board.update(&task_id, |t| t.set_system_prompt(prompt));
            });
        },
    )
    .await;

    match outcome {
        RetryOutcome::Fulfilled(response) => {
            if response.truncated {
                warn!("Response was cut off at the token limit");
            }
            let result = parse_stage(call.kind, &response.content);
            finish_task(ctx, &task_id, Ok(response.content));
            ctx.reports.send(TaskReport {
                task_id,
                kind: call.kind,
                origin,
                result,
            });
            Ok(())
        }
        RetryOutcome::Rejected(err) => {
            let failure = stage_failure(&task_id, &err);
            warn!(error = %failure, "Task failed");
            finish_task(ctx, &task_id, Err(err.to_string()));
            ctx.reports.send(TaskReport {
                task_id,
                kind: call.kind,
                origin,
                result: StageResult::Failed(failure.kind.to_string()),
            });
            Err(failure)
        }
    }
}

fn finish_task(ctx: &ExecutionContext, task_id: &str, output: Result<String, String>) {
    with_board(&ctx.board, |board| {
        let finished = board.update(task_id, |t| match output {
            Ok(text) => t.complete(text),
            Err(detail) => t.fail(detail),
        });
        match finished {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Task status not updated"),
            Err(e) => warn!(error = %e, "Task missing from board"),
        }
    });
}
