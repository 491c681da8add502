//! Manual re-execution of finished tasks.

use super::{ExecutionContext, TaskCall, execute};
use crate::board::with_board;
use crate::prompts::PreparedPrompt;
use crate::sink::Origin;
use contextfox_error::{ContextFoxResult, PipelineError, PipelineErrorKind};
use tracing::{info, instrument};

/// Re-runs a finished task, optionally with an edited system prompt.
///
/// The result is reported with [`Origin::Retry`], so it overrides whatever
/// the pipeline reports for the same task id. A retrier can be cloned and
/// used while the processor is running; its reports are applied at the
/// next stage boundary.
#[derive(Debug, Clone)]
pub struct TaskRetrier {
    ctx: ExecutionContext,
}

impl TaskRetrier {
    /// Create a retrier sharing the processor's board and sink.
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    /// Re-run `task_id`.
    ///
    /// Uses the currently configured model for the stage when it is
    /// enabled, otherwise the model the task last ran with.
    #[instrument(skip(self, edited_prompt), fields(edited = edited_prompt.is_some()))]
    pub async fn retry(&self, task_id: &str, edited_prompt: Option<String>) -> ContextFoxResult<()> {
        let task = with_board(self.ctx.board(), |board| board.get(task_id).cloned())
            .ok_or_else(|| PipelineError::new(PipelineErrorKind::UnknownTask(task_id.to_string())))?;
        if !task.status.is_finished() {
            return Err(PipelineError::new(PipelineErrorKind::InvalidTransition(format!(
                "task '{}' is {}",
                task_id, task.status
            )))
            .into());
        }
        let kind = task
            .kind()
            .ok_or_else(|| PipelineError::new(PipelineErrorKind::UnknownTask(task_id.to_string())))?;

        let part_indicator = task
            .id
            .strip_prefix(kind.id_prefix())
            .unwrap_or_default()
            .to_string();
        let system_prompt = edited_prompt.unwrap_or(task.system_prompt);
        let call = TaskCall {
            kind,
            part_indicator,
            model: self.ctx.model_for(kind).unwrap_or(task.model),
            prompt: PreparedPrompt::from_edited(&system_prompt, kind),
            user_content: task.user_content,
        };

        execute(&self.ctx, call, Origin::Retry).await?;
        info!("Retry completed");
        Ok(())
    }
}
