//! Pipeline tasks and their lifecycle.

use contextfox_error::{PipelineError, PipelineErrorKind};
use serde::{Deserialize, Serialize};

/// The stages a task can belong to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum TaskKind {
    /// Perspective character detection
    Perspective,
    /// Story title detection
    Title,
    /// Character cards
    Characters,
    /// Location cards
    Locations,
    /// Concept and faction cards
    Concepts,
    /// Running summary
    Summary,
    /// Plot tracking notes
    PlotEssentials,
    /// Brain card core self updates
    CoreSelf,
}

impl TaskKind {
    /// Stable id prefix, e.g. `plotEssentials`.
    pub fn id_prefix(self) -> &'static str {
        self.into()
    }

    /// Human readable task name.
    pub fn display_name(self) -> &'static str {
        match self {
            TaskKind::Perspective => "Detecting Perspective",
            TaskKind::Title => "Detecting Story Title",
            TaskKind::Characters => "Generating Characters",
            TaskKind::Locations => "Generating Locations",
            TaskKind::Concepts => "Generating Concepts/Factions",
            TaskKind::Summary => "Generating Summary",
            TaskKind::PlotEssentials => "Generating Plot Essentials",
            TaskKind::CoreSelf => "Core Self Populator/Enhancer",
        }
    }

    /// Task id for this stage in a given part, e.g. `characters (2/5)`.
    pub fn task_id(self, part_indicator: &str) -> String {
        format!("{}{}", self.id_prefix(), part_indicator)
    }

    /// Recover the stage from a task id.
    pub fn from_task_id(id: &str) -> Option<Self> {
        let prefix = id.split(" (").next().unwrap_or(id);
        <Self as strum::IntoEnumIterator>::iter().find(|kind| kind.id_prefix() == prefix)
    }
}

/// Where a task is in its lifecycle.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created, not started
    #[default]
    #[display("waiting")]
    Waiting,
    /// API call in flight
    #[display("processing")]
    Processing,
    /// Finished with a result
    #[display("completed")]
    Completed,
    /// Finished with an error
    #[display("error")]
    Error,
}

impl TaskStatus {
    /// Whether the task has reached a terminal status.
    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

/// One model call and everything needed to inspect or retry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique id including the part indicator
    pub id: String,
    /// Display name
    pub name: String,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Model id used for the call
    pub model: String,
    /// Fully rendered system prompt
    pub system_prompt: String,
    /// User message content
    pub user_content: String,
    /// Display context combining prompt and content
    pub context: String,
    /// Raw model output or error detail
    pub output: String,
}

impl Task {
    /// Create a waiting task for a stage.
    pub fn new(
        kind: TaskKind,
        part_indicator: &str,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        user_content: impl Into<String>,
    ) -> Self {
        let system_prompt = system_prompt.into();
        let user_content = user_content.into();
        Self {
            id: kind.task_id(part_indicator),
            name: format!("{}{}", kind.display_name(), part_indicator),
            status: TaskStatus::Waiting,
            model: model.into(),
            context: format!("System:\n{system_prompt}\n\nContent:\n{user_content}"),
            system_prompt,
            user_content,
            output: String::new(),
        }
    }

    /// Stage of this task, if the id is well formed.
    pub fn kind(&self) -> Option<TaskKind> {
        TaskKind::from_task_id(&self.id)
    }

    /// Enter `processing`. Allowed from `waiting`, or from a finished
    /// status when the task is being retried.
    #[track_caller]
    pub fn start(&mut self) -> Result<(), PipelineError> {
        match self.status {
            TaskStatus::Processing => Err(self.invalid("start", TaskStatus::Processing)),
            _ => {
                self.status = TaskStatus::Processing;
                Ok(())
            }
        }
    }

    /// Record a successful result.
    #[track_caller]
    pub fn complete(&mut self, output: impl Into<String>) -> Result<(), PipelineError> {
        self.finish(TaskStatus::Completed, output.into())
    }

    /// Record a failure.
    #[track_caller]
    pub fn fail(&mut self, detail: impl Into<String>) -> Result<(), PipelineError> {
        self.finish(TaskStatus::Error, detail.into())
    }

    /// Replace the prompt before a retry and refresh the display context.
    pub fn set_system_prompt(&mut self, system_prompt: impl Into<String>) {
        self.system_prompt = system_prompt.into();
        self.context = format!(
            "System:\n{}\n\nContent:\n{}",
            self.system_prompt, self.user_content
        );
    }

    #[track_caller]
    fn finish(&mut self, status: TaskStatus, output: String) -> Result<(), PipelineError> {
        if self.status != TaskStatus::Processing {
            return Err(self.invalid("finish", self.status));
        }
        self.status = status;
        self.output = output;
        Ok(())
    }

    #[track_caller]
    fn invalid(&self, action: &str, from: TaskStatus) -> PipelineError {
        PipelineError::new(PipelineErrorKind::InvalidTransition(format!(
            "cannot {action} task '{}' while {from}",
            self.id
        )))
    }
}
