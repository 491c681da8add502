//! Live task list shown to the user.

use contextfox_core::Task;
use contextfox_error::{ContextFoxResult, PipelineError, PipelineErrorKind};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Ordered tasks keyed by id. Re-running a task replaces it in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBoard {
    tasks: Vec<Task>,
}

impl TaskBoard {
    /// Insert a task, or replace the one with the same id.
    pub fn upsert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
    }

    /// Task by id.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Mutate a task in place.
    #[track_caller]
    pub fn update<R>(&mut self, id: &str, f: impl FnOnce(&mut Task) -> R) -> ContextFoxResult<R> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| PipelineError::new(PipelineErrorKind::UnknownTask(id.to_string())))?;
        Ok(f(task))
    }

    /// All tasks in creation order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Drop every task.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

/// Board shared between the processor, its executors and retriers.
pub type SharedBoard = Arc<Mutex<TaskBoard>>;

/// Run `f` against a shared board. A poisoned lock still yields the board.
pub(crate) fn with_board<R>(board: &SharedBoard, f: impl FnOnce(&mut TaskBoard) -> R) -> R {
    let mut guard = board
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard)
}
