//! Single writer for task results.
//!
//! Executors never touch processing state. They send a [`TaskReport`]
//! into the sink and the processor drains it at stage boundaries. A task
//! that was explicitly retried is owned by the retry: later reports for
//! the same id from the pipeline are dropped.

use crate::parsing::CoreSelfUpdate;
use contextfox_core::{CardUpdate, TaskKind};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Who produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Origin {
    /// The regular pipeline run
    Pipeline,
    /// An explicit retry requested by the user
    Retry,
}

/// Parsed result of one stage call.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult {
    /// Perspective character, `None` when it could not be parsed
    Perspective(Option<String>),
    /// Story title, `None` when it could not be parsed
    Title(Option<String>),
    /// Card creations and updates from one card stage
    Cards(Vec<CardUpdate>),
    /// Full replacement summary
    Summary(String),
    /// Full replacement plot essentials
    PlotEssentials(String),
    /// Core self updates for brain cards
    CoreSelf(Vec<CoreSelfUpdate>),
    /// The call failed after all attempts
    Failed(String),
}

/// A result addressed to a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    /// Task id including the part indicator
    pub task_id: String,
    /// Stage that produced it
    pub kind: TaskKind,
    /// Pipeline or explicit retry
    pub origin: Origin,
    /// What the stage produced
    pub result: StageResult,
}

/// Sending half handed to executors and retriers.
#[derive(Debug, Clone)]
pub struct ReportSender {
    tx: mpsc::UnboundedSender<TaskReport>,
}

impl ReportSender {
    /// Submit a report. Dropped silently once the sink is gone.
    pub fn send(&self, report: TaskReport) {
        if self.tx.send(report).is_err() {
            debug!("Result sink closed, report dropped");
        }
    }
}

/// Receiving half owned by the processor.
#[derive(Debug)]
pub struct ResultSink {
    rx: mpsc::UnboundedReceiver<TaskReport>,
    tx: mpsc::UnboundedSender<TaskReport>,
    retried: HashSet<String>,
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            tx,
            retried: HashSet::new(),
        }
    }

    /// A sender feeding this sink.
    pub fn sender(&self) -> ReportSender {
        ReportSender {
            tx: self.tx.clone(),
        }
    }

    /// Take every queued report, in arrival order, that should be applied.
    pub fn drain(&mut self) -> Vec<TaskReport> {
        let mut accepted = Vec::new();
        while let Ok(report) = self.rx.try_recv() {
            match report.origin {
                Origin::Retry => {
                    self.retried.insert(report.task_id.clone());
                    accepted.push(report);
                }
                Origin::Pipeline if self.retried.contains(&report.task_id) => {
                    warn!(
                        task = %report.task_id,
                        "Ignoring pipeline result for a task that was retried"
                    );
                }
                Origin::Pipeline => accepted.push(report),
            }
        }
        accepted
    }

    /// Take queued reports but keep only explicit retries. Pipeline
    /// reports are discarded.
    pub fn drain_retries(&mut self) -> Vec<TaskReport> {
        self.drain()
            .into_iter()
            .filter(|report| report.origin == Origin::Retry)
            .collect()
    }

    /// Forget retry ownership, e.g. when a new part starts.
    pub fn reset(&mut self) {
        self.retried.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(origin: Origin, summary: &str) -> TaskReport {
        TaskReport {
            task_id: "summary (1/2)".into(),
            kind: TaskKind::Summary,
            origin,
            result: StageResult::Summary(summary.into()),
        }
    }

    #[test]
    fn test_drain_preserves_order() {
        let mut sink = ResultSink::new();
        let sender = sink.sender();
        sender.send(report(Origin::Pipeline, "a"));
        sender.send(report(Origin::Retry, "b"));

        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[1].result, StageResult::Summary("b".into()));
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn test_retry_wins_over_late_pipeline_result() {
        let mut sink = ResultSink::new();
        let sender = sink.sender();
        sender.send(report(Origin::Retry, "edited"));
        sender.send(report(Origin::Pipeline, "stale"));

        let drained = sink.drain();
        assert_eq!(drained, vec![report(Origin::Retry, "edited")]);

        sender.send(report(Origin::Pipeline, "later"));
        assert!(sink.drain().is_empty());

        sink.reset();
        sender.send(report(Origin::Pipeline, "next part"));
        assert_eq!(sink.drain().len(), 1);
    }

    #[test]
    fn test_abandoned_stage_keeps_only_retries() {
        let mut sink = ResultSink::new();
        let sender = sink.sender();
        sender.send(report(Origin::Pipeline, "uncommitted"));
        sender.send(TaskReport {
            task_id: "title".into(),
            kind: TaskKind::Title,
            origin: Origin::Retry,
            result: StageResult::Title(Some("The Drowned Harbor".into())),
        });

        let kept = sink.drain_retries();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].origin, Origin::Retry);
        assert_eq!(kept[0].task_id, "title");
        assert!(sink.drain().is_empty());
    }
}
