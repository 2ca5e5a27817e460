//! Decision log entries.
//!
//! JSON 形式: `{"seq": 1, "at": "...", "kind": "task_created", ...payload}`

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::{ActionKind, ToolKind};
use super::ids::{ActionId, CheckpointId, PlanId, TaskId};
use super::outcome::{Evaluation, ExecutionResult, TaskDisposition};
use super::phase::{DrawingPhase, StrokeIntent, TransitionKind};
use super::region::Region;
use super::task::{TaskKind, TaskPriority};

/// Discriminant of a [`LogEvent`], used for statistics and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    StrokeExecuted,
    TaskCreated,
    TaskEvaluated,
    PhaseTransition,
    InvalidTransition,
    CheckpointCreated,
    RollbackPerformed,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::StrokeExecuted => "stroke_executed",
            EntryKind::TaskCreated => "task_created",
            EntryKind::TaskEvaluated => "task_evaluated",
            EntryKind::PhaseTransition => "phase_transition",
            EntryKind::InvalidTransition => "invalid_transition",
            EntryKind::CheckpointCreated => "checkpoint_created",
            EntryKind::RollbackPerformed => "rollback_performed",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEvent {
    StrokeExecuted {
        action_id: ActionId,
        task_id: TaskId,
        plan_id: PlanId,
        action: ActionKind,
        intent: StrokeIntent,
        phase: DrawingPhase,
        tool: Option<ToolKind>,
        point_count: usize,
        description: String,
        /// Plan metric before the attempt.
        before: f64,
        /// Plan metric after the attempt. `None` when the plan was aborted.
        after: Option<f64>,
    },
    TaskCreated {
        task_id: TaskId,
        task_kind: TaskKind,
        priority: TaskPriority,
        description: String,
        region: Option<Region>,
    },
    TaskEvaluated {
        task_id: TaskId,
        plan_id: PlanId,
        attempt: u32,
        result: ExecutionResult,
        evaluation: Option<Evaluation>,
        disposition: TaskDisposition,
        error: Option<String>,
    },
    PhaseTransition {
        from: DrawingPhase,
        to: DrawingPhase,
        transition: TransitionKind,
        reason: String,
        iteration_in_phase: u32,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        metrics: BTreeMap<String, f64>,
    },
    InvalidTransition {
        from: DrawingPhase,
        requested: Option<DrawingPhase>,
        transition: TransitionKind,
        reason: String,
        rejection: String,
    },
    CheckpointCreated {
        checkpoint_id: CheckpointId,
        phase: DrawingPhase,
        history_len: usize,
        description: String,
    },
    RollbackPerformed {
        checkpoint_id: CheckpointId,
        from_phase: DrawingPhase,
        to_phase: DrawingPhase,
        strokes_discarded: usize,
    },
}

impl LogEvent {
    pub fn kind(&self) -> EntryKind {
        match self {
            LogEvent::StrokeExecuted { .. } => EntryKind::StrokeExecuted,
            LogEvent::TaskCreated { .. } => EntryKind::TaskCreated,
            LogEvent::TaskEvaluated { .. } => EntryKind::TaskEvaluated,
            LogEvent::PhaseTransition { .. } => EntryKind::PhaseTransition,
            LogEvent::InvalidTransition { .. } => EntryKind::InvalidTransition,
            LogEvent::CheckpointCreated { .. } => EntryKind::CheckpointCreated,
            LogEvent::RollbackPerformed { .. } => EntryKind::RollbackPerformed,
        }
    }

    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            LogEvent::StrokeExecuted { task_id, .. }
            | LogEvent::TaskCreated { task_id, .. }
            | LogEvent::TaskEvaluated { task_id, .. } => Some(*task_id),
            _ => None,
        }
    }
}

/// An appended log entry. `seq` starts at 1 and has no gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    pub seq: u64,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: LogEvent,
}

impl DecisionLogEntry {
    pub fn kind(&self) -> EntryKind {
        self.event.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn entries_serialize_flat_with_kind_tag() {
        let entry = DecisionLogEntry {
            seq: 7,
            at: Utc::now(),
            event: LogEvent::CheckpointCreated {
                checkpoint_id: CheckpointId::from_ulid(Ulid::new()),
                phase: DrawingPhase::Sketch,
                history_len: 3,
                description: "phase boundary".into(),
            },
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["seq"], 7);
        assert_eq!(value["kind"], "checkpoint_created");
        assert_eq!(value["phase"], "sketch");
        assert_eq!(value["history_len"], 3);

        let back: DecisionLogEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
        assert_eq!(back.kind(), EntryKind::CheckpointCreated);
    }
}
