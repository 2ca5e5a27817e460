//! Status - イテレーション結果・統計・エクスポート
//!
//! どれも serde で JSON にできる「読むだけ」のビューです。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::decision::DecisionLogEntry;
use crate::domain::ids::TaskId;
use crate::domain::outcome::{Evaluation, ExecutionResult, TaskDisposition};
use crate::domain::phase::{DrawingPhase, StrokeIntent};
use crate::domain::state::{BrainState, StrokeRecord};
use crate::domain::task::{Task, TaskKind};
use crate::registry::TaskCounts;
use crate::workflow::{CheckpointSummary, LogStatistics, PhaseState, PhaseSummary};

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestratorState {
    Idle,
    Running,
    /// Refuses work until `reset()`.
    Failed { reason: String },
}

/// Why an iteration did no work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The workflow reached the complete phase.
    Complete,
    /// A stop was requested through a `StopHandle`.
    Cancelled,
    /// Nothing left to fix and no phase change advised.
    Exhausted,
    /// `max_session_iterations` used up.
    BudgetSpent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IterationOutcome {
    TaskAttempted {
        task_id: TaskId,
        task_kind: TaskKind,
        attempt: u32,
        result: ExecutionResult,
        disposition: TaskDisposition,
        evaluation: Option<Evaluation>,
        error: Option<String>,
    },
    PhaseAdvanced {
        from: DrawingPhase,
        to: DrawingPhase,
    },
    PhaseRegressed {
        from: DrawingPhase,
        to: DrawingPhase,
    },
    Stopped {
        reason: StopReason,
    },
}

/// What one call to `run_iteration` did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    /// Iteration counter after this iteration.
    pub iteration: u64,
    /// Phase after this iteration.
    pub phase: DrawingPhase,
    pub tasks_created: usize,
    /// Quality of the feedback the iteration started from.
    pub quality: Option<f64>,
    pub outcome: IterationOutcome,
}

impl IterationSummary {
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.outcome {
            IterationOutcome::Stopped { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn disposition(&self) -> Option<TaskDisposition> {
        match self.outcome {
            IterationOutcome::TaskAttempted { disposition, .. } => Some(disposition),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStatistics {
    pub state: OrchestratorState,
    pub goal: String,
    pub phase: DrawingPhase,
    pub iteration_in_phase: u32,
    pub time_in_phase: std::time::Duration,
    pub iterations: u64,
    pub tasks: TaskCounts,
    pub strokes: usize,
    pub strokes_by_intent: BTreeMap<StrokeIntent, usize>,
    pub checkpoints: usize,
    pub log: LogStatistics,
    pub phases: Vec<PhaseSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedState {
    pub brain: BrainState,
    pub tasks: Vec<Task>,
    pub strokes: Vec<StrokeRecord>,
}

/// Everything needed to replay or audit a session. Checkpoint blobs are referenced, not embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExport {
    pub exported_at: DateTime<Utc>,
    pub state: ExportedState,
    pub phase: PhaseState,
    pub checkpoints: Vec<CheckpointSummary>,
    pub log: Vec<DecisionLogEntry>,
}

impl WorkflowExport {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
