//! State - BrainState と履歴
//!
//! BrainState は StateTracker だけが書き換えます。
//! 4 つのリスト（active / pending / completed / failed）は TaskId のみを持ち、
//! タスク本体は TaskRegistry が正本です。

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::{ActionKind, ActionPlan, StrokePoint, ToolConfig};
use super::feedback::Feedback;
use super::ids::{ActionId, ExecutionId, PlanId, TaskId};
use super::outcome::ExecutionResult;
use super::phase::{DrawingPhase, StrokeIntent};

/// Bounded FIFO buffer: pushing past capacity drops the oldest element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRing<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> HistoryRing<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Up to `n` most recent items, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        self.items.iter().skip(self.items.len().saturating_sub(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// One evaluated task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub task_id: TaskId,
    pub plan_id: PlanId,
    pub result: ExecutionResult,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One mark put on (or taken off) the canvas. Checkpoints remember the stroke count
/// and rollback truncates back to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeRecord {
    pub action_id: ActionId,
    pub task_id: TaskId,
    pub kind: ActionKind,
    pub intent: StrokeIntent,
    pub phase: DrawingPhase,
    pub points: Vec<StrokePoint>,
    pub tool: Option<ToolConfig>,
    pub at: DateTime<Utc>,
}

/// Snapshot-able working memory of the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainState {
    pub goal: String,
    pub active: Vec<TaskId>,
    pub pending: Vec<TaskId>,
    pub completed: Vec<TaskId>,
    pub failed: Vec<TaskId>,
    pub current_plan: Option<ActionPlan>,
    pub history: HistoryRing<ExecutionRecord>,
    pub context: BTreeMap<String, Value>,
    pub iteration: u64,
    pub last_feedback: Option<Feedback>,
    pub last_action_at: Option<DateTime<Utc>>,
}

impl BrainState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            goal: String::new(),
            active: Vec::new(),
            pending: Vec::new(),
            completed: Vec::new(),
            failed: Vec::new(),
            current_plan: None,
            history: HistoryRing::new(history_capacity),
            context: BTreeMap::new(),
            iteration: 0,
            last_feedback: None,
            last_action_at: None,
        }
    }
}

/// Counts-only view of a [`BrainState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    pub goal: String,
    pub active: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub iteration: u64,
    pub executions: usize,
    pub has_plan: bool,
}
