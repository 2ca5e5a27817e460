//! Task - 修正タスクのレコードと状態遷移
//!
//! 状態遷移（これ以外は Validation エラー）:
//! - pending → in_progress
//! - in_progress → completed | failed
//! - failed → pending（`requeue`、リトライ時のみ）
//!
//! completed / 永続 failed のタスクも削除せず保持します（監査用）。

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::AtelierError;
use super::ids::TaskId;
use super::region::Region;

/// Closed set of corrective task kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    FixPose,
    FixProportions,
    ImproveSymmetry,
    FixHand,
    FixFace,
    AddDetail,
    AlignEdges,
    CorrectStructure,
    EnhanceSilhouette,
    RefineAnatomy,
}

impl TaskKind {
    pub const ALL: [TaskKind; 10] = [
        TaskKind::FixPose,
        TaskKind::FixProportions,
        TaskKind::ImproveSymmetry,
        TaskKind::FixHand,
        TaskKind::FixFace,
        TaskKind::AddDetail,
        TaskKind::AlignEdges,
        TaskKind::CorrectStructure,
        TaskKind::EnhanceSilhouette,
        TaskKind::RefineAnatomy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::FixPose => "fix_pose",
            TaskKind::FixProportions => "fix_proportions",
            TaskKind::ImproveSymmetry => "improve_symmetry",
            TaskKind::FixHand => "fix_hand",
            TaskKind::FixFace => "fix_face",
            TaskKind::AddDetail => "add_detail",
            TaskKind::AlignEdges => "align_edges",
            TaskKind::CorrectStructure => "correct_structure",
            TaskKind::EnhanceSilhouette => "enhance_silhouette",
            TaskKind::RefineAnatomy => "refine_anatomy",
        }
    }

    /// Kinds whose strokes follow the outline of their target region.
    pub fn traces_outline(self) -> bool {
        matches!(self, TaskKind::EnhanceSilhouette | TaskKind::AlignEdges)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority. Ordering is `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Pending or in progress.
    pub fn is_open(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

/// Draft of a task, produced by the planner and turned into a [`Task`] by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub kind: TaskKind,
    pub description: String,
    pub priority: TaskPriority,
    pub region: Option<Region>,
    pub params: BTreeMap<String, Value>,
    /// Overrides the registry's default when set.
    pub max_retries: Option<u32>,
}

impl NewTask {
    pub fn new(kind: TaskKind, description: impl Into<String>, priority: TaskPriority) -> Self {
        Self {
            kind,
            description: description.into(),
            priority,
            region: None,
            params: BTreeMap::new(),
            max_retries: None,
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// A registered corrective task.
///
/// `retry_count <= max_retries` holds after every method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Registration order, used as the FIFO tie-break between equal priorities.
    pub seq: u64,
    pub kind: TaskKind,
    pub description: String,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub region: Option<Region>,
    pub params: BTreeMap<String, Value>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub bonus_retry_granted: bool,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn from_draft(
        id: TaskId,
        seq: u64,
        draft: NewTask,
        default_max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            seq,
            kind: draft.kind,
            description: draft.description,
            priority: draft.priority,
            status: TaskStatus::Pending,
            region: draft.region,
            params: draft.params,
            retry_count: 0,
            max_retries: draft.max_retries.unwrap_or(default_max_retries),
            bonus_retry_granted: false,
            last_error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.priority == TaskPriority::Critical
    }

    /// 1-based attempt number of the current (or next) execution.
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    /// pending → in_progress
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), AtelierError> {
        self.expect_status(TaskStatus::Pending, TaskStatus::InProgress)?;
        self.status = TaskStatus::InProgress;
        self.updated_at = now;
        Ok(())
    }

    /// in_progress → completed
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), AtelierError> {
        self.expect_status(TaskStatus::InProgress, TaskStatus::Completed)?;
        self.status = TaskStatus::Completed;
        self.last_error = None;
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    /// in_progress → failed
    pub fn fail(&mut self, error: impl Into<String>, now: DateTime<Utc>) -> Result<(), AtelierError> {
        self.expect_status(TaskStatus::InProgress, TaskStatus::Failed)?;
        self.status = TaskStatus::Failed;
        self.last_error = Some(error.into());
        self.updated_at = now;
        Ok(())
    }

    /// Consume one retry. Returns `true` when the task went back to pending.
    ///
    /// - `retry_count >= max_retries`: nothing changes, `false`
    /// - otherwise `retry_count += 1`; requeued only while still below `max_retries`
    pub fn retry(&mut self, now: DateTime<Utc>) -> Result<bool, AtelierError> {
        if self.status != TaskStatus::Failed {
            return Err(AtelierError::validation(format!(
                "cannot retry {} in status {:?}, only failed tasks are retried",
                self.id, self.status
            )));
        }
        if self.retry_count >= self.max_retries {
            return Ok(false);
        }
        self.retry_count += 1;
        self.updated_at = now;
        if self.retry_count < self.max_retries {
            self.status = TaskStatus::Pending;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// One extra attempt for a critical task whose retries ran out, at most once per task.
    /// Raises `max_retries` by one and puts the task back to pending.
    pub fn grant_bonus(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_critical() || self.bonus_retry_granted || self.status != TaskStatus::Failed {
            return false;
        }
        self.max_retries += 1;
        self.bonus_retry_granted = true;
        self.status = TaskStatus::Pending;
        self.updated_at = now;
        true
    }

    fn expect_status(&self, from: TaskStatus, to: TaskStatus) -> Result<(), AtelierError> {
        if self.status == from {
            Ok(())
        } else {
            Err(AtelierError::validation(format!(
                "invalid status transition for {}: {:?} -> {:?}",
                self.id, self.status, to
            )))
        }
    }
}
