//! TaskRegistry - タスクの正本（single source of truth）
//!
//! - タスク本体はここだけが持つ。StateTracker のリストは TaskId のみ
//! - 状態遷移はすべて `Task` のメソッド経由（不正遷移は Validation）
//! - 遷移のたびに `StateTracker::track` でリストを同期する

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::retry::RetryPolicy;
use super::tracker::StateTracker;
use crate::domain::errors::AtelierError;
use crate::domain::ids::TaskId;
use crate::domain::outcome::{RetryDecision, TaskDisposition};
use crate::domain::task::{NewTask, Task, TaskKind, TaskStatus};
use crate::ports::{Clock, IdGenerator};

/// Task counts per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.completed + self.failed
    }
}

pub struct TaskRegistry {
    tasks: HashMap<TaskId, Task>,
    next_seq: u64,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl TaskRegistry {
    pub fn new(policy: RetryPolicy, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            tasks: HashMap::new(),
            next_seq: 1,
            policy,
            clock,
            ids,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Register a draft as a pending task.
    pub fn create_task(&mut self, tracker: &mut StateTracker, draft: NewTask) -> TaskId {
        let id = self.ids.task_id();
        let seq = self.next_seq;
        self.next_seq += 1;

        let task = Task::from_draft(id, seq, draft, self.policy.max_retries, self.clock.now());
        debug!(task_id = %id, kind = %task.kind, priority = ?task.priority, "task registered");
        tracker.track(id, TaskStatus::Pending);
        self.tasks.insert(id, task);
        id
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// All tasks in registration order.
    pub fn tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by_key(|t| t.seq);
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Highest priority pending task; equal priorities go first-registered first.
    pub fn next_pending(&self) -> Option<&Task> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .max_by_key(|t| (t.priority, Reverse(t.seq)))
    }

    /// Whether a pending or in-progress task of `kind` exists.
    pub fn has_open(&self, kind: TaskKind) -> bool {
        self.tasks
            .values()
            .any(|t| t.kind == kind && t.status.is_open())
    }

    pub fn mark_in_progress(
        &mut self,
        tracker: &mut StateTracker,
        id: TaskId,
    ) -> Result<(), AtelierError> {
        let now = self.clock.now();
        let task = self.task_mut(id)?;
        task.start(now)?;
        tracker.track(id, task.status);
        Ok(())
    }

    pub fn mark_completed(
        &mut self,
        tracker: &mut StateTracker,
        id: TaskId,
    ) -> Result<(), AtelierError> {
        let now = self.clock.now();
        let task = self.task_mut(id)?;
        task.complete(now)?;
        tracker.track(id, task.status);
        info!(task_id = %id, kind = %task.kind, "task completed");
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        tracker: &mut StateTracker,
        id: TaskId,
        error: impl Into<String>,
    ) -> Result<(), AtelierError> {
        let now = self.clock.now();
        let task = self.task_mut(id)?;
        task.fail(error, now)?;
        tracker.track(id, task.status);
        Ok(())
    }

    /// Requeue a failed task if it has retries left.
    ///
    /// Returns `false` once the task is permanently failed; calling it again keeps returning
    /// `false` without touching `retry_count`.
    pub fn schedule_retry(
        &mut self,
        tracker: &mut StateTracker,
        id: TaskId,
    ) -> Result<bool, AtelierError> {
        let now = self.clock.now();
        let task = self.task_mut(id)?;
        let requeued = task.retry(now)?;
        tracker.track(id, task.status);
        if requeued {
            debug!(
                task_id = %id,
                retry_count = task.retry_count,
                max_retries = task.max_retries,
                "task requeued"
            );
        }
        Ok(requeued)
    }

    /// One extra attempt for a failed critical task. `false` for unknown ids, non-critical
    /// tasks, and tasks that already used theirs.
    pub fn grant_bonus_retry(&mut self, tracker: &mut StateTracker, id: TaskId) -> bool {
        let now = self.clock.now();
        let Some(task) = self.tasks.get_mut(&id) else {
            return false;
        };
        let granted = task.grant_bonus(now);
        if granted {
            tracker.track(id, task.status);
            info!(task_id = %id, max_retries = task.max_retries, "bonus retry granted");
        }
        granted
    }

    /// Apply a [`RetryDecision`] to an in-progress task.
    pub fn settle(
        &mut self,
        tracker: &mut StateTracker,
        id: TaskId,
        decision: RetryDecision,
        error: &str,
    ) -> Result<TaskDisposition, AtelierError> {
        match decision {
            RetryDecision::Complete => {
                self.mark_completed(tracker, id)?;
                Ok(TaskDisposition::Completed)
            }
            RetryDecision::Retry { bonus_eligible } => {
                self.mark_failed(tracker, id, error)?;
                if self.schedule_retry(tracker, id)? {
                    return Ok(TaskDisposition::Retrying);
                }
                if bonus_eligible && self.grant_bonus_retry(tracker, id) {
                    return Ok(TaskDisposition::BonusRetry);
                }
                if let Some(task) = self.tasks.get(&id) {
                    warn!(
                        task_id = %id,
                        kind = %task.kind,
                        retries = task.retry_count,
                        error,
                        "task permanently failed"
                    );
                }
                Ok(TaskDisposition::PermanentlyFailed)
            }
        }
    }

    pub fn statistics(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for task in self.tasks.values() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Drop every task and the tracker's lists with them.
    pub(crate) fn clear(&mut self, tracker: &mut StateTracker) {
        self.tasks.clear();
        self.next_seq = 1;
        tracker.forget_tasks();
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, AtelierError> {
        self.tasks
            .get_mut(&id)
            .ok_or_else(|| AtelierError::validation(format!("unknown task {id}")))
    }
}
