//! StateTracker - BrainState の唯一の書き手
//!
//! タスクの状態が変わるたびに TaskRegistry から `track` が呼ばれ、
//! TaskId は必ず 4 つのリストのうち 1 つにだけ存在します。

use std::collections::HashMap;

use serde_json::Value;

use super::tasks::TaskRegistry;
use crate::domain::action::ActionPlan;
use crate::domain::errors::AtelierError;
use crate::domain::feedback::Feedback;
use crate::domain::ids::TaskId;
use crate::domain::state::{BrainState, ExecutionRecord, StateSummary};
use crate::domain::task::TaskStatus;

#[derive(Debug, Clone)]
pub struct StateTracker {
    state: BrainState,
}

impl StateTracker {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            state: BrainState::new(history_capacity),
        }
    }

    pub fn state(&self) -> &BrainState {
        &self.state
    }

    pub fn set_goal(&mut self, goal: impl Into<String>) {
        self.state.goal = goal.into();
    }

    pub fn goal(&self) -> &str {
        &self.state.goal
    }

    pub fn set_plan(&mut self, plan: ActionPlan) {
        self.state.current_plan = Some(plan);
    }

    pub fn clear_plan(&mut self) -> Option<ActionPlan> {
        self.state.current_plan.take()
    }

    pub fn current_plan(&self) -> Option<&ActionPlan> {
        self.state.current_plan.as_ref()
    }

    pub fn record_execution(&mut self, record: ExecutionRecord) {
        self.state.last_action_at = Some(record.at);
        self.state.history.push(record);
    }

    /// Up to `n` most recent executions, oldest first.
    pub fn recent_executions(&self, n: usize) -> Vec<&ExecutionRecord> {
        self.state.history.recent(n).collect()
    }

    pub fn increment_iteration(&mut self) -> u64 {
        self.state.iteration += 1;
        self.state.iteration
    }

    pub fn iteration(&self) -> u64 {
        self.state.iteration
    }

    pub fn set_context(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.state.context.insert(key.into(), value.into());
    }

    pub fn context(&self, key: &str) -> Option<&Value> {
        self.state.context.get(key)
    }

    pub fn update_feedback(&mut self, feedback: Feedback) {
        self.state.last_feedback = Some(feedback);
    }

    pub fn last_feedback(&self) -> Option<&Feedback> {
        self.state.last_feedback.as_ref()
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            goal: self.state.goal.clone(),
            active: self.state.active.len(),
            pending: self.state.pending.len(),
            completed: self.state.completed.len(),
            failed: self.state.failed.len(),
            iteration: self.state.iteration,
            executions: self.state.history.len(),
            has_plan: self.state.current_plan.is_some(),
        }
    }

    /// Move `id` into the list matching `status`, removing it from any other list.
    pub(crate) fn track(&mut self, id: TaskId, status: TaskStatus) {
        for list in self.lists_mut() {
            list.retain(|tracked| *tracked != id);
        }
        self.list_mut(status).push(id);
    }

    /// Drop every task id. Goal, context and history stay.
    pub(crate) fn forget_tasks(&mut self) {
        for list in self.lists_mut() {
            list.clear();
        }
        self.state.current_plan = None;
    }

    /// Each registered task sits in exactly one list, and that list matches its status.
    pub fn verify(&self, registry: &TaskRegistry) -> Result<(), AtelierError> {
        let mut seen: HashMap<TaskId, TaskStatus> = HashMap::new();
        for status in [
            TaskStatus::InProgress,
            TaskStatus::Pending,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            for id in self.list(status) {
                if let Some(previous) = seen.insert(*id, status) {
                    return Err(AtelierError::corruption(format!(
                        "{id} is tracked as both {previous:?} and {status:?}"
                    )));
                }
            }
        }

        for task in registry.tasks() {
            match seen.remove(&task.id) {
                Some(tracked) if tracked == task.status => {}
                Some(tracked) => {
                    return Err(AtelierError::corruption(format!(
                        "{} is {:?} in the registry but tracked as {tracked:?}",
                        task.id, task.status
                    )));
                }
                None => {
                    return Err(AtelierError::corruption(format!(
                        "{} is not tracked in any list",
                        task.id
                    )));
                }
            }
        }

        if let Some(id) = seen.keys().next() {
            return Err(AtelierError::corruption(format!(
                "{id} is tracked but unknown to the registry"
            )));
        }
        Ok(())
    }

    fn list(&self, status: TaskStatus) -> &Vec<TaskId> {
        match status {
            TaskStatus::Pending => &self.state.pending,
            TaskStatus::InProgress => &self.state.active,
            TaskStatus::Completed => &self.state.completed,
            TaskStatus::Failed => &self.state.failed,
        }
    }

    fn list_mut(&mut self, status: TaskStatus) -> &mut Vec<TaskId> {
        match status {
            TaskStatus::Pending => &mut self.state.pending,
            TaskStatus::InProgress => &mut self.state.active,
            TaskStatus::Completed => &mut self.state.completed,
            TaskStatus::Failed => &mut self.state.failed,
        }
    }

    fn lists_mut(&mut self) -> [&mut Vec<TaskId>; 4] {
        let BrainState {
            active,
            pending,
            completed,
            failed,
            ..
        } = &mut self.state;
        [active, pending, completed, failed]
    }
}
