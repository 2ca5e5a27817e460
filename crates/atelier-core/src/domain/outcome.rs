//! Outcome model: how a task attempt turned out.
//!
//! Pure data. Judging is done by the planner (`evaluate`) and the retry policy
//! (`retry_decision`); applying the verdict is the registry's job.

use serde::{Deserialize, Serialize};

use super::action::QualityMetric;

/// Classification of one attempt.
///
/// - `success`: improvement reached the plan's `min_improvement`
/// - `partial`: improved, but not enough
/// - `failure`: unchanged, regressed, or the plan could not be executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionResult {
    Success,
    Partial,
    Failure,
}

impl ExecutionResult {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionResult::Success => "success",
            ExecutionResult::Partial => "partial",
            ExecutionResult::Failure => "failure",
        }
    }
}

/// Before/after comparison on the plan's success metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub result: ExecutionResult,
    pub metric: QualityMetric,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
}

/// What the registry should do with a task after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Mark completed.
    Complete,
    /// Mark failed and hand to `schedule_retry`. When `bonus_eligible` is set and the
    /// regular retries are used up, the task may take its one bonus retry.
    Retry { bonus_eligible: bool },
}

/// Where a task ended up after an evaluated attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDisposition {
    Completed,
    /// Requeued with a regular retry.
    Retrying,
    /// Requeued with the one bonus retry of a critical task.
    BonusRetry,
    /// Retries exhausted. The task stays failed.
    PermanentlyFailed,
}

impl TaskDisposition {
    pub fn is_requeued(self) -> bool {
        matches!(self, TaskDisposition::Retrying | TaskDisposition::BonusRetry)
    }
}
