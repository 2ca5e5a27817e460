//! Retry policy: decides what an evaluated attempt means for its task.

use serde::{Deserialize, Serialize};

use crate::domain::outcome::{ExecutionResult, RetryDecision};
use crate::domain::task::Task;

/// Retry policy for corrective tasks.
///
/// - `max_retries`: default budget for new tasks (a draft may override it)
/// - `critical_partial_bonus`: critical tasks that improve only partially get one extra attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub critical_partial_bonus: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            critical_partial_bonus: true,
        }
    }
}

impl RetryPolicy {
    /// Pure decision; applying it is `TaskRegistry::settle`.
    ///
    /// - success → complete
    /// - partial / failure → retry
    /// - critical + partial → retry, eligible for the bonus once regular retries run out
    pub fn retry_decision(&self, task: &Task, result: ExecutionResult) -> RetryDecision {
        match result {
            ExecutionResult::Success => RetryDecision::Complete,
            ExecutionResult::Partial => RetryDecision::Retry {
                bonus_eligible: self.critical_partial_bonus && task.is_critical(),
            },
            ExecutionResult::Failure => RetryDecision::Retry {
                bonus_eligible: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TaskId;
    use crate::domain::task::{NewTask, TaskKind, TaskPriority};
    use chrono::Utc;
    use rstest::rstest;
    use ulid::Ulid;

    fn task(priority: TaskPriority) -> Task {
        Task::from_draft(
            TaskId::from_ulid(Ulid::new()),
            1,
            NewTask::new(TaskKind::CorrectStructure, "no pose", priority),
            3,
            Utc::now(),
        )
    }

    #[rstest]
    #[case(TaskPriority::Critical, ExecutionResult::Success, RetryDecision::Complete)]
    #[case(TaskPriority::Critical, ExecutionResult::Partial, RetryDecision::Retry { bonus_eligible: true })]
    #[case(TaskPriority::Critical, ExecutionResult::Failure, RetryDecision::Retry { bonus_eligible: false })]
    #[case(TaskPriority::High, ExecutionResult::Partial, RetryDecision::Retry { bonus_eligible: false })]
    #[case(TaskPriority::Low, ExecutionResult::Failure, RetryDecision::Retry { bonus_eligible: false })]
    fn decisions(
        #[case] priority: TaskPriority,
        #[case] result: ExecutionResult,
        #[case] expected: RetryDecision,
    ) {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retry_decision(&task(priority), result), expected);
    }

    #[test]
    fn bonus_can_be_switched_off() {
        let policy = RetryPolicy {
            critical_partial_bonus: false,
            ..RetryPolicy::default()
        };
        assert_eq!(
            policy.retry_decision(&task(TaskPriority::Critical), ExecutionResult::Partial),
            RetryDecision::Retry {
                bonus_eligible: false
            }
        );
    }
}
