//! Before/after evaluation of an attempt.

use tracing::info;

use super::Planner;
use crate::domain::action::ActionPlan;
use crate::domain::feedback::Feedback;
use crate::domain::outcome::{Evaluation, ExecutionResult};
use crate::domain::task::Task;

/// Absorbs float noise such as `0.6 - 0.5 = 0.09999999999999998`.
const TOLERANCE: f64 = 1e-9;

impl Planner {
    /// Compare the plan's metric between two feedback snapshots.
    ///
    /// - `delta >= min_improvement` → success
    /// - `0 < delta < min_improvement` → partial
    /// - otherwise → failure
    pub fn evaluate(
        &self,
        task: &Task,
        plan: &ActionPlan,
        before: &Feedback,
        after: &Feedback,
    ) -> Evaluation {
        let metric = plan.criteria.metric;
        let b = before.metric(metric);
        let a = after.metric(metric);
        let delta = a - b;

        let result = if delta + TOLERANCE >= plan.criteria.min_improvement {
            ExecutionResult::Success
        } else if delta > TOLERANCE {
            ExecutionResult::Partial
        } else {
            ExecutionResult::Failure
        };

        info!(
            task_id = %task.id,
            metric = ?metric,
            before = b,
            after = a,
            delta,
            result = result.as_str(),
            "attempt evaluated"
        );
        Evaluation {
            result,
            metric,
            before: b,
            after: a,
            delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TaskId;
    use crate::domain::task::{NewTask, TaskKind, TaskPriority};
    use crate::planner::{PlannerConfig, test_planner};
    use chrono::Utc;
    use rstest::rstest;
    use ulid::Ulid;

    #[rstest]
    #[case(0.5, 0.6, ExecutionResult::Success)]
    #[case(0.5, 0.9, ExecutionResult::Success)]
    #[case(0.5, 0.55, ExecutionResult::Partial)]
    #[case(0.5, 0.5, ExecutionResult::Failure)]
    #[case(0.5, 0.3, ExecutionResult::Failure)]
    fn proportion_fix_is_judged_on_proportion_score(
        #[case] before: f64,
        #[case] after: f64,
        #[case] expected: ExecutionResult,
    ) {
        let planner = test_planner(PlannerConfig::default());
        let task = Task::from_draft(
            TaskId::from_ulid(Ulid::new()),
            1,
            NewTask::new(TaskKind::FixProportions, "fix", TaskPriority::High),
            3,
            Utc::now(),
        );
        let plan = planner.plan_actions(&task, 1).unwrap();

        let before_fb = Feedback {
            proportion_score: Some(before),
            symmetry_score: Some(0.1),
            ..Feedback::default()
        };
        let after_fb = Feedback {
            proportion_score: Some(after),
            // unrelated scores do not count
            symmetry_score: Some(0.9),
            ..Feedback::default()
        };

        let eval = planner.evaluate(&task, &plan, &before_fb, &after_fb);
        assert_eq!(eval.result, expected);
        assert!((eval.delta - (after - before)).abs() < 1e-12);
    }
}
