//! DecisionLog - 追記専用の監査ログ
//!
//! - seq は 1 始まりで欠番なし
//! - 時刻は注入された Clock から
//! - 削除・書き換えの API は持たない

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::decision::{DecisionLogEntry, EntryKind, LogEvent};
use crate::domain::ids::TaskId;
use crate::domain::phase::{DrawingPhase, StrokeIntent};
use crate::ports::Clock;

/// Entry counts per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStatistics {
    pub total: usize,
    pub by_kind: BTreeMap<EntryKind, usize>,
}

impl LogStatistics {
    pub fn count(&self, kind: EntryKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }
}

/// Replay summary of everything that happened while the workflow sat in one phase.
///
/// A phase visited twice (e.g. after a regression) is summarized once, with both visits added up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: DrawingPhase,
    pub visits: usize,
    pub strokes: usize,
    pub strokes_by_intent: BTreeMap<StrokeIntent, usize>,
    pub evaluations: usize,
    /// Mean delta over the evaluations that produced one, `None` when none did.
    pub mean_improvement: Option<f64>,
    /// Wall time spent in the phase, the current visit counted up to now.
    pub duration: Duration,
}

impl PhaseSummary {
    fn new(phase: DrawingPhase) -> Self {
        Self {
            phase,
            visits: 0,
            strokes: 0,
            strokes_by_intent: BTreeMap::new(),
            evaluations: 0,
            mean_improvement: None,
            duration: Duration::ZERO,
        }
    }
}

pub struct DecisionLog {
    entries: Vec<DecisionLogEntry>,
    started_at: DateTime<Utc>,
    clock: Arc<dyn Clock>,
}

impl DecisionLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            started_at: clock.now(),
            clock,
        }
    }


    /// Append an event and return its seq.
    pub fn record(&mut self, event: LogEvent) -> u64 {
        let seq = self.entries.len() as u64 + 1;
        trace!(seq, kind = %event.kind(), "decision recorded");
        self.entries.push(DecisionLogEntry {
            seq,
            at: self.clock.now(),
            event,
        });
        seq
    }

    /// Entries in order. Call again to start over.
    pub fn export(&self) -> std::slice::Iter<'_, DecisionLogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&DecisionLogEntry> {
        self.entries.last()
    }

    pub fn entries_for_task(&self, id: TaskId) -> Vec<&DecisionLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.event.task_id() == Some(id))
            .collect()
    }

    pub fn statistics(&self) -> LogStatistics {
        let mut stats = LogStatistics {
            total: self.entries.len(),
            by_kind: BTreeMap::new(),
        };
        for entry in &self.entries {
            *stats.by_kind.entry(entry.kind()).or_insert(0) += 1;
        }
        stats
    }

    /// Replay the log and summarize it per phase, in phase order.
    ///
    /// Phase time runs from the log's creation and is split at every phase change
    /// (transition or rollback). The open interval ends at `clock.now()`.
    pub fn phase_summaries(&self) -> Vec<PhaseSummary> {
        let mut summaries: BTreeMap<DrawingPhase, PhaseSummary> = BTreeMap::new();
        // phase -> (sum of deltas, evaluations that produced a delta)
        let mut deltas: BTreeMap<DrawingPhase, (f64, usize)> = BTreeMap::new();
        let mut current = DrawingPhase::Sketch;
        let mut entered_at = self.started_at;
        summaries
            .entry(current)
            .or_insert_with(|| PhaseSummary::new(current))
            .visits += 1;

        for entry in &self.entries {
            let next = match &entry.event {
                LogEvent::PhaseTransition { from, to, .. } if from != to => Some(*to),
                LogEvent::RollbackPerformed { to_phase, .. } if *to_phase != current => {
                    Some(*to_phase)
                }
                LogEvent::StrokeExecuted {
                    phase,
                    intent,
                    action,
                    ..
                } if action.is_stroke() => {
                    let summary = summaries
                        .entry(*phase)
                        .or_insert_with(|| PhaseSummary::new(*phase));
                    summary.strokes += 1;
                    *summary.strokes_by_intent.entry(*intent).or_insert(0) += 1;
                    None
                }
                LogEvent::TaskEvaluated { evaluation, .. } => {
                    summaries
                        .entry(current)
                        .or_insert_with(|| PhaseSummary::new(current))
                        .evaluations += 1;
                    if let Some(eval) = evaluation {
                        let (sum, count) = deltas.entry(current).or_insert((0.0, 0));
                        *sum += eval.delta;
                        *count += 1;
                    }
                    None
                }
                _ => None,
            };

            if let Some(next) = next {
                add_elapsed(&mut summaries, current, entered_at, entry.at);
                current = next;
                entered_at = entry.at;
                summaries
                    .entry(current)
                    .or_insert_with(|| PhaseSummary::new(current))
                    .visits += 1;
            }
        }
        add_elapsed(&mut summaries, current, entered_at, self.clock.now());

        summaries
            .into_values()
            .map(|mut s| {
                if let Some(&(sum, count)) = deltas.get(&s.phase) {
                    if count > 0 {
                        s.mean_improvement = Some(sum / count as f64);
                    }
                }
                s
            })
            .collect()
    }
}

fn add_elapsed(
    summaries: &mut BTreeMap<DrawingPhase, PhaseSummary>,
    phase: DrawingPhase,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) {
    // 時計が戻った区間は 0 扱い
    let elapsed = (to - from).to_std().unwrap_or_default();
    summaries
        .entry(phase)
        .or_insert_with(|| PhaseSummary::new(phase))
        .duration += elapsed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::QualityMetric;
    use crate::domain::outcome::{Evaluation, ExecutionResult, TaskDisposition};
    use crate::domain::phase::TransitionKind;
    use crate::domain::task::{TaskKind, TaskPriority};
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};
    use ulid::Ulid;

    fn created(task_id: TaskId) -> LogEvent {
        LogEvent::TaskCreated {
            task_id,
            task_kind: TaskKind::FixHand,
            priority: TaskPriority::High,
            description: "hand".into(),
            region: None,
        }
    }

    #[test]
    fn seqs_are_gapless_and_export_matches_record_calls() {
        let mut log = DecisionLog::new(Arc::new(SystemClock));
        let id = TaskId::from_ulid(Ulid::new());

        let seqs: Vec<u64> = (0..5).map(|_| log.record(created(id))).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert_eq!(log.export().count(), 5);

        // restartable
        let again: Vec<u64> = log.export().map(|e| e.seq).collect();
        assert_eq!(again, seqs);
    }

    #[test]
    fn timestamps_come_from_the_clock() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let mut log = DecisionLog::new(Arc::new(FixedClock::new(at)));
        log.record(created(TaskId::from_ulid(Ulid::new())));
        assert_eq!(log.last().map(|e| e.at), Some(at));
    }

    #[test]
    fn statistics_and_task_filter() {
        let mut log = DecisionLog::new(Arc::new(SystemClock));
        let a = TaskId::from_ulid(Ulid::new());
        let b = TaskId::from_ulid(Ulid::new());
        log.record(created(a));
        log.record(created(b));
        log.record(LogEvent::InvalidTransition {
            from: DrawingPhase::Sketch,
            requested: Some(DrawingPhase::Rendering),
            transition: TransitionKind::Advance,
            reason: "skip".into(),
            rejection: "cannot skip phases".into(),
        });

        let stats = log.statistics();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count(EntryKind::TaskCreated), 2);
        assert_eq!(stats.count(EntryKind::InvalidTransition), 1);
        assert_eq!(stats.count(EntryKind::RollbackPerformed), 0);
        assert_eq!(log.entries_for_task(a).len(), 1);
    }

    #[test]
    fn phase_summaries_follow_transitions() {
        let mut log = DecisionLog::new(Arc::new(SystemClock));
        let task_id = TaskId::from_ulid(Ulid::new());
        let plan_id = crate::domain::ids::PlanId::from_ulid(Ulid::new());
        let stroke = |phase, intent| LogEvent::StrokeExecuted {
            action_id: crate::domain::ids::ActionId::from_ulid(Ulid::new()),
            task_id,
            plan_id,
            action: crate::domain::action::ActionKind::DrawStroke,
            intent,
            phase,
            tool: None,
            point_count: 5,
            description: "draw".into(),
            before: 0.4,
            after: Some(0.6),
        };
        let evaluated = |delta| LogEvent::TaskEvaluated {
            task_id,
            plan_id,
            attempt: 1,
            result: ExecutionResult::Success,
            evaluation: Some(Evaluation {
                result: ExecutionResult::Success,
                metric: QualityMetric::Quality,
                before: 0.4,
                after: 0.4 + delta,
                delta,
            }),
            disposition: TaskDisposition::Completed,
            error: None,
        };

        log.record(stroke(DrawingPhase::Sketch, StrokeIntent::Gesture));
        log.record(stroke(DrawingPhase::Sketch, StrokeIntent::Gesture));
        log.record(evaluated(0.2));
        log.record(LogEvent::PhaseTransition {
            from: DrawingPhase::Sketch,
            to: DrawingPhase::Refinement,
            transition: TransitionKind::Advance,
            reason: "quality".into(),
            iteration_in_phase: 0,
            metrics: BTreeMap::new(),
        });
        log.record(stroke(DrawingPhase::Refinement, StrokeIntent::Contour));
        log.record(evaluated(0.1));
        log.record(evaluated(0.3));

        let summaries = log.phase_summaries();
        assert_eq!(summaries.len(), 2);

        let sketch = &summaries[0];
        assert_eq!(sketch.phase, DrawingPhase::Sketch);
        assert_eq!(sketch.strokes, 2);
        assert_eq!(sketch.strokes_by_intent.get(&StrokeIntent::Gesture), Some(&2));
        assert_eq!(sketch.evaluations, 1);

        let refinement = &summaries[1];
        assert_eq!(refinement.visits, 1);
        assert_eq!(refinement.evaluations, 2);
        let mean = refinement.mean_improvement.unwrap();
        assert!((mean - 0.2).abs() < 1e-9);
    }

    fn evaluated_task(task_id: TaskId, delta: Option<f64>) -> LogEvent {
        LogEvent::TaskEvaluated {
            task_id,
            plan_id: crate::domain::ids::PlanId::from_ulid(Ulid::new()),
            attempt: 1,
            result: ExecutionResult::Failure,
            evaluation: delta.map(|delta| Evaluation {
                result: ExecutionResult::Success,
                metric: QualityMetric::Quality,
                before: 0.4,
                after: 0.4 + delta,
                delta,
            }),
            disposition: TaskDisposition::Retrying,
            error: delta.is_none().then(|| "perception timed out".to_string()),
        }
    }

    fn advance_to(to: DrawingPhase) -> LogEvent {
        LogEvent::PhaseTransition {
            from: DrawingPhase::Sketch,
            to,
            transition: TransitionKind::Advance,
            reason: "quality".into(),
            iteration_in_phase: 0,
            metrics: BTreeMap::new(),
        }
    }

    #[test]
    fn aborted_evaluations_do_not_dilute_the_mean() {
        let mut log = DecisionLog::new(Arc::new(SystemClock));
        let task_id = TaskId::from_ulid(Ulid::new());
        log.record(evaluated_task(task_id, Some(0.3)));
        log.record(evaluated_task(task_id, None));
        log.record(evaluated_task(task_id, Some(0.1)));

        let sketch = &log.phase_summaries()[0];
        assert_eq!(sketch.evaluations, 3);
        let mean = sketch.mean_improvement.unwrap();
        assert!((mean - 0.2).abs() < 1e-9);
    }

    #[test]
    fn only_aborted_evaluations_leave_the_mean_unset() {
        let mut log = DecisionLog::new(Arc::new(SystemClock));
        log.record(evaluated_task(TaskId::from_ulid(Ulid::new()), None));

        let sketch = &log.phase_summaries()[0];
        assert_eq!(sketch.evaluations, 1);
        assert_eq!(sketch.mean_improvement, None);
    }

    #[test]
    fn phase_durations_are_split_at_transitions() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        let mut log = DecisionLog::new(clock.clone());

        clock.advance(chrono::Duration::minutes(5));
        log.record(advance_to(DrawingPhase::Refinement));
        clock.advance(chrono::Duration::minutes(2));

        let summaries = log.phase_summaries();
        assert_eq!(summaries[0].phase, DrawingPhase::Sketch);
        assert_eq!(summaries[0].duration, Duration::from_secs(5 * 60));
        assert_eq!(summaries[1].phase, DrawingPhase::Refinement);
        assert_eq!(summaries[1].duration, Duration::from_secs(2 * 60));

        // 現在のフェーズは now まで伸び続ける
        clock.advance(chrono::Duration::minutes(1));
        assert_eq!(log.phase_summaries()[1].duration, Duration::from_secs(3 * 60));
    }

    #[test]
    fn revisited_phase_accumulates_both_visits() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        let mut log = DecisionLog::new(clock.clone());

        clock.advance(chrono::Duration::minutes(4));
        log.record(advance_to(DrawingPhase::Refinement));
        clock.advance(chrono::Duration::minutes(1));
        log.record(LogEvent::PhaseTransition {
            from: DrawingPhase::Refinement,
            to: DrawingPhase::Sketch,
            transition: TransitionKind::Regress,
            reason: "quality dropped".into(),
            iteration_in_phase: 1,
            metrics: BTreeMap::new(),
        });
        clock.advance(chrono::Duration::minutes(6));

        let sketch = &log.phase_summaries()[0];
        assert_eq!(sketch.visits, 2);
        assert_eq!(sketch.duration, Duration::from_secs(10 * 60));
    }
}
