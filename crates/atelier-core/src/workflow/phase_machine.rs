//! PhaseMachine - 創作フェーズの状態機械
//!
//! - `advance`: 1 ステップ前進のみ（complete からは no-op で false）
//! - `regress`: 厳密に前のフェーズならどこへでも
//! - `stay`: 同じフェーズ内の反復（状態は変わらない）
//!
//! すべての呼び出しは DecisionLog に記録します。拒否されたものも `invalid_transition` として残します。

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::decision_log::DecisionLog;
use crate::domain::decision::LogEvent;
use crate::domain::phase::{DrawingPhase, PhaseTransition, TransitionKind};
use crate::ports::Clock;

/// Quality needed to leave each phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    pub sketch: f64,
    pub refinement: f64,
    pub stylization: f64,
    pub rendering: f64,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            sketch: 0.7,
            refinement: 0.75,
            stylization: 0.75,
            rendering: 0.8,
        }
    }
}

impl PhaseThresholds {
    pub fn exit(&self, phase: DrawingPhase) -> Option<f64> {
        match phase {
            DrawingPhase::Sketch => Some(self.sketch),
            DrawingPhase::Refinement => Some(self.refinement),
            DrawingPhase::Stylization => Some(self.stylization),
            DrawingPhase::Rendering => Some(self.rendering),
            DrawingPhase::Complete => None,
        }
    }
}

/// When to advise going back a phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionPolicy {
    pub enabled: bool,
    /// Quality below this counts as poor.
    pub below: f64,
    /// Iterations spent in the phase before regression is considered.
    pub min_iterations: u32,
}

impl Default for RegressionPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            below: 0.4,
            min_iterations: 3,
        }
    }
}

/// `quality` when present, otherwise the mean of all metrics.
fn aggregate_quality(metrics: &BTreeMap<String, f64>) -> Option<f64> {
    if let Some(q) = metrics.get("quality") {
        return Some(*q);
    }
    if metrics.is_empty() {
        return None;
    }
    Some(metrics.values().sum::<f64>() / metrics.len() as f64)
}

/// Phase state, its accepted transition history and the per-phase iteration counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    pub current: DrawingPhase,
    pub iteration_in_phase: u32,
    /// When the current phase was entered. `stay` leaves it alone.
    pub entered_at: DateTime<Utc>,
    pub transitions: Vec<PhaseTransition>,
}

pub struct PhaseMachine {
    state: PhaseState,
    thresholds: PhaseThresholds,
    clock: Arc<dyn Clock>,
}

impl PhaseMachine {
    pub fn new(thresholds: PhaseThresholds, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: PhaseState {
                current: DrawingPhase::Sketch,
                iteration_in_phase: 0,
                entered_at: clock.now(),
                transitions: Vec::new(),
            },
            thresholds,
            clock,
        }
    }

    pub fn current(&self) -> DrawingPhase {
        self.state.current
    }

    pub fn iteration_in_phase(&self) -> u32 {
        self.state.iteration_in_phase
    }

    /// Time since the current phase was entered, zero if the clock went backwards.
    pub fn time_in_phase(&self) -> Duration {
        (self.clock.now() - self.state.entered_at).max(Duration::zero())
    }

    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.state.transitions
    }

    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    pub fn thresholds(&self) -> &PhaseThresholds {
        &self.thresholds
    }

    pub fn advance(&mut self, reason: &str, log: &mut DecisionLog) -> bool {
        self.advance_with_metrics(reason, BTreeMap::new(), log)
    }

    /// `advance`, with the metrics that motivated it kept in the log entry.
    pub fn advance_with_metrics(
        &mut self,
        reason: &str,
        metrics: BTreeMap<String, f64>,
        log: &mut DecisionLog,
    ) -> bool {
        match self.state.current.next() {
            Some(next) => {
                self.accept(next, TransitionKind::Advance, reason, metrics, log);
                true
            }
            None => {
                self.reject(None, TransitionKind::Advance, reason, "already complete", log);
                false
            }
        }
    }

    pub fn regress(&mut self, target: DrawingPhase, reason: &str, log: &mut DecisionLog) -> bool {
        self.regress_with_metrics(target, reason, BTreeMap::new(), log)
    }

    pub fn regress_with_metrics(
        &mut self,
        target: DrawingPhase,
        reason: &str,
        metrics: BTreeMap<String, f64>,
        log: &mut DecisionLog,
    ) -> bool {
        if target >= self.state.current {
            let rejection = format!(
                "{target} is not earlier than {}",
                self.state.current
            );
            self.reject(Some(target), TransitionKind::Regress, reason, &rejection, log);
            return false;
        }
        self.accept(target, TransitionKind::Regress, reason, metrics, log);
        true
    }

    pub fn stay(&mut self, reason: &str, log: &mut DecisionLog) {
        let current = self.state.current;
        self.accept(current, TransitionKind::Stay, reason, BTreeMap::new(), log);
    }

    /// Dispatch to `stay`, `advance` or `regress`. Skipping phases forward is rejected.
    pub fn transition_to(
        &mut self,
        target: DrawingPhase,
        reason: &str,
        log: &mut DecisionLog,
    ) -> bool {
        let current = self.state.current;
        if target == current {
            self.stay(reason, log);
            true
        } else if Some(target) == current.next() {
            self.advance(reason, log)
        } else if target < current {
            self.regress(target, reason, log)
        } else {
            let rejection = format!("cannot skip from {current} to {target}");
            self.reject(Some(target), TransitionKind::Advance, reason, &rejection, log);
            false
        }
    }

    /// Advisory: the next phase when the current phase's exit threshold is met.
    pub fn suggest_transition(&self, metrics: &BTreeMap<String, f64>) -> Option<DrawingPhase> {
        let threshold = self.thresholds.exit(self.state.current)?;
        let quality = aggregate_quality(metrics)?;
        if quality >= threshold {
            self.state.current.next()
        } else {
            None
        }
    }

    /// Advisory: the previous phase when quality stays poor after enough iterations.
    pub fn suggest_regression(
        &self,
        metrics: &BTreeMap<String, f64>,
        policy: &RegressionPolicy,
    ) -> Option<DrawingPhase> {
        if !policy.enabled || self.state.current.is_complete() {
            return None;
        }
        let quality = aggregate_quality(metrics)?;
        if quality < policy.below && self.state.iteration_in_phase >= policy.min_iterations {
            self.state.current.previous()
        } else {
            None
        }
    }

    /// Set the phase without validation. Only rollback uses this; the rollback entry records it.
    pub fn restore(&mut self, phase: DrawingPhase) {
        self.state.current = phase;
        self.state.iteration_in_phase = 0;
        self.state.entered_at = self.clock.now();
    }

    /// Back to sketch for an operator reset. Logged as a regression unless already in sketch.
    pub fn reset(&mut self, reason: &str, log: &mut DecisionLog) {
        if self.state.current != DrawingPhase::Sketch {
            self.regress(DrawingPhase::Sketch, reason, log);
        }
        self.state.iteration_in_phase = 0;
    }

    fn accept(
        &mut self,
        to: DrawingPhase,
        kind: TransitionKind,
        reason: &str,
        metrics: BTreeMap<String, f64>,
        log: &mut DecisionLog,
    ) {
        let from = self.state.current;
        let at = self.clock.now();
        if kind == TransitionKind::Stay {
            self.state.iteration_in_phase += 1;
        } else {
            self.state.current = to;
            self.state.iteration_in_phase = 0;
            self.state.entered_at = at;
            info!(from = %from, to = %to, kind = ?kind, reason, "phase transition");
        }
        self.state.transitions.push(PhaseTransition {
            from,
            to,
            kind,
            reason: reason.to_string(),
            at,
        });
        log.record(LogEvent::PhaseTransition {
            from,
            to,
            transition: kind,
            reason: reason.to_string(),
            iteration_in_phase: self.state.iteration_in_phase,
            metrics,
        });
    }

    fn reject(
        &self,
        requested: Option<DrawingPhase>,
        kind: TransitionKind,
        reason: &str,
        rejection: &str,
        log: &mut DecisionLog,
    ) {
        warn!(
            from = %self.state.current,
            requested = ?requested,
            kind = ?kind,
            rejection,
            "phase transition rejected"
        );
        log.record(LogEvent::InvalidTransition {
            from: self.state.current,
            requested,
            transition: kind,
            reason: reason.to_string(),
            rejection: rejection.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::EntryKind;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::TimeZone;
    use rstest::rstest;

    fn setup() -> (PhaseMachine, DecisionLog) {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        (
            PhaseMachine::new(PhaseThresholds::default(), clock.clone()),
            DecisionLog::new(clock),
        )
    }

    fn metrics(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn advance_from_complete_is_a_logged_no_op() {
        let (mut pm, mut log) = setup();
        for _ in 0..4 {
            assert!(pm.advance("next", &mut log));
        }
        assert_eq!(pm.current(), DrawingPhase::Complete);

        assert!(!pm.advance("again", &mut log));
        assert_eq!(pm.current(), DrawingPhase::Complete);
        assert_eq!(log.last().map(|e| e.kind()), Some(EntryKind::InvalidTransition));
        assert_eq!(pm.transitions().len(), 4);
    }

    #[test]
    fn regress_must_target_an_earlier_phase() {
        let (mut pm, mut log) = setup();

        assert!(!pm.regress(DrawingPhase::Refinement, "back", &mut log));
        assert!(!pm.regress(DrawingPhase::Sketch, "same", &mut log));
        assert_eq!(pm.current(), DrawingPhase::Sketch);
        assert_eq!(log.statistics().count(EntryKind::InvalidTransition), 2);

        for _ in 0..3 {
            pm.advance("next", &mut log);
        }
        assert_eq!(pm.current(), DrawingPhase::Rendering);
        assert!(pm.regress(DrawingPhase::Sketch, "fix fundamentals", &mut log));
        assert_eq!(pm.current(), DrawingPhase::Sketch);

        match &log.last().unwrap().event {
            LogEvent::PhaseTransition {
                from, to, transition, ..
            } => {
                assert_eq!(*from, DrawingPhase::Rendering);
                assert_eq!(*to, DrawingPhase::Sketch);
                assert_eq!(*transition, TransitionKind::Regress);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn stay_counts_iterations_and_is_logged() {
        let (mut pm, mut log) = setup();
        pm.stay("iterate", &mut log);
        pm.stay("iterate", &mut log);
        assert_eq!(pm.iteration_in_phase(), 2);
        assert_eq!(pm.current(), DrawingPhase::Sketch);
        assert_eq!(log.len(), 2);

        pm.advance("next", &mut log);
        assert_eq!(pm.iteration_in_phase(), 0);
    }

    #[rstest]
    #[case(DrawingPhase::Sketch, true)]
    #[case(DrawingPhase::Refinement, true)]
    #[case(DrawingPhase::Stylization, false)]
    #[case(DrawingPhase::Complete, false)]
    fn transition_to_rejects_skips(#[case] target: DrawingPhase, #[case] accepted: bool) {
        let (mut pm, mut log) = setup();
        assert_eq!(pm.transition_to(target, "operator", &mut log), accepted);
        assert_eq!(log.len(), 1);
        let expected = if accepted {
            EntryKind::PhaseTransition
        } else {
            EntryKind::InvalidTransition
        };
        assert_eq!(log.last().map(|e| e.kind()), Some(expected));
    }

    #[test]
    fn suggestion_uses_quality_then_mean() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let thresholds = PhaseThresholds {
            sketch: 0.8,
            ..PhaseThresholds::default()
        };
        let pm = PhaseMachine::new(thresholds, clock);

        assert_eq!(
            pm.suggest_transition(&metrics(&[("quality", 0.9)])),
            Some(DrawingPhase::Refinement)
        );
        assert_eq!(pm.suggest_transition(&metrics(&[("quality", 0.79)])), None);
        assert_eq!(
            pm.suggest_transition(&metrics(&[("accuracy", 0.7), ("similarity", 0.95)])),
            Some(DrawingPhase::Refinement)
        );
        assert_eq!(pm.suggest_transition(&BTreeMap::new()), None);
    }

    #[test]
    fn regression_advice_needs_poor_quality_over_several_iterations() {
        let (mut pm, mut log) = setup();
        let policy = RegressionPolicy {
            enabled: true,
            ..RegressionPolicy::default()
        };
        pm.advance("next", &mut log);
        let poor = metrics(&[("quality", 0.3)]);

        assert_eq!(pm.suggest_regression(&poor, &policy), None);
        for _ in 0..3 {
            pm.stay("iterate", &mut log);
        }
        assert_eq!(pm.suggest_regression(&poor, &policy), Some(DrawingPhase::Sketch));
        assert_eq!(
            pm.suggest_regression(&metrics(&[("quality", 0.5)]), &policy),
            None
        );
        assert_eq!(
            pm.suggest_regression(&poor, &RegressionPolicy::default()),
            None
        );
    }

    #[test]
    fn time_in_phase_restarts_on_phase_change_only() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
        ));
        let mut pm = PhaseMachine::new(PhaseThresholds::default(), clock.clone());
        let mut log = DecisionLog::new(clock.clone());
        assert_eq!(pm.time_in_phase(), Duration::zero());

        clock.advance(Duration::minutes(3));
        pm.stay("iterate", &mut log);
        clock.advance(Duration::minutes(2));
        assert_eq!(pm.time_in_phase(), Duration::minutes(5));

        pm.advance("next", &mut log);
        assert_eq!(pm.time_in_phase(), Duration::zero());
        clock.advance(Duration::seconds(40));
        assert_eq!(pm.time_in_phase(), Duration::seconds(40));
        assert_eq!(pm.state().entered_at, pm.transitions()[1].at);

        pm.restore(DrawingPhase::Sketch);
        assert_eq!(pm.time_in_phase(), Duration::zero());
    }
}
