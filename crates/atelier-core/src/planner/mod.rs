//! Planner - feedback → task drafts, task → action plan, before/after evaluation.
//!
//! すべて決定的（同じ入力 → 同じ出力）。ID 以外に乱数や時刻を使いません。

mod actions;
mod evaluate;
mod rules;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ports::IdGenerator;

pub use actions::parse_stroke_points;

/// Planner thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// `proportion_score` below this creates a fix_proportions task.
    pub proportion_threshold: f64,
    /// `symmetry_score` below this creates an improve_symmetry task.
    pub symmetry_threshold: f64,
    /// Refinement areas at or above this severity are medium priority, below it low.
    pub severity_medium_threshold: f64,
    /// Points per synthesized stroke.
    pub stroke_points: usize,
    /// Improvement on the plan metric needed for success.
    pub min_improvement: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            proportion_threshold: 0.7,
            symmetry_threshold: 0.7,
            severity_medium_threshold: 0.5,
            stroke_points: 5,
            min_improvement: 0.1,
        }
    }
}

pub struct Planner {
    config: PlannerConfig,
    ids: Arc<dyn IdGenerator>,
}

impl Planner {
    pub fn new(config: PlannerConfig, ids: Arc<dyn IdGenerator>) -> Self {
        Self { config, ids }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }
}

#[cfg(test)]
pub(crate) fn test_planner(config: PlannerConfig) -> Planner {
    use crate::ports::{SystemClock, UlidGenerator};
    Planner::new(config, Arc::new(UlidGenerator::new(SystemClock)))
}
