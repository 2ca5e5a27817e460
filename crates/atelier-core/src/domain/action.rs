//! Drawing actions and action plans.
//!
//! An [`ActionPlan`] is generated fresh for every attempt of a task and never mutated
//! afterwards; the orchestrator only reads it while executing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{ActionId, PlanId, TaskId};
use super::region::Region;

/// A point of a stroke in canvas-normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    pub pressure: f64,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64, pressure: f64) -> Self {
        Self { x, y, pressure }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Pencil,
    Pen,
    Brush,
    Eraser,
}

/// RGBA colour, components in `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

impl Rgba {
    pub const BLACK: Rgba = Rgba(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba(255, 255, 255, 255);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub kind: ToolKind,
    pub size: f64,
    pub opacity: f64,
    pub color: Option<Rgba>,
}

impl ToolConfig {
    pub fn new(kind: ToolKind, size: f64) -> Self {
        Self {
            kind,
            size,
            opacity: 1.0,
            color: None,
        }
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = Some(color);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    DrawStroke,
    EraseStroke,
    SwitchTool,
    ChangeLayer,
    AdjustColor,
    RefineArea,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::DrawStroke => "draw_stroke",
            ActionKind::EraseStroke => "erase_stroke",
            ActionKind::SwitchTool => "switch_tool",
            ActionKind::ChangeLayer => "change_layer",
            ActionKind::AdjustColor => "adjust_color",
            ActionKind::RefineArea => "refine_area",
        }
    }

    /// Actions that put marks on (or take marks off) the canvas.
    pub fn is_stroke(self) -> bool {
        matches!(
            self,
            ActionKind::DrawStroke | ActionKind::EraseStroke | ActionKind::RefineArea
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A primitive drawing action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingAction {
    pub id: ActionId,
    pub kind: ActionKind,
    pub description: String,
    pub tool: Option<ToolConfig>,
    pub points: Vec<StrokePoint>,
    pub region: Option<Region>,
    pub params: BTreeMap<String, Value>,
    /// Seconds.
    pub estimated_duration: f64,
}

/// Metric an attempt is judged on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMetric {
    ProportionScore,
    SymmetryScore,
    OverallSimilarity,
    /// Mean of the three scores above.
    Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuccessCriteria {
    pub metric: QualityMetric,
    pub min_improvement: f64,
}

/// Ordered actions for one attempt of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub id: PlanId,
    pub task_id: TaskId,
    pub attempt: u32,
    pub actions: Vec<DrawingAction>,
    /// Sum of the actions' estimates, in seconds.
    pub estimated_duration: f64,
    pub criteria: SuccessCriteria,
}

impl ActionPlan {
    pub fn new(
        id: PlanId,
        task_id: TaskId,
        attempt: u32,
        actions: Vec<DrawingAction>,
        criteria: SuccessCriteria,
    ) -> Self {
        let estimated_duration = actions.iter().map(|a| a.estimated_duration).sum();
        Self {
            id,
            task_id,
            attempt,
            actions,
            estimated_duration,
            criteria,
        }
    }

    pub fn stroke_count(&self) -> usize {
        self.actions.iter().filter(|a| a.kind.is_stroke()).count()
    }
}
