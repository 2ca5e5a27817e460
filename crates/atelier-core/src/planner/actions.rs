//! Task → ActionPlan.
//!
//! 並び順: `switch_tool` → (`change_layer`) → (`adjust_color`) → kind ごとの stroke。

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::Planner;
use crate::domain::action::{
    ActionKind, ActionPlan, DrawingAction, QualityMetric, Rgba, StrokePoint, SuccessCriteria,
    ToolConfig, ToolKind,
};
use crate::domain::errors::AtelierError;
use crate::domain::region::Region;
use crate::domain::task::{Task, TaskKind};

const DRAW_SECS: f64 = 2.0;
const ERASE_SECS: f64 = 1.0;
const SWITCH_SECS: f64 = 0.2;
const DEFAULT_PRESSURE: f64 = 0.5;
const DETAIL_LAYER: &str = "detail";

/// Stroke area used when a task has neither explicit points nor a region.
const CENTER: Region = Region {
    x: 0.4,
    y: 0.45,
    width: 0.2,
    height: 0.1,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum PointInput {
    Record {
        x: f64,
        y: f64,
        #[serde(default)]
        pressure: Option<f64>,
    },
    Pair(f64, f64),
    Triple(f64, f64, f64),
}

/// Parse a `stroke_points` parameter: an array of `{x, y, pressure?}`, `[x, y]` or `[x, y, p]`.
pub fn parse_stroke_points(value: &Value) -> Result<Vec<StrokePoint>, AtelierError> {
    let inputs: Vec<PointInput> = serde_json::from_value(value.clone())
        .map_err(|e| AtelierError::validation(format!("malformed stroke_points: {e}")))?;
    let points: Vec<StrokePoint> = inputs
        .into_iter()
        .map(|p| match p {
            PointInput::Record { x, y, pressure } => {
                StrokePoint::new(x, y, pressure.unwrap_or(DEFAULT_PRESSURE))
            }
            PointInput::Pair(x, y) => StrokePoint::new(x, y, DEFAULT_PRESSURE),
            PointInput::Triple(x, y, p) => StrokePoint::new(x, y, p),
        })
        .collect();
    if points.is_empty() {
        return Err(AtelierError::validation("stroke_points is empty"));
    }
    if points
        .iter()
        .any(|p| !(p.x.is_finite() && p.y.is_finite() && p.pressure.is_finite()))
    {
        return Err(AtelierError::validation("stroke_points must be finite"));
    }
    Ok(points)
}

fn parse_color(value: &Value) -> Result<Rgba, AtelierError> {
    let channels: Vec<u8> = serde_json::from_value(value.clone())
        .map_err(|e| AtelierError::validation(format!("malformed color: {e}")))?;
    match channels.as_slice() {
        [r, g, b] => Ok(Rgba(*r, *g, *b, 255)),
        [r, g, b, a] => Ok(Rgba(*r, *g, *b, *a)),
        _ => Err(AtelierError::validation(format!(
            "color needs 3 or 4 channels, got {}",
            channels.len()
        ))),
    }
}

fn draw_tool_for(kind: TaskKind) -> (ToolKind, f64) {
    match kind {
        TaskKind::FixPose | TaskKind::FixProportions | TaskKind::CorrectStructure => {
            (ToolKind::Pencil, 2.0)
        }
        TaskKind::AddDetail => (ToolKind::Brush, 4.0),
        TaskKind::FixHand
        | TaskKind::FixFace
        | TaskKind::RefineAnatomy
        | TaskKind::ImproveSymmetry
        | TaskKind::EnhanceSilhouette
        | TaskKind::AlignEdges => (ToolKind::Pen, 1.5),
    }
}

fn metric_for(kind: TaskKind) -> QualityMetric {
    match kind {
        TaskKind::FixProportions => QualityMetric::ProportionScore,
        TaskKind::ImproveSymmetry => QualityMetric::SymmetryScore,
        TaskKind::FixPose
        | TaskKind::CorrectStructure
        | TaskKind::EnhanceSilhouette
        | TaskKind::AlignEdges => QualityMetric::OverallSimilarity,
        TaskKind::FixHand | TaskKind::FixFace | TaskKind::AddDetail | TaskKind::RefineAnatomy => {
            QualityMetric::Quality
        }
    }
}

/// Tool size grows with the target: half size for a point, up to double for the whole canvas.
fn scaled(base: f64, region: Option<&Region>) -> f64 {
    match region {
        Some(r) => base * (0.5 + r.diagonal()).clamp(0.5, 2.0),
        None => base,
    }
}

impl Planner {
    /// Build the plan for attempt `attempt` (1-based) of `task`.
    pub fn plan_actions(&self, task: &Task, attempt: u32) -> Result<ActionPlan, AtelierError> {
        let region = task.region.as_ref();
        let points = self.stroke_points_for(task, attempt)?;
        let color = task.params.get("color").map(parse_color).transpose()?;

        let (tool_kind, base) = draw_tool_for(task.kind);
        let mut tool = ToolConfig::new(tool_kind, scaled(base, region));
        if let Some(c) = color {
            tool = tool.with_color(c);
        }
        let eraser = ToolConfig::new(ToolKind::Eraser, scaled(10.0, region));

        let mut actions = vec![self.action(
            ActionKind::SwitchTool,
            format!("Switch to {tool_kind:?} for {}", task.kind),
            Some(tool),
            Vec::new(),
            region,
            SWITCH_SECS,
        )];

        if task.kind == TaskKind::AddDetail {
            let mut a = self.action(
                ActionKind::ChangeLayer,
                format!("Select the {DETAIL_LAYER} layer"),
                None,
                Vec::new(),
                None,
                SWITCH_SECS,
            );
            a.params.insert("layer".into(), Value::from(DETAIL_LAYER));
            actions.push(a);
        }

        if let Some(c) = color {
            let mut a = self.action(
                ActionKind::AdjustColor,
                format!("Set colour to rgba({}, {}, {}, {})", c.0, c.1, c.2, c.3),
                Some(tool),
                Vec::new(),
                None,
                SWITCH_SECS,
            );
            a.params
                .insert("color".into(), Value::from(vec![c.0, c.1, c.2, c.3]));
            actions.push(a);
        }

        match task.kind {
            TaskKind::FixHand
            | TaskKind::FixFace
            | TaskKind::RefineAnatomy
            | TaskKind::FixProportions
            | TaskKind::CorrectStructure => {
                actions.push(self.action(
                    ActionKind::EraseStroke,
                    format!("Erase for {}", task.kind),
                    Some(eraser),
                    points.clone(),
                    region,
                    ERASE_SECS,
                ));
                actions.push(self.action(
                    ActionKind::DrawStroke,
                    format!("Redraw for {}", task.kind),
                    Some(tool),
                    points,
                    region,
                    DRAW_SECS,
                ));
            }
            TaskKind::EnhanceSilhouette | TaskKind::AlignEdges => {
                actions.push(self.action(
                    ActionKind::DrawStroke,
                    format!("Trace outline for {}", task.kind),
                    Some(tool),
                    points,
                    region,
                    DRAW_SECS,
                ));
            }
            TaskKind::AddDetail => {
                actions.push(self.action(
                    ActionKind::RefineArea,
                    "Add detail strokes".to_string(),
                    Some(tool),
                    points,
                    region,
                    DRAW_SECS,
                ));
            }
            TaskKind::FixPose | TaskKind::ImproveSymmetry => {
                actions.push(self.action(
                    ActionKind::DrawStroke,
                    format!("Draw for {}", task.kind),
                    Some(tool),
                    points,
                    region,
                    DRAW_SECS,
                ));
            }
        }

        let criteria = SuccessCriteria {
            metric: metric_for(task.kind),
            min_improvement: self.config.min_improvement,
        };
        let plan = ActionPlan::new(self.ids.plan_id(), task.id, attempt, actions, criteria);
        debug!(
            task_id = %task.id,
            plan_id = %plan.id,
            attempt,
            actions = plan.actions.len(),
            "action plan created"
        );
        Ok(plan)
    }

    fn stroke_points_for(&self, task: &Task, attempt: u32) -> Result<Vec<StrokePoint>, AtelierError> {
        if let Some(raw) = task.params.get("stroke_points") {
            return parse_stroke_points(raw);
        }
        // 再試行ごとに少しだけ筆圧を上げる
        let pressure = (DEFAULT_PRESSURE + 0.1 * attempt.saturating_sub(1) as f64).min(1.0);
        let n = self.config.stroke_points;
        let coords = match task.region {
            Some(r) if task.kind.traces_outline() => r.boundary(n),
            Some(r) => r.sweep(n),
            None => CENTER.sweep(n),
        };
        Ok(coords
            .into_iter()
            .map(|(x, y)| StrokePoint::new(x, y, pressure))
            .collect())
    }

    fn action(
        &self,
        kind: ActionKind,
        description: String,
        tool: Option<ToolConfig>,
        points: Vec<StrokePoint>,
        region: Option<&Region>,
        estimated_duration: f64,
    ) -> DrawingAction {
        DrawingAction {
            id: self.ids.action_id(),
            kind,
            description,
            tool,
            points,
            region: region.copied(),
            params: BTreeMap::new(),
            estimated_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TaskId;
    use crate::domain::task::{NewTask, TaskPriority};
    use crate::planner::{PlannerConfig, test_planner};
    use chrono::Utc;
    use serde_json::json;
    use ulid::Ulid;

    fn task(draft: NewTask) -> Task {
        Task::from_draft(TaskId::from_ulid(Ulid::new()), 1, draft, 3, Utc::now())
    }

    fn kinds(plan: &ActionPlan) -> Vec<ActionKind> {
        plan.actions.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn hand_fix_switches_tool_then_erases_and_redraws() {
        let region = Region::new(0.1, 0.5, 0.2, 0.2).unwrap();
        let t = task(NewTask::new(TaskKind::FixHand, "hand", TaskPriority::High).with_region(region));
        let plan = test_planner(PlannerConfig::default()).plan_actions(&t, 1).unwrap();

        assert_eq!(
            kinds(&plan),
            vec![ActionKind::SwitchTool, ActionKind::EraseStroke, ActionKind::DrawStroke]
        );
        assert_eq!(plan.task_id, t.id);
        assert_eq!(plan.actions[2].points.len(), 5);
        assert!((plan.estimated_duration - 3.2).abs() < 1e-9);
        assert_eq!(plan.stroke_count(), 2);
        assert_eq!(plan.criteria.metric, QualityMetric::Quality);
        assert!(plan.actions.iter().all(|a| a.region == Some(region)));
    }

    #[test]
    fn detail_uses_detail_layer_and_colour() {
        let t = task(
            NewTask::new(TaskKind::AddDetail, "detail", TaskPriority::Low)
                .with_param("color", json!([200, 30, 30])),
        );
        let plan = test_planner(PlannerConfig::default()).plan_actions(&t, 1).unwrap();

        assert_eq!(
            kinds(&plan),
            vec![
                ActionKind::SwitchTool,
                ActionKind::ChangeLayer,
                ActionKind::AdjustColor,
                ActionKind::RefineArea
            ]
        );
        assert_eq!(plan.actions[1].params.get("layer"), Some(&json!("detail")));
        let tool = plan.actions[3].tool.unwrap();
        assert_eq!(tool.kind, ToolKind::Brush);
        assert_eq!(tool.color, Some(Rgba(200, 30, 30, 255)));
    }

    #[test]
    fn outline_kinds_trace_the_region_boundary() {
        let region = Region::new(0.2, 0.2, 0.4, 0.4).unwrap();
        let t = task(
            NewTask::new(TaskKind::EnhanceSilhouette, "outline", TaskPriority::Medium)
                .with_region(region),
        );
        let plan = test_planner(PlannerConfig::default()).plan_actions(&t, 1).unwrap();

        let draw = plan.actions.last().unwrap();
        assert_eq!(draw.kind, ActionKind::DrawStroke);
        assert_eq!(draw.points.first().map(|p| (p.x, p.y)), Some((0.2, 0.2)));
        assert_eq!(draw.points.last().map(|p| (p.x, p.y)), Some((0.2, 0.2)));
        assert_eq!(plan.criteria.metric, QualityMetric::OverallSimilarity);
    }

    #[test]
    fn explicit_points_win_and_each_attempt_gets_a_fresh_plan() {
        let t = task(
            NewTask::new(TaskKind::FixPose, "pose", TaskPriority::High)
                .with_param("stroke_points", json!([[0.1, 0.1], {"x": 0.2, "y": 0.3, "pressure": 0.9}])),
        );
        let planner = test_planner(PlannerConfig::default());
        let first = planner.plan_actions(&t, 1).unwrap();
        let second = planner.plan_actions(&t, 2).unwrap();

        let pts = &first.actions[1].points;
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0], StrokePoint::new(0.1, 0.1, 0.5));
        assert_eq!(pts[1], StrokePoint::new(0.2, 0.3, 0.9));
        assert_ne!(first.id, second.id);
        assert_eq!(second.attempt, 2);
    }

    #[test]
    fn malformed_params_are_rejected() {
        let planner = test_planner(PlannerConfig::default());
        let bad_points = task(
            NewTask::new(TaskKind::FixPose, "pose", TaskPriority::High)
                .with_param("stroke_points", json!("diagonal")),
        );
        assert!(planner.plan_actions(&bad_points, 1).is_err());

        let bad_color = task(
            NewTask::new(TaskKind::FixPose, "pose", TaskPriority::High)
                .with_param("color", json!([1, 2])),
        );
        assert!(planner.plan_actions(&bad_color, 1).is_err());
    }
}
