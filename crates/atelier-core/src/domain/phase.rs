//! Creative phases and stroke intents.
//!
//! `sketch → refinement → stylization → rendering → complete` の一本道。
//! 前進は 1 ステップずつ、後退（regress）は任意の前フェーズへ。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::ActionKind;
use super::task::TaskKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawingPhase {
    Sketch,
    Refinement,
    Stylization,
    Rendering,
    Complete,
}

impl DrawingPhase {
    pub const ALL: [DrawingPhase; 5] = [
        DrawingPhase::Sketch,
        DrawingPhase::Refinement,
        DrawingPhase::Stylization,
        DrawingPhase::Rendering,
        DrawingPhase::Complete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DrawingPhase::Sketch => "sketch",
            DrawingPhase::Refinement => "refinement",
            DrawingPhase::Stylization => "stylization",
            DrawingPhase::Rendering => "rendering",
            DrawingPhase::Complete => "complete",
        }
    }

    pub fn next(self) -> Option<DrawingPhase> {
        match self {
            DrawingPhase::Sketch => Some(DrawingPhase::Refinement),
            DrawingPhase::Refinement => Some(DrawingPhase::Stylization),
            DrawingPhase::Stylization => Some(DrawingPhase::Rendering),
            DrawingPhase::Rendering => Some(DrawingPhase::Complete),
            DrawingPhase::Complete => None,
        }
    }

    pub fn previous(self) -> Option<DrawingPhase> {
        match self {
            DrawingPhase::Sketch => None,
            DrawingPhase::Refinement => Some(DrawingPhase::Sketch),
            DrawingPhase::Stylization => Some(DrawingPhase::Refinement),
            DrawingPhase::Rendering => Some(DrawingPhase::Stylization),
            DrawingPhase::Complete => Some(DrawingPhase::Rendering),
        }
    }

    pub fn is_complete(self) -> bool {
        self == DrawingPhase::Complete
    }

    /// Intents that fit the phase. Advisory only.
    pub fn recommended_intents(self) -> &'static [StrokeIntent] {
        use StrokeIntent::*;
        match self {
            DrawingPhase::Sketch => &[Gesture, Construction],
            DrawingPhase::Refinement => &[Contour, Construction, Gesture],
            DrawingPhase::Stylization => &[Contour, Detail, Cleanup],
            DrawingPhase::Rendering => &[Detail, Shading, Cleanup],
            DrawingPhase::Complete => &[],
        }
    }

    pub fn primary_intent(self) -> Option<StrokeIntent> {
        match self {
            DrawingPhase::Sketch => Some(StrokeIntent::Gesture),
            DrawingPhase::Refinement => Some(StrokeIntent::Contour),
            DrawingPhase::Stylization => Some(StrokeIntent::Contour),
            DrawingPhase::Rendering => Some(StrokeIntent::Detail),
            DrawingPhase::Complete => None,
        }
    }

    pub fn recommends(self, intent: StrokeIntent) -> bool {
        self.recommended_intents().contains(&intent)
    }
}

impl fmt::Display for DrawingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stroke is meant to achieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeIntent {
    Gesture,
    Contour,
    Detail,
    Construction,
    Shading,
    Cleanup,
}

impl StrokeIntent {
    /// The intent a task kind naturally calls for, if any.
    pub fn natural_for(kind: TaskKind) -> Option<StrokeIntent> {
        match kind {
            TaskKind::FixPose => Some(StrokeIntent::Gesture),
            TaskKind::FixProportions | TaskKind::CorrectStructure => Some(StrokeIntent::Construction),
            TaskKind::RefineAnatomy
            | TaskKind::ImproveSymmetry
            | TaskKind::EnhanceSilhouette
            | TaskKind::AlignEdges => Some(StrokeIntent::Contour),
            TaskKind::AddDetail => Some(StrokeIntent::Detail),
            TaskKind::FixHand | TaskKind::FixFace => None,
        }
    }
}

/// Pick the intent recorded for a stroke.
///
/// Erasing is always cleanup. Otherwise the task's natural intent when the phase
/// recommends it, else the phase's primary intent (gesture once nothing else applies).
pub fn suggest_intent(phase: DrawingPhase, task: TaskKind, action: ActionKind) -> StrokeIntent {
    if action == ActionKind::EraseStroke {
        return StrokeIntent::Cleanup;
    }
    match StrokeIntent::natural_for(task) {
        Some(intent) if phase.recommends(intent) => intent,
        _ => phase.primary_intent().unwrap_or(StrokeIntent::Gesture),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Advance,
    Regress,
    Stay,
}

/// An accepted phase transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: DrawingPhase,
    pub to: DrawingPhase,
    pub kind: TransitionKind,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn phases_form_a_single_chain() {
        for pair in DrawingPhase::ALL.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert_eq!(pair[1].previous(), Some(pair[0]));
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(DrawingPhase::Complete.next(), None);
        assert_eq!(DrawingPhase::Sketch.previous(), None);
    }

    #[rstest]
    #[case(DrawingPhase::Sketch, TaskKind::FixPose, ActionKind::DrawStroke, StrokeIntent::Gesture)]
    #[case(DrawingPhase::Sketch, TaskKind::FixProportions, ActionKind::DrawStroke, StrokeIntent::Construction)]
    #[case(DrawingPhase::Sketch, TaskKind::AddDetail, ActionKind::RefineArea, StrokeIntent::Gesture)]
    #[case(DrawingPhase::Rendering, TaskKind::AddDetail, ActionKind::RefineArea, StrokeIntent::Detail)]
    #[case(DrawingPhase::Stylization, TaskKind::FixHand, ActionKind::DrawStroke, StrokeIntent::Contour)]
    #[case(DrawingPhase::Refinement, TaskKind::FixHand, ActionKind::EraseStroke, StrokeIntent::Cleanup)]
    fn intent_suggestion(
        #[case] phase: DrawingPhase,
        #[case] task: TaskKind,
        #[case] action: ActionKind,
        #[case] expected: StrokeIntent,
    ) {
        assert_eq!(suggest_intent(phase, task, action), expected);
    }
}
