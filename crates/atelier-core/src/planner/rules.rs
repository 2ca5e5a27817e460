//! Feedback interpretation rules.
//!
//! | issue                                   | kind               | priority        |
//! |-----------------------------------------|--------------------|-----------------|
//! | pose not detected                       | correct_structure  | critical        |
//! | proportion_score < threshold            | fix_proportions    | high            |
//! | symmetry_score < threshold              | improve_symmetry   | high            |
//! | named error (hand/face/proportion/...)  | by keyword         | high            |
//! | refinement area hand / face             | fix_hand / fix_face| high            |
//! | other refinement area                   | by keyword         | medium / low    |
//!
//! 同じ kind に落ちた issue は 1 タスクにまとめる（priority は最大、region は和集合）。

use serde_json::Value;
use tracing::debug;

use super::Planner;
use crate::domain::errors::AtelierError;
use crate::domain::feedback::{Feedback, NamedError, RefinementArea};
use crate::domain::region::{Region, RegionInput};
use crate::domain::task::{NewTask, TaskKind, TaskPriority};

const MERGED_ISSUES: &str = "merged_issues";

#[derive(Debug)]
struct Issue {
    kind: TaskKind,
    priority: TaskPriority,
    description: String,
    region: Option<Region>,
}

impl Planner {
    /// Turn feedback into task drafts, one per kind, in first-occurrence order.
    ///
    /// An empty result means the feedback shows nothing to fix.
    pub fn interpret_feedback(&self, feedback: &Feedback) -> Result<Vec<NewTask>, AtelierError> {
        let issues = self.collect_issues(feedback)?;
        let drafts = merge(issues);
        debug!(tasks = drafts.len(), "feedback interpreted");
        Ok(drafts)
    }

    fn collect_issues(&self, feedback: &Feedback) -> Result<Vec<Issue>, AtelierError> {
        let cfg = &self.config;
        let mut issues = Vec::new();

        if !feedback.pose_detected {
            issues.push(Issue {
                kind: TaskKind::CorrectStructure,
                priority: TaskPriority::Critical,
                description: "No pose detected, rebuild the underlying structure".to_string(),
                region: None,
            });
        }

        checked_score("overall_similarity", feedback.overall_similarity)?;

        if let Some(score) = checked_score("proportion_score", feedback.proportion_score)? {
            if score < cfg.proportion_threshold {
                issues.push(Issue {
                    kind: TaskKind::FixProportions,
                    priority: TaskPriority::High,
                    description: format!(
                        "Fix body proportions (score {score:.2} < {:.2})",
                        cfg.proportion_threshold
                    ),
                    region: None,
                });
            }
        }

        if let Some(score) = checked_score("symmetry_score", feedback.symmetry_score)? {
            if score < cfg.symmetry_threshold {
                issues.push(Issue {
                    kind: TaskKind::ImproveSymmetry,
                    priority: TaskPriority::High,
                    description: format!(
                        "Improve bilateral symmetry (score {score:.2} < {:.2})",
                        cfg.symmetry_threshold
                    ),
                    region: None,
                });
            }
        }

        for error in &feedback.named_errors {
            issues.push(named_error_issue(error)?);
        }

        for area in &feedback.refinement_areas {
            issues.push(self.area_issue(area)?);
        }

        Ok(issues)
    }

    fn area_issue(&self, area: &RefinementArea) -> Result<Issue, AtelierError> {
        if !area.severity.is_finite() {
            return Err(AtelierError::validation(format!(
                "refinement area '{}' has a non-finite severity",
                area.kind
            )));
        }
        let region = normalize(area.region.as_ref())?;
        let label = area.kind.to_lowercase();
        let (kind, priority) = if label.contains("hand") {
            (TaskKind::FixHand, TaskPriority::High)
        } else if label.contains("face") {
            (TaskKind::FixFace, TaskPriority::High)
        } else {
            let kind = if label.contains("silhouette") {
                TaskKind::EnhanceSilhouette
            } else if label.contains("edge") {
                TaskKind::AlignEdges
            } else if label.contains("detail") {
                TaskKind::AddDetail
            } else {
                TaskKind::RefineAnatomy
            };
            let priority = if area.severity >= self.config.severity_medium_threshold {
                TaskPriority::Medium
            } else {
                TaskPriority::Low
            };
            (kind, priority)
        };
        Ok(Issue {
            kind,
            priority,
            description: format!("Refine {} (severity {:.2})", area.kind, area.severity),
            region,
        })
    }
}

fn named_error_issue(error: &NamedError) -> Result<Issue, AtelierError> {
    let message = error.message();
    let lower = message.to_lowercase();
    let kind = if lower.contains("hand") {
        TaskKind::FixHand
    } else if lower.contains("face") {
        TaskKind::FixFace
    } else if lower.contains("proportion") {
        TaskKind::FixProportions
    } else if lower.contains("symmetry") {
        TaskKind::ImproveSymmetry
    } else if lower.contains("pose") {
        TaskKind::FixPose
    } else {
        TaskKind::RefineAnatomy
    };
    Ok(Issue {
        kind,
        priority: TaskPriority::High,
        description: format!("Address error: {message}"),
        region: normalize(error.region())?,
    })
}

/// スコアは [0, 1]。範囲外と NaN は Validation。
fn checked_score(name: &str, score: Option<f64>) -> Result<Option<f64>, AtelierError> {
    match score {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(AtelierError::validation(format!(
            "{name} must be within [0, 1], got {v}"
        ))),
        other => Ok(other),
    }
}

fn normalize(region: Option<&RegionInput>) -> Result<Option<Region>, AtelierError> {
    region.map(RegionInput::normalize).transpose()
}

fn merge(issues: Vec<Issue>) -> Vec<NewTask> {
    let mut merged: Vec<(Issue, u64)> = Vec::new();
    for issue in issues {
        match merged.iter_mut().find(|(m, _)| m.kind == issue.kind) {
            Some((existing, count)) => {
                existing.priority = existing.priority.max(issue.priority);
                existing.region = match (existing.region, issue.region) {
                    (Some(a), Some(b)) => Some(a.union(&b)),
                    (a, b) => a.or(b),
                };
                existing.description = format!("{}; {}", existing.description, issue.description);
                *count += 1;
            }
            None => merged.push((issue, 1)),
        }
    }

    merged
        .into_iter()
        .map(|(issue, count)| {
            let mut draft = NewTask::new(issue.kind, issue.description, issue.priority);
            if let Some(region) = issue.region {
                draft = draft.with_region(region);
            }
            if count > 1 {
                draft = draft.with_param(MERGED_ISSUES, Value::from(count));
            }
            draft
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{PlannerConfig, test_planner};
    use rstest::rstest;
    use serde_json::json;

    fn interpret(raw: serde_json::Value) -> Result<Vec<NewTask>, AtelierError> {
        let feedback: Feedback = serde_json::from_value(raw).unwrap();
        test_planner(PlannerConfig::default()).interpret_feedback(&feedback)
    }

    #[test]
    fn low_proportion_score_yields_one_high_priority_task() {
        let drafts = interpret(json!({
            "proportion_score": 0.5,
            "named_errors": [],
            "refinement_areas": []
        }))
        .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, TaskKind::FixProportions);
        assert_eq!(drafts[0].priority, TaskPriority::High);
    }

    #[test]
    fn missing_pose_is_critical_structure_work() {
        let drafts = interpret(json!({"pose_detected": false})).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, TaskKind::CorrectStructure);
        assert_eq!(drafts[0].priority, TaskPriority::Critical);
    }

    #[test]
    fn clean_feedback_yields_nothing() {
        let drafts = interpret(json!({
            "proportion_score": 0.9,
            "symmetry_score": 0.85,
            "overall_similarity": 0.8
        }))
        .unwrap();
        assert!(drafts.is_empty());
    }

    #[test]
    fn same_kind_issues_merge_into_one_task() {
        let drafts = interpret(json!({
            "named_errors": [
                {"message": "left hand has six fingers", "region": [0.1, 0.5, 0.1, 0.1]}
            ],
            "refinement_areas": [
                {"kind": "hand", "severity": 0.2, "region": {"x": 0.7, "y": 0.5, "width": 0.1, "height": 0.2}},
                {"kind": "edge", "severity": 0.3},
                {"kind": "silhouette", "severity": 0.9}
            ]
        }))
        .unwrap();

        let kinds: Vec<TaskKind> = drafts.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![TaskKind::FixHand, TaskKind::AlignEdges, TaskKind::EnhanceSilhouette]
        );

        let hand = &drafts[0];
        assert_eq!(hand.priority, TaskPriority::High);
        assert_eq!(hand.params.get(MERGED_ISSUES), Some(&json!(2)));
        let region = hand.region.unwrap();
        assert!((region.x - 0.1).abs() < 1e-12);
        assert!((region.width - 0.7).abs() < 1e-12);
        assert!((region.height - 0.2).abs() < 1e-12);

        assert_eq!(drafts[1].priority, TaskPriority::Low);
        assert_eq!(drafts[2].priority, TaskPriority::Medium);
    }

    #[test]
    fn merge_keeps_the_highest_priority() {
        let drafts = interpret(json!({
            "proportion_score": 0.9,
            "refinement_areas": [
                {"kind": "anatomy", "severity": 0.1},
                {"kind": "torso", "severity": 0.9}
            ],
            "named_errors": ["elbow bends backwards"]
        }))
        .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].kind, TaskKind::RefineAnatomy);
        assert_eq!(drafts[0].priority, TaskPriority::High);
        assert_eq!(drafts[0].params.get(MERGED_ISSUES), Some(&json!(3)));
    }

    #[test]
    fn malformed_region_is_a_validation_error() {
        let err = interpret(json!({
            "refinement_areas": [{"kind": "face", "region": "upper half"}]
        }))
        .unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::Validation);
    }

    #[rstest]
    #[case("proportion_score", json!(1.7))]
    #[case("symmetry_score", json!(-0.1))]
    #[case("overall_similarity", json!(2.0))]
    fn out_of_range_score_is_a_validation_error(
        #[case] field: &str,
        #[case] value: serde_json::Value,
    ) {
        let mut raw = json!({});
        raw[field] = value;
        let err = interpret(raw).unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::Validation);
        assert!(err.to_string().contains(field));
    }

    #[test]
    fn nan_score_is_a_validation_error() {
        let feedback = Feedback {
            symmetry_score: Some(f64::NAN),
            ..Feedback::default()
        };
        let err = test_planner(PlannerConfig::default())
            .interpret_feedback(&feedback)
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::Validation);
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    fn boundary_scores_are_accepted(#[case] score: f64) {
        let drafts = interpret(json!({"proportion_score": score, "symmetry_score": score}));
        assert!(drafts.is_ok());
    }

    #[test]
    fn interpretation_is_deterministic() {
        let raw = json!({
            "pose_detected": false,
            "proportion_score": 0.4,
            "symmetry_score": 0.3,
            "named_errors": ["face is skewed", "pose is stiff"],
            "refinement_areas": [{"kind": "detail", "severity": 0.6, "region": [0.2, 0.2, 0.3, 0.3]}]
        });
        let a = interpret(raw.clone()).unwrap();
        let b = interpret(raw).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
    }
}
