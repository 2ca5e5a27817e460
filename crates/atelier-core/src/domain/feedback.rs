//! Structured feedback produced by the perception collaborator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::action::QualityMetric;
use super::region::RegionInput;

/// Score used when feedback carries no score at all.
pub const NEUTRAL_QUALITY: f64 = 0.5;

fn default_true() -> bool {
    true
}

fn default_severity() -> f64 {
    NEUTRAL_QUALITY
}

/// A named error, either a bare message or a message pinned to a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NamedError {
    Message(String),
    Located {
        message: String,
        #[serde(default)]
        region: Option<RegionInput>,
    },
}

impl NamedError {
    pub fn message(&self) -> &str {
        match self {
            NamedError::Message(message) | NamedError::Located { message, .. } => message,
        }
    }

    pub fn region(&self) -> Option<&RegionInput> {
        match self {
            NamedError::Message(_) => None,
            NamedError::Located { region, .. } => region.as_ref(),
        }
    }
}

impl From<&str> for NamedError {
    fn from(message: &str) -> Self {
        NamedError::Message(message.to_string())
    }
}

/// An area the perception side wants refined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementArea {
    #[serde(default)]
    pub region: Option<RegionInput>,
    #[serde(alias = "type")]
    pub kind: String,
    #[serde(default = "default_severity")]
    pub severity: f64,
}

impl RefinementArea {
    pub fn new(kind: impl Into<String>, severity: f64) -> Self {
        Self {
            region: None,
            kind: kind.into(),
            severity,
        }
    }

    pub fn with_region(mut self, region: impl Into<RegionInput>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// One perception result. Missing scores mean "not measured", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default = "default_true")]
    pub pose_detected: bool,
    #[serde(default)]
    pub proportion_score: Option<f64>,
    #[serde(default)]
    pub symmetry_score: Option<f64>,
    #[serde(default)]
    pub named_errors: Vec<NamedError>,
    #[serde(default)]
    pub refinement_areas: Vec<RefinementArea>,
    #[serde(default)]
    pub overall_similarity: Option<f64>,
}

impl Default for Feedback {
    fn default() -> Self {
        Self {
            pose_detected: true,
            proportion_score: None,
            symmetry_score: None,
            named_errors: Vec::new(),
            refinement_areas: Vec::new(),
            overall_similarity: None,
        }
    }
}

impl Feedback {
    /// Feedback with all three scores set to `score`.
    pub fn uniform(score: f64) -> Self {
        Self {
            proportion_score: Some(score),
            symmetry_score: Some(score),
            overall_similarity: Some(score),
            ..Self::default()
        }
    }

    /// Mean of the scores that are present, [`NEUTRAL_QUALITY`] when none are.
    pub fn quality(&self) -> f64 {
        let scores: Vec<f64> = [
            self.proportion_score,
            self.symmetry_score,
            self.overall_similarity,
        ]
        .into_iter()
        .flatten()
        .collect();
        if scores.is_empty() {
            NEUTRAL_QUALITY
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }

    /// Value of `metric`, falling back to [`Feedback::quality`] when that score is missing.
    pub fn metric(&self, metric: QualityMetric) -> f64 {
        let value = match metric {
            QualityMetric::ProportionScore => self.proportion_score,
            QualityMetric::SymmetryScore => self.symmetry_score,
            QualityMetric::OverallSimilarity => self.overall_similarity,
            QualityMetric::Quality => None,
        };
        value.unwrap_or_else(|| self.quality())
    }

    /// Named metrics for phase decisions. Always contains `quality`.
    pub fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        if let Some(v) = self.proportion_score {
            metrics.insert("proportion_score".to_string(), v);
        }
        if let Some(v) = self.symmetry_score {
            metrics.insert("symmetry_score".to_string(), v);
        }
        if let Some(v) = self.overall_similarity {
            metrics.insert("overall_similarity".to_string(), v);
        }
        metrics.insert("quality".to_string(), self.quality());
        metrics
    }
}
