//! Perception の開発用実装
//!
//! - ScriptedPerception: テスト用。用意した Feedback を順に返し、尽きたら最後のものを繰り返す
//! - ConvergingPerception: デモ用。描いた stroke が増えるほどスコアが上がる

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use super::canvas::drawn_strokes;
use crate::domain::errors::CollaboratorError;
use crate::domain::feedback::{Feedback, RefinementArea};
use crate::ports::Perception;

#[derive(Debug, Default)]
pub struct ScriptedPerception {
    script: VecDeque<Result<Feedback, CollaboratorError>>,
    last: Option<Feedback>,
    calls: usize,
    delay: Option<Duration>,
}

impl ScriptedPerception {
    pub fn new(script: impl IntoIterator<Item = Feedback>) -> Self {
        Self {
            script: script.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }

    /// Always answers `feedback`.
    pub fn repeating(feedback: Feedback) -> Self {
        Self::new([feedback])
    }

    pub fn then(mut self, feedback: Feedback) -> Self {
        self.script.push_back(Ok(feedback));
        self
    }

    /// Queue a failed analysis.
    pub fn then_fail(mut self, message: &str) -> Self {
        self.script
            .push_back(Err(CollaboratorError::failed("analyze", message)));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

#[async_trait]
impl Perception for ScriptedPerception {
    async fn analyze(&mut self, _image: &[u8]) -> Result<Feedback, CollaboratorError> {
        self.calls += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.script.pop_front() {
            Some(Ok(feedback)) => {
                self.last = Some(feedback.clone());
                Ok(feedback)
            }
            Some(Err(err)) => Err(err),
            None => self
                .last
                .clone()
                .ok_or_else(|| CollaboratorError::failed("analyze", "script is empty")),
        }
    }
}

const SATURATED: f64 = 0.999;

/// Scores climb by `step` per drawn stroke until they reach 1.0.
///
/// Until the overall similarity saturates it also reports an edge area, so there is
/// always something left to refine.
#[derive(Debug, Clone)]
pub struct ConvergingPerception {
    proportion: f64,
    symmetry: f64,
    similarity: f64,
    step: f64,
    calls: usize,
}

impl ConvergingPerception {
    pub fn new(step: f64) -> Self {
        Self {
            proportion: 0.35,
            symmetry: 0.3,
            similarity: 0.4,
            step,
            calls: 0,
        }
    }

    fn score(&self, base: f64, strokes: usize) -> f64 {
        (base + self.step * strokes as f64).min(1.0)
    }
}

impl Default for ConvergingPerception {
    fn default() -> Self {
        Self::new(0.12)
    }
}

#[async_trait]
impl Perception for ConvergingPerception {
    async fn analyze(&mut self, image: &[u8]) -> Result<Feedback, CollaboratorError> {
        self.calls += 1;
        // images from other canvases: treat each call as one stroke
        let strokes = drawn_strokes(image).unwrap_or(self.calls - 1);
        let similarity = self.score(self.similarity, strokes);
        let mut feedback = Feedback {
            proportion_score: Some(self.score(self.proportion, strokes)),
            symmetry_score: Some(self.score(self.symmetry, strokes)),
            overall_similarity: Some(similarity),
            ..Feedback::default()
        };
        if similarity < SATURATED {
            feedback
                .refinement_areas
                .push(RefinementArea::new("edge", 1.0 - similarity));
        }
        Ok(feedback)
    }
}
