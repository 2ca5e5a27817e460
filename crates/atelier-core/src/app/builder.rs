//! OrchestratorBuilder - Orchestrator の構築とワイヤリング
//!
//! # 方針
//! - Builder パターン（collaborator を後から差し込む）
//! - 起動時検証（Fail-fast）: canvas / perception の欠落と不正な設定は build() で弾く

use std::sync::Arc;

use super::config::{AtelierConfig, ConfigError};
use super::orchestrator::Orchestrator;
use crate::ports::{CanvasExecutor, Clock, IdGenerator, Perception, SystemClock, UlidGenerator};

/// OrchestratorBuilder は Orchestrator を構築
///
/// # 使用例
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new(config)
///     .canvas(InMemoryCanvas::new())
///     .perception(ScriptedPerception::repeating(Feedback::uniform(0.5)))
///     .build()?;
/// ```
///
/// clock / id_generator を省略すると SystemClock と UlidGenerator を使います。
pub struct OrchestratorBuilder<C, P> {
    config: AtelierConfig,
    canvas: Option<C>,
    perception: Option<P>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError は Orchestrator 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no canvas executor was provided")]
    MissingCanvas,

    #[error("no perception collaborator was provided")]
    MissingPerception,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

impl<C: CanvasExecutor, P: Perception> OrchestratorBuilder<C, P> {
    pub fn new(config: AtelierConfig) -> Self {
        Self {
            config,
            canvas: None,
            perception: None,
            clock: None,
            ids: None,
        }
    }

    pub fn canvas(mut self, canvas: C) -> Self {
        self.canvas = Some(canvas);
        self
    }

    pub fn perception(mut self, perception: P) -> Self {
        self.perception = Some(perception);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// # 検証
    /// - config.validate() が通ること
    /// - canvas と perception が両方そろっていること
    pub fn build(self) -> Result<Orchestrator<C, P>, BuildError> {
        self.config.validate()?;
        let canvas = self.canvas.ok_or(BuildError::MissingCanvas)?;
        let perception = self.perception.ok_or(BuildError::MissingPerception)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));
        Ok(Orchestrator::new(self.config, canvas, perception, clock, ids))
    }
}

impl<C: CanvasExecutor, P: Perception> Default for OrchestratorBuilder<C, P> {
    fn default() -> Self {
        Self::new(AtelierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feedback::Feedback;
    use crate::impls::{InMemoryCanvas, ScriptedPerception};

    type Builder = OrchestratorBuilder<InMemoryCanvas, ScriptedPerception>;

    #[test]
    fn build_with_all_collaborators_succeeds() {
        let orchestrator = Builder::default()
            .canvas(InMemoryCanvas::new())
            .perception(ScriptedPerception::repeating(Feedback::uniform(0.5)))
            .build();
        assert!(orchestrator.is_ok());
    }

    #[test]
    fn build_without_canvas_fails() {
        let result = Builder::default()
            .perception(ScriptedPerception::repeating(Feedback::uniform(0.5)))
            .build();
        assert!(matches!(result, Err(BuildError::MissingCanvas)));
    }

    #[test]
    fn build_without_perception_fails() {
        let result = Builder::default().canvas(InMemoryCanvas::new()).build();
        assert!(matches!(result, Err(BuildError::MissingPerception)));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let config = AtelierConfig {
            history_capacity: 0,
            ..AtelierConfig::default()
        };
        let result = Builder::new(config)
            .canvas(InMemoryCanvas::new())
            .perception(ScriptedPerception::repeating(Feedback::uniform(0.5)))
            .build();
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }
}
