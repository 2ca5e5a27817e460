//! CanvasExecutor port - 描画バックエンドの抽象化
//!
//! canvas への書き込みは Orchestrator だけが行います（single writer）。
//! そのため全メソッドが `&mut self` を取ります。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::action::{Rgba, StrokePoint, ToolConfig};
use crate::domain::errors::CollaboratorError;

/// Shape of the surface a snapshot was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasManifest {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<String>,
    pub active_layer: String,
}

/// Opaque point-in-time canvas state.
///
/// `blob` belongs to the executor that produced it; the core only stores it and hands it
/// back to `restore_state` byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub blob: Vec<u8>,
    pub manifest: CanvasManifest,
}

impl CanvasSnapshot {
    pub fn size(&self) -> usize {
        self.blob.len()
    }
}

/// CanvasExecutor は stroke を実際に描くバックエンド
///
/// # 使用例
/// ```ignore
/// #[async_trait]
/// impl CanvasExecutor for MyCanvas {
///     async fn draw_stroke(&mut self, points: &[StrokePoint], tool: &ToolConfig)
///         -> Result<(), CollaboratorError> { ... }
///     // ...
/// }
/// ```
#[async_trait]
pub trait CanvasExecutor: Send {
    async fn create_surface(
        &mut self,
        width: u32,
        height: u32,
        background: Rgba,
    ) -> Result<(), CollaboratorError>;

    async fn draw_stroke(
        &mut self,
        points: &[StrokePoint],
        tool: &ToolConfig,
    ) -> Result<(), CollaboratorError>;

    async fn erase_stroke(&mut self, points: &[StrokePoint]) -> Result<(), CollaboratorError>;

    async fn switch_tool(&mut self, tool: &ToolConfig) -> Result<(), CollaboratorError>;

    async fn select_layer(&mut self, name: &str) -> Result<(), CollaboratorError>;

    async fn set_color(&mut self, color: Rgba) -> Result<(), CollaboratorError>;

    async fn snapshot_state(&mut self) -> Result<CanvasSnapshot, CollaboratorError>;

    async fn restore_state(&mut self, snapshot: &CanvasSnapshot) -> Result<(), CollaboratorError>;

    /// Encoded image of the current canvas, fed to perception.
    async fn export_image(&mut self) -> Result<Vec<u8>, CollaboratorError>;
}
