//! InMemoryCanvas - 開発用の canvas
//!
//! ピクセルは持たず、stroke の列とツール状態だけを保持します。
//! snapshot / export_image はその状態を JSON にしたものです。
//!
//! テスト用に、特定の操作を失敗させたり遅延させたりできます。

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::action::{Rgba, StrokePoint, ToolConfig};
use crate::domain::errors::CollaboratorError;
use crate::ports::{CanvasExecutor, CanvasManifest, CanvasSnapshot};

const BASE_LAYER: &str = "base";

/// One stroke as laid down on a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasStroke {
    pub layer: String,
    pub erase: bool,
    pub points: Vec<StrokePoint>,
    pub tool: Option<ToolConfig>,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Surface {
    width: u32,
    height: u32,
    background: Rgba,
    layers: Vec<String>,
    active_layer: String,
    tool: Option<ToolConfig>,
    color: Rgba,
    strokes: Vec<CanvasStroke>,
}

impl Surface {
    fn blank(width: u32, height: u32, background: Rgba) -> Self {
        Self {
            width,
            height,
            background,
            layers: vec![BASE_LAYER.to_string()],
            active_layer: BASE_LAYER.to_string(),
            tool: None,
            color: Rgba::BLACK,
            strokes: Vec::new(),
        }
    }

    fn manifest(&self) -> CanvasManifest {
        CanvasManifest {
            width: self.width,
            height: self.height,
            layers: self.layers.clone(),
            active_layer: self.active_layer.clone(),
        }
    }
}

/// InMemoryCanvas は stroke を記録するだけの CanvasExecutor
///
/// # 使用例
/// ```ignore
/// let mut canvas = InMemoryCanvas::new();
/// canvas.fail_next("draw_stroke");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCanvas {
    surface: Option<Surface>,
    operations: Vec<&'static str>,
    failures: HashSet<&'static str>,
    delays: HashMap<&'static str, Duration>,
}

impl InMemoryCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call to `operation` fail once.
    pub fn fail_next(&mut self, operation: &'static str) {
        self.failures.insert(operation);
    }

    /// Delay every call to `operation`.
    pub fn with_delay(mut self, operation: &'static str, delay: Duration) -> Self {
        self.delays.insert(operation, delay);
        self
    }

    /// Names of every operation called so far, in order.
    pub fn operations(&self) -> &[&'static str] {
        &self.operations
    }

    pub fn strokes(&self) -> &[CanvasStroke] {
        self.surface.as_ref().map_or(&[], |s| s.strokes.as_slice())
    }

    pub fn active_layer(&self) -> Option<&str> {
        self.surface.as_ref().map(|s| s.active_layer.as_str())
    }

    pub fn color(&self) -> Option<Rgba> {
        self.surface.as_ref().map(|s| s.color)
    }

    pub fn tool(&self) -> Option<ToolConfig> {
        self.surface.as_ref().and_then(|s| s.tool)
    }

    async fn enter(&mut self, operation: &'static str) -> Result<(), CollaboratorError> {
        self.operations.push(operation);
        if let Some(delay) = self.delays.get(operation) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.remove(operation) {
            return Err(CollaboratorError::failed(operation, "injected failure"));
        }
        Ok(())
    }

    fn surface(&mut self, operation: &'static str) -> Result<&mut Surface, CollaboratorError> {
        self.surface
            .as_mut()
            .ok_or_else(|| CollaboratorError::failed(operation, "no surface created"))
    }

    fn push_stroke(
        &mut self,
        operation: &'static str,
        points: &[StrokePoint],
        tool: Option<ToolConfig>,
        erase: bool,
    ) -> Result<(), CollaboratorError> {
        if points.is_empty() {
            return Err(CollaboratorError::failed(operation, "stroke has no points"));
        }
        let surface = self.surface(operation)?;
        let color = if erase { surface.background } else { surface.color };
        surface.strokes.push(CanvasStroke {
            layer: surface.active_layer.clone(),
            erase,
            points: points.to_vec(),
            tool,
            color,
        });
        Ok(())
    }
}

#[async_trait]
impl CanvasExecutor for InMemoryCanvas {
    async fn create_surface(
        &mut self,
        width: u32,
        height: u32,
        background: Rgba,
    ) -> Result<(), CollaboratorError> {
        self.enter("create_surface").await?;
        self.surface = Some(Surface::blank(width, height, background));
        Ok(())
    }

    async fn draw_stroke(
        &mut self,
        points: &[StrokePoint],
        tool: &ToolConfig,
    ) -> Result<(), CollaboratorError> {
        self.enter("draw_stroke").await?;
        self.push_stroke("draw_stroke", points, Some(*tool), false)
    }

    async fn erase_stroke(&mut self, points: &[StrokePoint]) -> Result<(), CollaboratorError> {
        self.enter("erase_stroke").await?;
        self.push_stroke("erase_stroke", points, None, true)
    }

    async fn switch_tool(&mut self, tool: &ToolConfig) -> Result<(), CollaboratorError> {
        self.enter("switch_tool").await?;
        let surface = self.surface("switch_tool")?;
        surface.tool = Some(*tool);
        if let Some(color) = tool.color {
            surface.color = color;
        }
        Ok(())
    }

    /// Unknown layers are created on first use.
    async fn select_layer(&mut self, name: &str) -> Result<(), CollaboratorError> {
        self.enter("select_layer").await?;
        if name.trim().is_empty() {
            return Err(CollaboratorError::failed("select_layer", "empty layer name"));
        }
        let surface = self.surface("select_layer")?;
        if !surface.layers.iter().any(|l| l == name) {
            surface.layers.push(name.to_string());
        }
        surface.active_layer = name.to_string();
        Ok(())
    }

    async fn set_color(&mut self, color: Rgba) -> Result<(), CollaboratorError> {
        self.enter("set_color").await?;
        self.surface("set_color")?.color = color;
        Ok(())
    }

    async fn snapshot_state(&mut self) -> Result<CanvasSnapshot, CollaboratorError> {
        self.enter("snapshot_state").await?;
        let surface = self.surface("snapshot_state")?;
        let blob = serde_json::to_vec(&*surface)
            .map_err(|e| CollaboratorError::failed("snapshot_state", e.to_string()))?;
        Ok(CanvasSnapshot {
            blob,
            manifest: surface.manifest(),
        })
    }

    async fn restore_state(&mut self, snapshot: &CanvasSnapshot) -> Result<(), CollaboratorError> {
        self.enter("restore_state").await?;
        let surface: Surface = serde_json::from_slice(&snapshot.blob)
            .map_err(|e| CollaboratorError::failed("restore_state", e.to_string()))?;
        self.surface = Some(surface);
        Ok(())
    }

    async fn export_image(&mut self) -> Result<Vec<u8>, CollaboratorError> {
        self.enter("export_image").await?;
        let surface = self.surface("export_image")?;
        serde_json::to_vec(&*surface)
            .map_err(|e| CollaboratorError::failed("export_image", e.to_string()))
    }
}

/// Count of non-erase strokes in an image produced by [`InMemoryCanvas::export_image`].
pub(crate) fn drawn_strokes(image: &[u8]) -> Option<usize> {
    let surface: Surface = serde_json::from_slice(image).ok()?;
    Some(surface.strokes.iter().filter(|s| !s.erase).count())
}
