//! Perception port - 画像から構造化フィードバックを得る

use async_trait::async_trait;

use crate::domain::errors::CollaboratorError;
use crate::domain::feedback::Feedback;

/// Perception は canvas の画像を解析して [`Feedback`] を返す
///
/// 推論そのもの（pose / landmark 検出など）はこのクレートの外側の責務です。
#[async_trait]
pub trait Perception: Send {
    async fn analyze(&mut self, image: &[u8]) -> Result<Feedback, CollaboratorError>;
}
