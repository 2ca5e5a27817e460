//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryCanvas**: stroke を記録するだけの canvas（snapshot は JSON）
//! - **ScriptedPerception**: 決められた Feedback を順に返す
//! - **ConvergingPerception**: stroke 数に応じてスコアが上がっていくデモ用の perception
//!
//! # 本番用実装
//! 実際の描画エンジンや視覚モデルへの接続は別クレートに配置します。

pub mod canvas;
pub mod perception;

// 主要な型を再エクスポート
pub use self::canvas::{CanvasStroke, InMemoryCanvas};
pub use self::perception::{ConvergingPerception, ScriptedPerception};
