//! App - アプリケーション層
//!
//! このモジュールは、registry / planner / workflow と ports を組み合わせて
//! 描画ループを実装します。
//!
//! # 主要コンポーネント
//! - **AtelierConfig**: TOML 設定の読み込みと検証
//! - **OrchestratorBuilder**: Orchestrator の構築とワイヤリング
//! - **Orchestrator**: perceive → plan → execute → evaluate ループ
//! - **status**: イテレーション結果・統計・エクスポートのビュー型

pub mod builder;
pub mod config;
pub mod orchestrator;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, OrchestratorBuilder};
pub use self::config::{AtelierConfig, CanvasConfig, ConfigError, load_config};
pub use self::orchestrator::{Orchestrator, StopHandle};
pub use self::status::{
    ExportedState, IterationOutcome, IterationSummary, OrchestratorState, StopReason,
    WorkflowExport, WorkflowStatistics,
};
