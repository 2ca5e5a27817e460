//! atelier-core
//!
//! Orchestration core for an iterative drawing loop:
//! perceive → plan → execute → evaluate、フェーズ進行・チェックポイント・判断ログ付き。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, region, task, action, phase, feedback, outcome, state, decision, errors）
//! - **ports**: 抽象化レイヤー（CanvasExecutor, Perception, Clock, IdGenerator）
//! - **registry**: TaskRegistry + StateTracker + RetryPolicy
//! - **planner**: Feedback → タスク、タスク → ActionPlan、評価
//! - **workflow**: PhaseMachine, CheckpointManager, DecisionLog
//! - **app**: 設定、Orchestrator とその builder、ステータスビュー
//! - **impls**: 実装（InMemoryCanvas, ScriptedPerception など開発用）

pub mod domain;
pub mod ports;
pub mod registry;
pub mod planner;
pub mod workflow;
pub mod app;
pub mod impls;
