//! Workflow - フェーズ状態機械・チェックポイント・決定ログ
//!
//! どれも canvas には触りません。canvas を触るのは Orchestrator だけです。

pub mod checkpoint;
pub mod decision_log;
pub mod phase_machine;

pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointSummary};
pub use decision_log::{DecisionLog, LogStatistics, PhaseSummary};
pub use phase_machine::{PhaseMachine, PhaseState, PhaseThresholds, RegressionPolicy};
