//! Domain model (ids, regions, tasks, plans, phases, feedback, log entries, errors).
//!
//! このレイヤーは I/O を持たない純粋なデータと小さな状態遷移だけを置きます。

pub mod action;
pub mod decision;
pub mod errors;
pub mod feedback;
pub mod ids;
pub mod outcome;
pub mod phase;
pub mod region;
pub mod state;
pub mod task;

pub use action::{
    ActionKind, ActionPlan, DrawingAction, QualityMetric, Rgba, StrokePoint, SuccessCriteria,
    ToolConfig, ToolKind,
};
pub use decision::{DecisionLogEntry, EntryKind, LogEvent};
pub use errors::{AtelierError, CollaboratorError, ErrorKind};
pub use feedback::{Feedback, NamedError, RefinementArea};
pub use ids::{ActionId, CheckpointId, ExecutionId, PlanId, TaskId};
pub use outcome::{Evaluation, ExecutionResult, RetryDecision, TaskDisposition};
pub use phase::{DrawingPhase, PhaseTransition, StrokeIntent, TransitionKind, suggest_intent};
pub use region::{Region, RegionInput};
pub use state::{BrainState, ExecutionRecord, HistoryRing, StateSummary, StrokeRecord};
pub use task::{NewTask, Task, TaskKind, TaskPriority, TaskStatus};
