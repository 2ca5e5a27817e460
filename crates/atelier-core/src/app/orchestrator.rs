//! Orchestrator - perceive → plan → execute → evaluate のループ
//!
//! # 設計
//! - 単一の制御スレッド。各ステップを await してから次へ進む（タスクの並列実行はしない）
//! - canvas の書き手は Orchestrator だけ
//! - collaborator 呼び出しはすべて `tokio::time::timeout` で包む（タイムアウト = ActionExecution）
//! - 停止は watch channel による協調キャンセル（イテレーションの境界でのみ確認）
//! - StateCorruption を受けたら Failed に遷移し、`reset()` まで仕事を拒否する

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::config::AtelierConfig;
use super::status::{
    ExportedState, IterationOutcome, IterationSummary, OrchestratorState, StopReason,
    WorkflowExport, WorkflowStatistics,
};
use crate::domain::action::{ActionKind, ActionPlan, DrawingAction};
use crate::domain::decision::LogEvent;
use crate::domain::errors::{AtelierError, CollaboratorError};
use crate::domain::feedback::Feedback;
use crate::domain::ids::{CheckpointId, TaskId};
use crate::domain::outcome::{Evaluation, ExecutionResult, RetryDecision, TaskDisposition};
use crate::domain::phase::{DrawingPhase, StrokeIntent, suggest_intent};
use crate::domain::state::{ExecutionRecord, StrokeRecord};
use crate::domain::task::{NewTask, Task, TaskKind};
use crate::planner::Planner;
use crate::ports::{CanvasExecutor, Clock, IdGenerator, Perception};
use crate::registry::{StateTracker, TaskRegistry};
use crate::workflow::{CheckpointManager, DecisionLog, PhaseMachine};

/// Requests a cooperative stop. Checked between iterations only.
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        // ignore send error: the orchestrator may already be dropped
        let _ = self.tx.send(true);
    }
}

/// Run one collaborator call under `timeout`.
async fn guarded<T>(
    timeout: Duration,
    operation: &'static str,
    call: impl Future<Output = Result<T, CollaboratorError>>,
) -> Result<T, AtelierError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(AtelierError::from),
        Err(_) => Err(CollaboratorError::Timeout { operation, timeout }.into()),
    }
}

/// A successfully executed action, waiting for its scores before it is logged.
struct Executed {
    action: DrawingAction,
    intent: StrokeIntent,
}

pub struct Orchestrator<C, P> {
    config: AtelierConfig,
    canvas: C,
    perception: P,
    planner: Planner,
    registry: TaskRegistry,
    tracker: StateTracker,
    phases: PhaseMachine,
    checkpoints: CheckpointManager,
    log: DecisionLog,
    strokes: Vec<StrokeRecord>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    state: OrchestratorState,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
    surface_ready: bool,
    started: bool,
    session_iterations: u64,
    last_stop: Option<StopReason>,
}

impl<C: CanvasExecutor, P: Perception> Orchestrator<C, P> {
    pub(crate) fn new(
        config: AtelierConfig,
        canvas: C,
        perception: P,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            planner: Planner::new(config.planner.clone(), ids.clone()),
            registry: TaskRegistry::new(config.retry.clone(), clock.clone(), ids.clone()),
            tracker: StateTracker::new(config.history_capacity),
            phases: PhaseMachine::new(config.phases.clone(), clock.clone()),
            checkpoints: CheckpointManager::new(config.max_checkpoints, clock.clone(), ids.clone()),
            log: DecisionLog::new(clock.clone()),
            strokes: Vec::new(),
            config,
            canvas,
            perception,
            clock,
            ids,
            state: OrchestratorState::Idle,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
            surface_ready: false,
            started: false,
            session_iterations: 0,
            last_stop: None,
        }
    }

    // ========================================
    // accessors
    // ========================================

    pub fn config(&self) -> &AtelierConfig {
        &self.config
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn phase(&self) -> DrawingPhase {
        self.phases.current()
    }

    pub fn phases(&self) -> &PhaseMachine {
        &self.phases
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    pub fn log(&self) -> &DecisionLog {
        &self.log
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn strokes(&self) -> &[StrokeRecord] {
        &self.strokes
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn perception(&self) -> &P {
        &self.perception
    }

    pub fn last_stop(&self) -> Option<StopReason> {
        self.last_stop
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop_tx.clone(),
        }
    }

    pub fn set_goal(&mut self, goal: impl Into<String>) {
        let goal = goal.into();
        info!(goal = %goal, "goal set");
        self.tracker.set_goal(goal);
    }

    /// Register a task directly, bypassing feedback interpretation.
    pub fn submit_task(&mut self, draft: NewTask) -> TaskId {
        let id = self.registry.create_task(&mut self.tracker, draft);
        self.log_task_created(id);
        id
    }

    // ========================================
    // main loop
    // ========================================

    /// One perceive → plan → execute → evaluate pass.
    #[instrument(skip(self), fields(iteration = self.tracker.iteration(), phase = %self.phases.current()))]
    pub async fn run_iteration(&mut self) -> Result<IterationSummary, AtelierError> {
        self.ensure_operational()?;
        if self.phases.current().is_complete() {
            return Ok(self.stopped(StopReason::Complete));
        }
        if *self.stop_rx.borrow() {
            return Ok(self.stopped(StopReason::Cancelled));
        }

        self.state = OrchestratorState::Running;
        let result = self.iterate().await;
        match &result {
            Err(err) if err.kind().is_fatal() => {
                error!(error = %err, "orchestrator failed");
                self.state = OrchestratorState::Failed {
                    reason: err.to_string(),
                };
            }
            _ => self.state = OrchestratorState::Idle,
        }
        result
    }

    /// Run up to `n` iterations. Returns how many did work.
    ///
    /// Stops early on a stop reason, a stop request, or when `max_session_iterations` is spent.
    #[instrument(skip(self))]
    pub async fn run_batch(&mut self, n: u64) -> Result<u64, AtelierError> {
        let mut completed = 0;
        for _ in 0..n {
            if let Some(max) = self.config.max_session_iterations {
                if self.session_iterations >= max {
                    info!(max, "session iteration budget spent");
                    self.last_stop = Some(StopReason::BudgetSpent);
                    break;
                }
            }
            let summary = self.run_iteration().await?;
            if let Some(reason) = summary.stop_reason() {
                debug!(reason = ?reason, completed, "batch stopped");
                break;
            }
            completed += 1;
            self.session_iterations += 1;
        }
        Ok(completed)
    }

    async fn iterate(&mut self) -> Result<IterationSummary, AtelierError> {
        self.ensure_started().await?;

        // 1. perceive
        let before = self.perceive().await?;
        let quality = before.quality();

        // 2. interpret
        let tasks_created = self.register_drafts(&before)?;

        // 3. no work: phase decision
        let next = self.registry.next_pending().cloned();
        let Some(task) = next else {
            return self.decide_phase(&before, tasks_created).await;
        };

        // 4. execute
        let outcome = self.attempt(&task, &before).await?;

        // 5. bookkeeping
        self.phases
            .stay(&format!("worked on {}", task.kind), &mut self.log);
        self.tracker.verify(&self.registry)?;
        let iteration = self.tracker.increment_iteration();
        Ok(IterationSummary {
            iteration,
            phase: self.phases.current(),
            tasks_created,
            quality: Some(quality),
            outcome,
        })
    }

    async fn perceive(&mut self) -> Result<Feedback, AtelierError> {
        let timeout = self.config.collaborator_timeout();
        let image = guarded(timeout, "export_image", self.canvas.export_image()).await?;
        let feedback = guarded(timeout, "analyze", self.perception.analyze(&image)).await?;
        self.tracker.update_feedback(feedback.clone());
        Ok(feedback)
    }

    fn register_drafts(&mut self, feedback: &Feedback) -> Result<usize, AtelierError> {
        let drafts = self.planner.interpret_feedback(feedback)?;
        let mut created = 0;
        for draft in drafts {
            if self.registry.has_open(draft.kind) {
                debug!(kind = %draft.kind, "task already open, skipping draft");
                continue;
            }
            let id = self.registry.create_task(&mut self.tracker, draft);
            self.log_task_created(id);
            created += 1;
        }
        Ok(created)
    }

    fn log_task_created(&mut self, id: TaskId) {
        if let Some(task) = self.registry.get(id) {
            self.log.record(LogEvent::TaskCreated {
                task_id: id,
                task_kind: task.kind,
                priority: task.priority,
                description: task.description.clone(),
                region: task.region,
            });
        }
    }

    async fn decide_phase(
        &mut self,
        feedback: &Feedback,
        tasks_created: usize,
    ) -> Result<IterationSummary, AtelierError> {
        let metrics = feedback.metrics();
        let from = self.phases.current();

        let outcome = if let Some(to) = self.phases.suggest_transition(&metrics) {
            self.phases
                .advance_with_metrics("quality threshold met", metrics, &mut self.log);
            IterationOutcome::PhaseAdvanced { from, to }
        } else if let Some(to) = self
            .phases
            .suggest_regression(&metrics, &self.config.regression)
        {
            self.phases.regress_with_metrics(
                to,
                "quality stayed poor, revisiting fundamentals",
                metrics,
                &mut self.log,
            );
            IterationOutcome::PhaseRegressed { from, to }
        } else {
            info!(phase = %from, "no pending work and no phase change advised");
            return Ok(self.stopped(StopReason::Exhausted));
        };

        let to = self.phases.current();
        if self.config.checkpoint_on_phase_change {
            self.create_checkpoint(format!("Entered {to} from {from}"))
                .await?;
        }
        self.tracker.verify(&self.registry)?;
        let iteration = self.tracker.increment_iteration();
        Ok(IterationSummary {
            iteration,
            phase: to,
            tasks_created,
            quality: Some(feedback.quality()),
            outcome,
        })
    }

    /// One attempt of one task. Collaborator failures during the attempt are absorbed into the
    /// task's disposition; only fatal errors escape.
    async fn attempt(
        &mut self,
        task: &Task,
        before: &Feedback,
    ) -> Result<IterationOutcome, AtelierError> {
        let attempt = task.attempt();
        self.registry.mark_in_progress(&mut self.tracker, task.id)?;

        let plan = match self.planner.plan_actions(task, attempt) {
            Ok(plan) => plan,
            Err(err) => return self.reject_unplannable(task, attempt, err),
        };
        self.tracker.set_plan(plan.clone());

        let (executed, failure) = self.execute_plan(task.kind, &plan).await;

        let after = match failure {
            Some(err) => Err(err),
            None => self.perceive().await,
        };

        let (result, evaluation, decision, error) = match after {
            Ok(after) => {
                let eval = self.planner.evaluate(task, &plan, before, &after);
                let decision = self.registry.policy().retry_decision(task, eval.result);
                let error = match eval.result {
                    ExecutionResult::Success => None,
                    ExecutionResult::Partial => Some(format!(
                        "partial improvement {:.3} < {:.3}",
                        eval.delta, plan.criteria.min_improvement
                    )),
                    ExecutionResult::Failure => {
                        Some(format!("no improvement ({:+.3})", eval.delta))
                    }
                };
                (eval.result, Some(eval), decision, error)
            }
            Err(err) if err.kind().is_fatal() => return Err(err),
            Err(err) => {
                warn!(task_id = %task.id, error = %err, "attempt aborted");
                (
                    ExecutionResult::Failure,
                    None,
                    RetryDecision::Retry {
                        bonus_eligible: false,
                    },
                    Some(err.to_string()),
                )
            }
        };

        let disposition = self.registry.settle(
            &mut self.tracker,
            task.id,
            decision,
            error.as_deref().unwrap_or("attempt failed"),
        )?;
        let error = match (disposition, error) {
            (TaskDisposition::PermanentlyFailed, Some(reason)) => {
                let exhausted = AtelierError::RetryExhausted {
                    task_id: task.id,
                    retries: self
                        .registry
                        .get(task.id)
                        .map(|t| t.retry_count)
                        .unwrap_or_default(),
                };
                Some(format!("{exhausted}: {reason}"))
            }
            (_, error) => error,
        };

        self.log_attempt(task, &plan, executed, before, evaluation.as_ref());
        self.log.record(LogEvent::TaskEvaluated {
            task_id: task.id,
            plan_id: plan.id,
            attempt,
            result,
            evaluation,
            disposition,
            error: error.clone(),
        });

        let mut metrics = BTreeMap::new();
        if let Some(eval) = &evaluation {
            metrics.insert("before".to_string(), eval.before);
            metrics.insert("after".to_string(), eval.after);
            metrics.insert("delta".to_string(), eval.delta);
        }
        self.tracker.record_execution(ExecutionRecord {
            id: self.ids.execution_id(),
            task_id: task.id,
            plan_id: plan.id,
            result,
            at: self.clock.now(),
            metrics,
            error: error.clone(),
        });
        self.tracker.clear_plan();

        Ok(IterationOutcome::TaskAttempted {
            task_id: task.id,
            task_kind: task.kind,
            attempt,
            result,
            disposition,
            evaluation,
            error,
        })
    }

    /// A task whose plan cannot be built is failed for good: the same input would fail again.
    fn reject_unplannable(
        &mut self,
        task: &Task,
        attempt: u32,
        err: AtelierError,
    ) -> Result<IterationOutcome, AtelierError> {
        warn!(task_id = %task.id, error = %err, "task cannot be planned");
        let message = err.to_string();
        self.registry
            .mark_failed(&mut self.tracker, task.id, message.clone())?;
        let plan_id = self.ids.plan_id();
        self.log.record(LogEvent::TaskEvaluated {
            task_id: task.id,
            plan_id,
            attempt,
            result: ExecutionResult::Failure,
            evaluation: None,
            disposition: TaskDisposition::PermanentlyFailed,
            error: Some(message.clone()),
        });
        Ok(IterationOutcome::TaskAttempted {
            task_id: task.id,
            task_kind: task.kind,
            attempt,
            result: ExecutionResult::Failure,
            disposition: TaskDisposition::PermanentlyFailed,
            evaluation: None,
            error: Some(message),
        })
    }

    /// Execute actions in order, stopping at the first failure.
    async fn execute_plan(
        &mut self,
        task_kind: TaskKind,
        plan: &ActionPlan,
    ) -> (Vec<Executed>, Option<AtelierError>) {
        let phase = self.phases.current();
        debug!(
            plan_id = %plan.id,
            actions = plan.actions.len(),
            strokes = plan.stroke_count(),
            "executing plan"
        );
        let mut executed = Vec::with_capacity(plan.actions.len());
        for action in &plan.actions {
            if let Err(err) = self.execute_action(action).await {
                warn!(
                    plan_id = %plan.id,
                    action_id = %action.id,
                    action = %action.kind,
                    error = %err,
                    "action failed, aborting plan"
                );
                return (executed, Some(err));
            }
            let intent = suggest_intent(phase, task_kind, action.kind);
            if action.kind.is_stroke() {
                self.strokes.push(StrokeRecord {
                    action_id: action.id,
                    task_id: plan.task_id,
                    kind: action.kind,
                    intent,
                    phase,
                    points: action.points.clone(),
                    tool: action.tool,
                    at: self.clock.now(),
                });
            }
            executed.push(Executed {
                action: action.clone(),
                intent,
            });
        }
        (executed, None)
    }

    async fn execute_action(&mut self, action: &DrawingAction) -> Result<(), AtelierError> {
        let timeout = self.config.collaborator_timeout();
        let tool = || {
            action.tool.ok_or_else(|| {
                AtelierError::validation(format!("{} {} has no tool", action.kind, action.id))
            })
        };
        match action.kind {
            ActionKind::SwitchTool => {
                let tool = tool()?;
                guarded(timeout, "switch_tool", self.canvas.switch_tool(&tool)).await
            }
            ActionKind::ChangeLayer => {
                let layer = action
                    .params
                    .get("layer")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        AtelierError::validation(format!("{} has no layer name", action.id))
                    })?;
                guarded(timeout, "select_layer", self.canvas.select_layer(layer)).await
            }
            ActionKind::AdjustColor => {
                let color = tool()?.color.ok_or_else(|| {
                    AtelierError::validation(format!("{} has no colour", action.id))
                })?;
                guarded(timeout, "set_color", self.canvas.set_color(color)).await
            }
            ActionKind::DrawStroke | ActionKind::RefineArea => {
                let tool = tool()?;
                guarded(
                    timeout,
                    "draw_stroke",
                    self.canvas.draw_stroke(&action.points, &tool),
                )
                .await
            }
            ActionKind::EraseStroke => {
                guarded(timeout, "erase_stroke", self.canvas.erase_stroke(&action.points)).await
            }
        }
    }

    fn log_attempt(
        &mut self,
        task: &Task,
        plan: &ActionPlan,
        executed: Vec<Executed>,
        before: &Feedback,
        evaluation: Option<&Evaluation>,
    ) {
        let phase = self.phases.current();
        let before_score = evaluation
            .map(|e| e.before)
            .unwrap_or_else(|| before.metric(plan.criteria.metric));
        let after_score = evaluation.map(|e| e.after);
        for Executed { action, intent } in executed {
            self.log.record(LogEvent::StrokeExecuted {
                action_id: action.id,
                task_id: task.id,
                plan_id: plan.id,
                action: action.kind,
                intent,
                phase,
                tool: action.tool.map(|t| t.kind),
                point_count: action.points.len(),
                description: action.description,
                before: before_score,
                after: after_score,
            });
        }
    }

    // ========================================
    // checkpoints / rollback
    // ========================================

    /// Snapshot the canvas and remember the current phase and stroke count.
    pub async fn create_checkpoint(
        &mut self,
        description: impl Into<String>,
    ) -> Result<CheckpointId, AtelierError> {
        self.ensure_operational()?;
        self.ensure_surface().await?;
        let timeout = self.config.collaborator_timeout();
        let snapshot = guarded(timeout, "snapshot_state", self.canvas.snapshot_state()).await?;
        Ok(self.checkpoints.create(
            snapshot,
            self.phases.current(),
            self.strokes.len(),
            description,
            &mut self.log,
        ))
    }

    /// Restore canvas, stroke history and phase from a checkpoint.
    ///
    /// Unknown ids are a validation error and change nothing. A checkpoint that claims more
    /// strokes than exist is state corruption and fails the orchestrator.
    ///
    /// Checkpoints newer than the target are dropped afterwards: their stroke history was just
    /// truncated away, so rolling forward to them is no longer possible.
    #[instrument(skip(self), fields(checkpoint_id = %id))]
    pub async fn rollback_to(&mut self, id: CheckpointId) -> Result<(), AtelierError> {
        self.ensure_operational()?;
        let checkpoint = self.checkpoints.resolve(id)?.clone();
        if checkpoint.history_len > self.strokes.len() {
            let err = AtelierError::corruption(format!(
                "checkpoint {id} expects {} strokes but only {} exist",
                checkpoint.history_len,
                self.strokes.len()
            ));
            return Err(self.fail(err));
        }

        let timeout = self.config.collaborator_timeout();
        guarded(
            timeout,
            "restore_state",
            self.canvas.restore_state(&checkpoint.snapshot),
        )
        .await?;

        let discarded = self.strokes.len() - checkpoint.history_len;
        self.strokes.truncate(checkpoint.history_len);
        let from_phase = self.phases.current();
        self.phases.restore(checkpoint.phase);
        self.tracker.clear_plan();
        let checkpoints_dropped = self.checkpoints.discard_after(id);
        info!(
            from = %from_phase,
            to = %checkpoint.phase,
            discarded,
            checkpoints_dropped,
            "rolled back"
        );
        self.log.record(LogEvent::RollbackPerformed {
            checkpoint_id: id,
            from_phase,
            to_phase: checkpoint.phase,
            strokes_discarded: discarded,
        });
        Ok(())
    }

    /// Roll back to the most recent checkpoint taken at or before `phase`.
    pub async fn rollback_to_phase(&mut self, phase: DrawingPhase) -> Result<(), AtelierError> {
        let id = self
            .checkpoints
            .find_for_phase(phase)
            .map(|cp| cp.id)
            .ok_or_else(|| {
                AtelierError::validation(format!("no checkpoint at or before {phase}"))
            })?;
        self.rollback_to(id).await
    }

    // ========================================
    // operator controls
    // ========================================

    /// Operator-driven phase change. Rejected transitions are logged and returned as validation errors.
    pub async fn transition_phase(
        &mut self,
        target: DrawingPhase,
        reason: &str,
    ) -> Result<(), AtelierError> {
        self.ensure_operational()?;
        let from = self.phases.current();
        if !self.phases.transition_to(target, reason, &mut self.log) {
            return Err(AtelierError::validation(format!(
                "invalid phase transition {from} -> {target}"
            )));
        }
        if from != target && self.config.checkpoint_on_phase_change {
            self.create_checkpoint(format!("Entered {target} from {from}"))
                .await?;
        }
        Ok(())
    }

    /// Operator reset: tasks, tracker state, stop request and failure are dropped and the
    /// phase goes back to sketch.
    ///
    /// The decision log, checkpoints, stroke history and goal are kept.
    pub fn reset(&mut self) {
        warn!(state = ?self.state, "orchestrator reset");
        self.registry.clear(&mut self.tracker);
        let goal = self.tracker.goal().to_string();
        self.tracker = StateTracker::new(self.config.history_capacity);
        self.tracker.set_goal(goal);
        self.session_iterations = 0;
        self.phases.reset("operator reset", &mut self.log);
        let _ = self.stop_tx.send(false);
        self.state = OrchestratorState::Idle;
        self.last_stop = None;
    }

    pub fn statistics(&self) -> WorkflowStatistics {
        let mut strokes_by_intent = BTreeMap::new();
        for stroke in &self.strokes {
            *strokes_by_intent.entry(stroke.intent).or_insert(0) += 1;
        }
        WorkflowStatistics {
            state: self.state.clone(),
            goal: self.tracker.goal().to_string(),
            phase: self.phases.current(),
            iteration_in_phase: self.phases.iteration_in_phase(),
            time_in_phase: self.phases.time_in_phase().to_std().unwrap_or_default(),
            iterations: self.tracker.iteration(),
            tasks: self.registry.statistics(),
            strokes: self.strokes.len(),
            strokes_by_intent,
            checkpoints: self.checkpoints.len(),
            log: self.log.statistics(),
            phases: self.log.phase_summaries(),
        }
    }

    pub fn export_workflow(&self) -> WorkflowExport {
        WorkflowExport {
            exported_at: self.clock.now(),
            state: ExportedState {
                brain: self.tracker.state().clone(),
                tasks: self.registry.tasks().into_iter().cloned().collect(),
                strokes: self.strokes.clone(),
            },
            phase: self.phases.state().clone(),
            checkpoints: self.checkpoints.summaries(),
            log: self.log.export().cloned().collect(),
        }
    }

    // ========================================
    // internals
    // ========================================

    fn ensure_operational(&self) -> Result<(), AtelierError> {
        match &self.state {
            OrchestratorState::Failed { reason } => Err(AtelierError::corruption(format!(
                "orchestrator failed ({reason}); reset required"
            ))),
            _ => Ok(()),
        }
    }

    async fn ensure_surface(&mut self) -> Result<(), AtelierError> {
        if self.surface_ready {
            return Ok(());
        }
        let timeout = self.config.collaborator_timeout();
        let canvas = &self.config.canvas;
        guarded(
            timeout,
            "create_surface",
            self.canvas
                .create_surface(canvas.width, canvas.height, canvas.background),
        )
        .await?;
        self.surface_ready = true;
        Ok(())
    }

    async fn ensure_started(&mut self) -> Result<(), AtelierError> {
        if self.started {
            return Ok(());
        }
        self.ensure_surface().await?;
        if self.config.initial_checkpoint {
            self.create_checkpoint("Initial canvas state").await?;
        }
        self.started = true;
        Ok(())
    }

    fn stopped(&mut self, reason: StopReason) -> IterationSummary {
        self.last_stop = Some(reason);
        IterationSummary {
            iteration: self.tracker.iteration(),
            phase: self.phases.current(),
            tasks_created: 0,
            quality: None,
            outcome: IterationOutcome::Stopped { reason },
        }
    }

    fn fail(&mut self, err: AtelierError) -> AtelierError {
        if err.kind().is_fatal() {
            error!(error = %err, "orchestrator failed");
            self.state = OrchestratorState::Failed {
                reason: err.to_string(),
            };
        }
        err
    }
}
