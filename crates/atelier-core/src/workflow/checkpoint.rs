//! CheckpointManager - canvas スナップショットの保管
//!
//! 最大 `max_checkpoints` 件を保持し、超えたら古いものから捨てます（FIFO）。
//! rollback 後は対象より新しいものを捨てます（線形 undo）。
//! canvas への restore は Orchestrator の責務で、ここは検索と記録だけ。

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decision_log::DecisionLog;
use crate::domain::decision::LogEvent;
use crate::domain::errors::AtelierError;
use crate::domain::ids::CheckpointId;
use crate::domain::phase::DrawingPhase;
use crate::ports::{CanvasManifest, CanvasSnapshot, Clock, IdGenerator};

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub phase: DrawingPhase,
    /// Stroke history length when the snapshot was taken.
    pub history_len: usize,
    pub snapshot: CanvasSnapshot,
}

/// Checkpoint by reference: everything but the blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    pub id: CheckpointId,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub phase: DrawingPhase,
    pub history_len: usize,
    pub blob_size: usize,
    pub manifest: CanvasManifest,
}

impl From<&Checkpoint> for CheckpointSummary {
    fn from(cp: &Checkpoint) -> Self {
        Self {
            id: cp.id,
            created_at: cp.created_at,
            description: cp.description.clone(),
            phase: cp.phase,
            history_len: cp.history_len,
            blob_size: cp.snapshot.size(),
            manifest: cp.snapshot.manifest.clone(),
        }
    }
}

pub struct CheckpointManager {
    checkpoints: VecDeque<Checkpoint>,
    max_checkpoints: usize,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl CheckpointManager {
    pub fn new(max_checkpoints: usize, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            checkpoints: VecDeque::new(),
            max_checkpoints: max_checkpoints.max(1),
            clock,
            ids,
        }
    }

    pub fn create(
        &mut self,
        snapshot: CanvasSnapshot,
        phase: DrawingPhase,
        history_len: usize,
        description: impl Into<String>,
        log: &mut DecisionLog,
    ) -> CheckpointId {
        let id = self.ids.checkpoint_id();
        let description = description.into();
        self.checkpoints.push_back(Checkpoint {
            id,
            created_at: self.clock.now(),
            description: description.clone(),
            phase,
            history_len,
            snapshot,
        });
        while self.checkpoints.len() > self.max_checkpoints {
            if let Some(evicted) = self.checkpoints.pop_front() {
                debug!(checkpoint_id = %evicted.id, "oldest checkpoint evicted");
            }
        }
        debug!(checkpoint_id = %id, phase = %phase, history_len, "checkpoint created");
        log.record(LogEvent::CheckpointCreated {
            checkpoint_id: id,
            phase,
            history_len,
            description,
        });
        id
    }

    pub fn get(&self, id: CheckpointId) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|cp| cp.id == id)
    }

    /// Like `get`, but an unknown id is a validation error.
    pub fn resolve(&self, id: CheckpointId) -> Result<&Checkpoint, AtelierError> {
        self.get(id)
            .ok_or_else(|| AtelierError::validation(format!("unknown checkpoint {id}")))
    }

    pub fn latest(&self) -> Option<&Checkpoint> {
        self.checkpoints.back()
    }

    pub fn for_phase(&self, phase: DrawingPhase) -> Vec<&Checkpoint> {
        self.checkpoints
            .iter()
            .filter(|cp| cp.phase == phase)
            .collect()
    }

    /// Most recent checkpoint taken at or before `phase`.
    pub fn find_for_phase(&self, phase: DrawingPhase) -> Option<&Checkpoint> {
        self.checkpoints.iter().rev().find(|cp| cp.phase <= phase)
    }

    /// Drop every checkpoint newer than `id` and return how many went.
    ///
    /// Their stroke histories no longer exist once the workflow rolled back past them.
    /// Unknown ids drop nothing.
    pub fn discard_after(&mut self, id: CheckpointId) -> usize {
        let Some(pos) = self.checkpoints.iter().position(|cp| cp.id == id) else {
            return 0;
        };
        let keep = pos + 1;
        let dropped = self.checkpoints.len() - keep;
        self.checkpoints.truncate(keep);
        if dropped > 0 {
            debug!(checkpoint_id = %id, dropped, "newer checkpoints discarded");
        }
        dropped
    }

    pub fn summaries(&self) -> Vec<CheckpointSummary> {
        self.checkpoints.iter().map(CheckpointSummary::from).collect()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}
