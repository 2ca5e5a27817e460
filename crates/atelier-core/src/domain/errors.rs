//! Errors - エラー型と分類
//!
//! `AtelierError` は 4 種類に分類されます（`ErrorKind`）:
//! - Validation: 呼び出し側の入力ミス。自動リトライしない
//! - ActionExecution: canvas / perception の失敗・タイムアウト。タスク単位でリトライ可能
//! - RetryExhausted: リトライ上限。報告のみでワークフローは継続
//! - StateCorruption: 不変条件違反。Orchestrator は Failed に遷移する

use std::time::Duration;

use thiserror::Error;

use super::ids::TaskId;

/// Operational classification of an [`AtelierError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    ActionExecution,
    RetryExhausted,
    StateCorruption,
}

impl ErrorKind {
    /// Fatal errors stop the orchestrator until an explicit reset.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::StateCorruption)
    }

    /// Whether the failed task attempt may be handed to `schedule_retry`.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::ActionExecution)
    }
}

/// Domain error for the orchestration core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AtelierError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("action execution failed: {0}")]
    ActionExecution(String),

    #[error("retries exhausted for {task_id} after {retries} retries")]
    RetryExhausted { task_id: TaskId, retries: u32 },

    #[error("state corruption: {0}")]
    StateCorruption(String),
}

impl AtelierError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn corruption(message: impl Into<String>) -> Self {
        Self::StateCorruption(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AtelierError::Validation(_) => ErrorKind::Validation,
            AtelierError::ActionExecution(_) => ErrorKind::ActionExecution,
            AtelierError::RetryExhausted { .. } => ErrorKind::RetryExhausted,
            AtelierError::StateCorruption(_) => ErrorKind::StateCorruption,
        }
    }
}

/// Failure reported by an external collaborator (canvas executor or perception).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

impl CollaboratorError {
    pub fn failed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            message: message.into(),
        }
    }
}

// collaborator の失敗は常に ActionExecution として上に返す（リトライ判断は TaskRegistry に集約）
impl From<CollaboratorError> for AtelierError {
    fn from(err: CollaboratorError) -> Self {
        AtelierError::ActionExecution(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AtelierError::validation("bad"), ErrorKind::Validation, false)]
    #[case(AtelierError::ActionExecution("x".into()), ErrorKind::ActionExecution, false)]
    #[case(AtelierError::corruption("dup"), ErrorKind::StateCorruption, true)]
    fn errors_are_classified(
        #[case] err: AtelierError,
        #[case] kind: ErrorKind,
        #[case] fatal: bool,
    ) {
        assert_eq!(err.kind(), kind);
        assert_eq!(err.kind().is_fatal(), fatal);
    }

    #[test]
    fn collaborator_timeout_becomes_action_execution() {
        let err: AtelierError = CollaboratorError::Timeout {
            operation: "draw_stroke",
            timeout: Duration::from_millis(50),
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::ActionExecution);
        assert!(err.kind().is_retryable());
        assert!(err.to_string().contains("draw_stroke timed out"));
    }
}
