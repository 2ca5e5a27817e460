//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type で型付けしています。
//! `TaskId` と `CheckpointId` は同じ 128-bit ですが、混同するとコンパイルエラーになります。
//!
//! - Display: `task-01HV...` のようにプレフィックス付き
//! - JSON: ULID 文字列のみ（プレフィックスなし）

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for each ID type. Provides the display prefix.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier.
///
/// `T` は PhantomData なので実行時のサイズは Ulid と同じ（16 bytes）。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// Marker for corrective tasks.
    Task,
    "task-"
);
id_marker!(
    /// Marker for action plans (one per task attempt).
    Plan,
    "plan-"
);
id_marker!(
    /// Marker for primitive drawing actions.
    Action,
    "action-"
);
id_marker!(
    /// Marker for canvas checkpoints.
    Checkpoint,
    "checkpoint-"
);
id_marker!(
    /// Marker for execution history records.
    Execution,
    "exec-"
);

/// Identifier of a corrective task.
pub type TaskId = Id<Task>;

/// Identifier of an action plan (regenerated on every attempt).
pub type PlanId = Id<Plan>;

/// Identifier of a single drawing action.
pub type ActionId = Id<Action>;

/// Identifier of a checkpoint.
pub type CheckpointId = Id<Checkpoint>;

/// Identifier of an execution history record.
pub type ExecutionId = Id<Execution>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types_with_prefixes() {
        let task = TaskId::from_ulid(Ulid::new());
        let plan = PlanId::from_ulid(Ulid::new());
        let checkpoint = CheckpointId::from_ulid(Ulid::new());

        assert!(task.to_string().starts_with("task-"));
        assert!(plan.to_string().starts_with("plan-"));
        assert!(checkpoint.to_string().starts_with("checkpoint-"));
        // let _: TaskId = plan; // <- does not compile
    }

    #[test]
    fn ids_serialize_as_bare_ulid_strings() {
        let ulid = Ulid::new();
        let id = TaskId::from_ulid(ulid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{ulid}\""));

        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<TaskId>(), size_of::<Ulid>());
        assert_eq!(size_of::<CheckpointId>(), 16);
    }
}
