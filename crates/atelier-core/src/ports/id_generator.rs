//! IdGenerator port - ID 生成の抽象化
//!
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（Clock 駆動）

use ulid::Ulid;

use crate::domain::ids::{ActionId, CheckpointId, ExecutionId, PlanId, TaskId};
use crate::ports::Clock;

/// IdGenerator は ULID を生成
///
/// 型付き ID はデフォルト実装で `next_ulid` から作ります（`dyn IdGenerator` で使えるように）。
pub trait IdGenerator: Send + Sync {
    fn next_ulid(&self) -> Ulid;

    fn task_id(&self) -> TaskId {
        TaskId::from(self.next_ulid())
    }

    fn plan_id(&self) -> PlanId {
        PlanId::from(self.next_ulid())
    }

    fn action_id(&self) -> ActionId {
        ActionId::from(self.next_ulid())
    }

    fn checkpoint_id(&self) -> CheckpointId {
        CheckpointId::from(self.next_ulid())
    }

    fn execution_id(&self) -> ExecutionId {
        ExecutionId::from(self.next_ulid())
    }
}

/// UlidGenerator は Clock の時刻 + ランダム部で ULID を生成
///
/// FixedClock を使えば timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.task_id();
        let id2 = id_gen.task_id();
        let id3 = id_gen.task_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_pins_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.checkpoint_id();
        let id2 = id_gen.checkpoint_id();

        // ランダム部分があるので ID は異なる
        assert_ne!(id1, id2);

        // timestamp 部分は同じ
        assert_eq!(id1.as_ulid().timestamp_ms(), id2.as_ulid().timestamp_ms());
        assert_eq!(
            id1.as_ulid().timestamp_ms(),
            fixed_time.timestamp_millis() as u64
        );
    }

    #[test]
    fn typed_ids_carry_their_prefix() {
        let id_gen: Box<dyn IdGenerator> = Box::new(UlidGenerator::new(SystemClock));

        assert!(id_gen.task_id().to_string().starts_with("task-"));
        assert!(id_gen.plan_id().to_string().starts_with("plan-"));
        assert!(id_gen.action_id().to_string().starts_with("action-"));
        assert!(id_gen.execution_id().to_string().starts_with("exec-"));
    }
}
