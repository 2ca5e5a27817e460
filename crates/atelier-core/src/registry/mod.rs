//! Task Registry + State Tracker.
//!
//! TaskRegistry はタスク本体と状態遷移、StateTracker は BrainState（目標・4 リスト・履歴）を持ちます。
//! 状態を変えるメソッドは `&mut StateTracker` を明示的に受け取り、両者を同時に更新します。

pub mod retry;
pub mod tasks;
pub mod tracker;

pub use retry::RetryPolicy;
pub use tasks::{TaskCounts, TaskRegistry};
pub use tracker::StateTracker;
