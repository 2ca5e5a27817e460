//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! canvas / perception は外部コラボレータ、clock / id_generator はテスト容易性のための抽象です。

pub mod canvas;
pub mod clock;
pub mod id_generator;
pub mod perception;

pub use self::canvas::{CanvasExecutor, CanvasManifest, CanvasSnapshot};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::perception::Perception;
