//! 发射端扫描
//!
//! 扫描顺序（最快变化在前）：功率 → 天线轴 A → 天线轴 B → 角度 → 下一组测试配置。

mod engine;
mod iterator;
mod signals;
mod validation;

pub use engine::{EngineConfig, EngineState, SweepEngine};
pub use iterator::{Advance, SweepIterator, SweepPoint};
pub use signals::{EngineSignals, TransmitterHandler};
pub use validation::{ConfigRejection, validate};
