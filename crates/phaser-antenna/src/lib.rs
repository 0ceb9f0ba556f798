//! # Phaser Antenna
//!
//! 天线能力接口与四种天线平台实现：
//!
//! | 平台 | 轴 A | 轴 B | 硬件 |
//! |------|------|------|------|
//! | Phaser | 移相器 A | 移相器 B | 并行移相器端口 |
//! | PhaserTX | 相位 | 衰减 | PE46120，14 位串行字 |
//! | Santa | 针脚方向图 | - | 6 针脚 |
//! | TelosB | - | - | 无 |
//!
//! 另外提供步进电机驱动（天线指向）。所有原始硬件都通过 [`hal`] 中的小型 trait 访问。

pub mod cursor;
pub mod driver;
pub mod hal;
pub mod phaser;
pub mod phaser_tx;
pub mod santa;
pub mod stepper;
pub mod telosb;
pub mod test_sets;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use cursor::{AntennaCursor, LoopCursor};
pub use driver::AntennaDriver;
pub use phaser::PhaserAntenna;
pub use phaser_tx::{Pe46120Word, PhaserTxAntenna};
pub use santa::{PIN_TABLE, SantaAntenna};
pub use stepper::{STEPS_PER_REV, Stepper, StepperConfig, StepperMotor};
pub use telosb::TelosBAntenna;
