//! # Phaser Node
//!
//! 三个节点应用：
//! - [`sweep`]：发射端扫描引擎（功率 × 天线状态 × 角度）
//! - [`monitor`]：接收端，按扫描点聚合 RSSI/LQI 并输出报告
//! - [`pointing`]：步进节点，按请求转动天线并应答
//!
//! 每个节点都是"主循环 + RX 线程"：RX 线程上的处理器只写共享信号，
//! 所有发送都在主循环上完成。

mod error;
pub mod monitor;
pub mod pointing;
pub mod sweep;

pub use error::NodeError;
pub use monitor::{MonitorEvent, MonitorHandler, MonitorNode, MonitorSignals};
pub use pointing::{PointingHandler, PointingNode, PointingSignals};
pub use sweep::{
    Advance, ConfigRejection, EngineConfig, EngineSignals, EngineState, SweepEngine,
    SweepIterator, SweepPoint, TransmitterHandler, validate,
};
