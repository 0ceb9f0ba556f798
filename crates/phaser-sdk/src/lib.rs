//! Phaser SDK - 相控阵天线扫描测试台 Rust SDK
//!
//! 发射端在功率、天线状态与角度三个维度上扫描，每个扫描点发送一批测试消息；
//! 接收端按扫描点统计 RSSI/LQI；步进节点负责天线指向。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **射频层** (`radio`): 收发器抽象（CC2420 一类），可拆分为 RX/TX 两半
//! - **协议层** (`protocol`): 帧封装、校验和与载荷编解码
//! - **驱动层** (`driver`): 消息链路、RX 线程、分发与时钟
//! - **天线层** (`antenna`): 天线能力接口、四种天线平台与步进电机
//! - **节点层** (`node`): 扫描引擎、接收端与步进节点
//! - **工具层** (`tools`): 流式统计、实验聚合与抓包
//!
//! # 快速开始
//!
//! ```rust
//! use phaser_sdk::prelude::*;
//!
//! let sets = test_sets::builtin(PlatformId::Phaser);
//! assert_eq!(sets.len(), 2);
//! ```
//!
//! 启用 `mock` feature 后可以用 [`sim::SimRigBuilder`] 在进程内跑通整套测试台。

pub use phaser_antenna as antenna;
pub use phaser_driver as driver;
pub use phaser_node as node;
pub use phaser_protocol as protocol;
pub use phaser_radio as radio;
pub use phaser_tools as tools;

pub mod logging;
pub mod prelude;

#[cfg(feature = "mock")]
pub mod sim;

// --- 常用类型 ---

pub use antenna::{AntennaDriver, Stepper, test_sets};
pub use driver::{Clock, DriverError, LinkConfig, ManualClock, SystemClock};
pub use node::{EngineConfig, EngineState, MonitorEvent, NodeError, SweepEngine};
pub use protocol::{Message, Packet, PlatformId, ProtocolError, TestConfig};
pub use radio::RadioError;
pub use tools::ExperimentReport;

pub use logging::init_logger;
