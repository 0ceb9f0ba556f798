//! # Phaser Tools - 接收端数据处理
//!
//! **依赖原则**: 只依赖 `phaser-protocol`，不依赖射频与驱动层
//!
//! ## 包含模块
//!
//! - `stream_stat` - 流式统计（O(1) 均值与方差）
//! - `experiment` - 按扫描点聚合 RSSI/LQI 并生成报告
//! - `capture` - 原始帧抓包记录（环形缓冲）

pub mod capture;
pub mod experiment;
pub mod stream_stat;

pub use capture::{CaptureLog, CaptureRecord};
pub use experiment::{Experiment, ExperimentAggregator, ExperimentReport};
pub use stream_stat::StreamStat;
