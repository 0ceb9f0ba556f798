//! 驱动层模块
//!
//! 本模块提供节点与射频之间的消息链路，包括：
//! - 发送：单次 / 可靠（重复发送）/ 等待应答
//! - 接收：RX 线程、帧校验、按类型分发到处理器
//! - 重入保护：处理中到达的帧直接丢弃并计数
//! - 时钟抽象：真实时钟与测试用手动时钟
//! - 链路指标（原子计数器）
//!
//! 节点应用（发射端、接收端、步进节点）构建在本层之上。

pub mod clock;
pub mod dispatch;
mod error;
pub mod guard;
pub mod link;
pub mod metrics;
pub mod pipeline;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{DispatchOutcome, Dispatcher, MessageHandler};
pub use error::DriverError;
pub use guard::{ProcessingGuard, ProcessingToken};
pub use link::{LinkConfig, MessageLink};
pub use metrics::{LinkMetrics, MetricsSnapshot};
pub use pipeline::{RxThread, rx_loop};
