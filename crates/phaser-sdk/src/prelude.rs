//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use phaser_sdk::prelude::*;
//! ```

// 协议层
pub use crate::protocol::{
    AngleMessage, AntennaTestRange, AxisRange, ControlAction, ControlMessage, Message, Packet,
    PlatformId, TestConfig, TestPing, TextMessage,
};

// 射频层（常用 Trait）
pub use crate::radio::{RadioAdapter, RxAdapter, SplittableRadio, TxAdapter};

// 驱动层
pub use crate::driver::{Clock, LinkConfig, ManualClock, MessageHandler, MessageLink, SystemClock};

// 天线层
pub use crate::antenna::{AntennaDriver, Stepper, StepperConfig, test_sets};

// 节点层
pub use crate::node::{EngineConfig, EngineState, MonitorEvent, SweepEngine};

// 工具层
pub use crate::tools::{ExperimentAggregator, ExperimentReport};

// 仿真
#[cfg(feature = "mock")]
pub use crate::sim::{SimRig, SimRigBuilder, SweepLog};

// 错误类型
pub use crate::driver::DriverError;
pub use crate::node::NodeError;
pub use crate::protocol::ProtocolError;
pub use crate::radio::RadioError;
