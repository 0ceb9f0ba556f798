//! 驱动层错误类型定义

use phaser_protocol::ProtocolError;
use phaser_radio::RadioError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 射频驱动错误
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// RX 线程错误
    #[error("RX thread error: {0}")]
    RxThread(String),
}
