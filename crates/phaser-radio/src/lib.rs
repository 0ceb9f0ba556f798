//! # Phaser Radio Adapter Layer
//!
//! 无线收发器抽象层（CC2420 一类的 802.15.4 收发器）。
//!
//! 上层只通过发送/接收/RSSI/LQI/发射功率这几个能力访问射频硬件；
//! 适配器可以拆分为独立的 RX/TX 两半，
//! 以便接收线程与主循环各自持有一半。

use bytes::Bytes;
use std::time::{Duration, Instant};
use thiserror::Error;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{LinkQuality, MockAir, MockRadio, MockRadioRx, MockRadioTx, Transmission};

/// 最大发射功率等级（CC2420: 0(min) - 31(max)）
pub const MAX_TX_POWER: u8 = 31;

/// 单帧最大长度（127 字节 PSDU 减去 2 字节 FCS）
pub const MAX_FRAME_LEN: usize = 125;

/// 射频适配层统一错误类型
#[derive(Error, Debug)]
pub enum RadioError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Receive timeout")]
    Timeout,
    #[error("Radio disconnected")]
    Disconnected,
    #[error("Frame too long: {len} bytes (max 125)")]
    FrameTooLong { len: usize },
    #[error("Invalid TX power level: {0} (max 31)")]
    InvalidPower(u8),
    #[error("Device Error: {0}")]
    Device(String),
}

impl RadioError {
    /// 是否为致命错误（接收线程应退出）
    pub fn is_fatal(&self) -> bool {
        matches!(self, RadioError::Disconnected)
    }
}

/// 接收到的射频帧
///
/// RSSI 与 LQI 在接收时刻从收发器读出，随帧一起上交。
/// `received_at` 是帧到达收发器的时刻（相当于接收中断触发的时刻），
/// 分发器据此判断帧是否在处理器忙时到达。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioFrame {
    pub data: Bytes,
    pub rssi: i8,
    pub lqi: i8,
    pub received_at: Instant,
}

impl RadioFrame {
    /// 以当前时刻作为到达时刻
    pub fn new(data: impl Into<Bytes>, rssi: i8, lqi: i8) -> Self {
        Self::with_arrival(data, rssi, lqi, Instant::now())
    }

    pub fn with_arrival(data: impl Into<Bytes>, rssi: i8, lqi: i8, at: Instant) -> Self {
        Self {
            data: data.into(),
            rssi,
            lqi,
            received_at: at,
        }
    }
}

/// 检查帧长度
pub fn check_frame_len(len: usize) -> Result<(), RadioError> {
    if len > MAX_FRAME_LEN {
        return Err(RadioError::FrameTooLong { len });
    }
    Ok(())
}

/// 检查发射功率等级
pub fn check_tx_power(level: u8) -> Result<(), RadioError> {
    if level > MAX_TX_POWER {
        return Err(RadioError::InvalidPower(level));
    }
    Ok(())
}

pub trait RadioAdapter {
    fn send(&mut self, data: &[u8]) -> Result<(), RadioError>;
    fn receive(&mut self) -> Result<RadioFrame, RadioError>;
    fn set_tx_power(&mut self, level: u8) -> Result<(), RadioError>;
    /// 最近一次接收的 RSSI
    fn last_rssi(&self) -> i8;
    /// 最近一次接收的 LQI
    fn last_lqi(&self) -> i8;
    fn set_receive_timeout(&mut self, _timeout: Duration) {}
    fn receive_timeout(&mut self, timeout: Duration) -> Result<RadioFrame, RadioError> {
        self.set_receive_timeout(timeout);
        self.receive()
    }
    fn try_receive(&mut self) -> Result<Option<RadioFrame>, RadioError> {
        match self.receive_timeout(Duration::ZERO) {
            Ok(frame) => Ok(Some(frame)),
            Err(RadioError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub trait RxAdapter {
    /// 阻塞接收（受接收超时约束，超时返回 [`RadioError::Timeout`]）
    fn receive(&mut self) -> Result<RadioFrame, RadioError>;
    fn last_rssi(&self) -> i8;
    fn last_lqi(&self) -> i8;
}

pub trait TxAdapter {
    fn send(&mut self, data: &[u8]) -> Result<(), RadioError>;
    fn set_tx_power(&mut self, level: u8) -> Result<(), RadioError>;
    fn tx_power(&self) -> u8;
}

pub trait SplittableRadio: RadioAdapter {
    type RxAdapter: RxAdapter + Send;
    type TxAdapter: TxAdapter;
    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), RadioError>;
}
