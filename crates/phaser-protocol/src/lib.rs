//! # Phaser Protocol
//!
//! 相控阵天线测试台的无线消息协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: 消息类型 ID
//! - `constants`: 协议常量定义
//! - `frame`: 帧封装、签名与校验和
//! - `control`: 控制/角度消息
//! - `config`: 测试配置（TestConfig）
//! - `message`: 测试 ping、文本消息与类型化消息枚举
//!
//! ## 字节序
//!
//! 协议沿用 MSP430 节点的本机字节序：小端（LSB 在前）。
//! 本模块提供了字节序转换工具函数。

pub mod config;
pub mod constants;
pub mod control;
pub mod frame;
pub mod ids;
pub mod message;

// 重新导出常用类型
pub use config::*;
pub use constants::*;
pub use control::*;
pub use frame::*;
pub use ids::*;
pub use message::*;

use thiserror::Error;

/// 协议解析错误类型
///
/// 前五个变体属于"传输错误"（帧级别），其余属于"载荷错误"。
/// 两类错误在接收端都只会导致丢包，不会向上传播为致命错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Packet too short: {len} bytes (header is 5)")]
    TooShort { len: usize },

    #[error("Packet too long: {len} bytes (max 125)")]
    TooLong { len: usize },

    #[error("Signature mismatch: {found:02X?}")]
    BadSignature { found: [u8; 2] },

    #[error("Unknown message type id: 0x{id:02X}")]
    UnknownType { id: u8 },

    #[error("Checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Invalid payload length for {msg_type:?}: expected {expected}, got {actual}")]
    InvalidLength {
        msg_type: MessageType,
        expected: usize,
        actual: usize,
    },

    #[error("Payload too long: {len} bytes (max {max})")]
    PayloadTooLong { len: usize, max: usize },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: &'static str, value: u8 },

    #[error("No payload definition for message type {0:?}")]
    UnsupportedType(MessageType),

    #[error("Text payload is empty or not printable ASCII")]
    InvalidText,
}

impl ProtocolError {
    /// 是否为帧级别（传输）错误
    ///
    /// 传输错误在校验载荷类型之前就被拒绝；载荷错误说明帧本身有效，
    /// 但类型对应的载荷无法解析。
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProtocolError::TooShort { .. }
                | ProtocolError::TooLong { .. }
                | ProtocolError::BadSignature { .. }
                | ProtocolError::UnknownType { .. }
                | ProtocolError::ChecksumMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ProtocolError::TooShort { len: 1 }.is_transport());
        assert!(
            ProtocolError::ChecksumMismatch {
                expected: 1,
                actual: 2
            }
            .is_transport()
        );
        assert!(!ProtocolError::InvalidText.is_transport());
        assert!(!ProtocolError::UnsupportedType(MessageType::Phase).is_transport());
    }

    #[test]
    fn test_error_display() {
        let err = ProtocolError::UnknownType { id: 0x5A };
        assert_eq!(err.to_string(), "Unknown message type id: 0x5A");

        let err = ProtocolError::InvalidValue {
            field: "ControlAction",
            value: 42,
        };
        assert!(err.to_string().contains("ControlAction"));
    }
}
