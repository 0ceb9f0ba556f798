//! 控制与角度消息
//!
//! - `ControlMessage` ('C')：测试流程控制（开始/停止/重启/完成……）
//! - `AngleMessage` ('A')：步进电机角度设置请求与应答

use crate::{MessageType, Packet, ProtocolError};
use bytes::{Buf, BufMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 控制动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ControlAction {
    /// 清除（无动作）
    Clear = 0,
    /// 测试开始
    Start = 1,
    /// 停止测试
    Stop = 2,
    /// 发射端空闲
    Idle = 3,
    /// 请求重启当前测试
    Restart = 4,
    /// 请求状态报告
    Status = 5,
    /// 当前测试配置完成
    Done = 6,
    /// 应答
    Ack = 7,
    /// 设置（角度请求）
    Set = 8,
}

impl ControlAction {
    /// 动作名称（用于日志与监控输出）
    pub fn name(self) -> &'static str {
        match self {
            ControlAction::Clear => "CLEAR",
            ControlAction::Start => "START",
            ControlAction::Stop => "STOP",
            ControlAction::Idle => "IDLE",
            ControlAction::Restart => "RESTART",
            ControlAction::Status => "STATUS",
            ControlAction::Done => "DONE",
            ControlAction::Ack => "ACK",
            ControlAction::Set => "SET",
        }
    }

    fn decode(value: u8) -> Result<Self, ProtocolError> {
        ControlAction::try_from(value).map_err(|_| ProtocolError::InvalidValue {
            field: "ControlAction",
            value,
        })
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 控制消息 ('C')
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlMessage {
    pub action: ControlAction,
}

impl ControlMessage {
    /// 载荷长度
    pub const WIRE_LEN: usize = 1;

    pub fn new(action: ControlAction) -> Self {
        Self { action }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.action.into());
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        check_len(MessageType::Control, payload, Self::WIRE_LEN)?;
        Ok(Self {
            action: ControlAction::decode(payload[0])?,
        })
    }

    /// 转换为数据包
    pub fn to_packet(self) -> Packet {
        crate::Message::Control(self).to_packet()
    }
}

/// 角度消息 ('A')
///
/// 发射端发送 `Set` 请求，步进节点转动后回复 `Ack`（携带请求的角度）。
/// 角度单位是步进电机的步数（200 步一圈）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AngleMessage {
    pub angle: u16,
    pub action: ControlAction,
}

impl AngleMessage {
    /// 载荷长度
    pub const WIRE_LEN: usize = 3;

    /// 角度设置请求
    pub fn set(angle: u16) -> Self {
        Self {
            angle,
            action: ControlAction::Set,
        }
    }

    /// 角度设置应答
    pub fn ack(angle: u16) -> Self {
        Self {
            angle,
            action: ControlAction::Ack,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.action == ControlAction::Ack
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16_le(self.angle);
        buf.put_u8(self.action.into());
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        check_len(MessageType::Angle, payload, Self::WIRE_LEN)?;
        let mut buf = payload;
        let angle = buf.get_u16_le();
        let action = ControlAction::decode(buf.get_u8())?;
        Ok(Self { angle, action })
    }

    /// 转换为数据包
    pub fn to_packet(self) -> Packet {
        crate::Message::Angle(self).to_packet()
    }
}

/// 固定长度载荷检查
pub(crate) fn check_len(
    msg_type: MessageType,
    payload: &[u8],
    expected: usize,
) -> Result<(), ProtocolError> {
    if payload.len() != expected {
        return Err(ProtocolError::InvalidLength {
            msg_type,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_action_from_u8() {
        assert_eq!(ControlAction::try_from(1).unwrap(), ControlAction::Start);
        assert_eq!(ControlAction::try_from(6).unwrap(), ControlAction::Done);
        assert_eq!(ControlAction::try_from(8).unwrap(), ControlAction::Set);
        assert!(ControlAction::try_from(9).is_err());
    }

    #[test]
    fn test_control_action_name() {
        assert_eq!(ControlAction::Restart.to_string(), "RESTART");
        assert_eq!(ControlAction::Ack.name(), "ACK");
    }

    #[test]
    fn test_control_message_decode() {
        let msg = ControlMessage::decode(&[4]).unwrap();
        assert_eq!(msg.action, ControlAction::Restart);
    }

    #[test]
    fn test_control_message_rejects_unknown_action() {
        assert_eq!(
            ControlMessage::decode(&[0xEE]),
            Err(ProtocolError::InvalidValue {
                field: "ControlAction",
                value: 0xEE
            })
        );
    }

    #[test]
    fn test_control_message_rejects_wrong_length() {
        assert!(matches!(
            ControlMessage::decode(&[1, 2]),
            Err(ProtocolError::InvalidLength {
                expected: 1,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_angle_message_encode() {
        let mut buf = Vec::new();
        AngleMessage::set(0x0105).encode(&mut buf);
        assert_eq!(buf, vec![0x05, 0x01, ControlAction::Set as u8]);
    }

    #[test]
    fn test_angle_message_decode() {
        let msg = AngleMessage::decode(&[200, 0, 7]).unwrap();
        assert_eq!(msg.angle, 200);
        assert!(msg.is_ack());
    }

    #[test]
    fn test_angle_message_to_packet() {
        let packet = AngleMessage::ack(35).to_packet();
        assert_eq!(packet.msg_type(), MessageType::Angle);
        assert_eq!(packet.payload(), &[35, 0, 7]);
    }
}
