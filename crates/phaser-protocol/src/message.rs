//! 测试消息、文本消息与类型化消息枚举
//!
//! [`Message`] 是协议层对外的统一入口：
//! 发送端用 [`Message::to_packet`] 构建帧，接收端用 `Message::try_from(&Packet)` 解析载荷。

use crate::control::check_len;
use crate::{
    AngleMessage, ControlMessage, MessageType, Packet, PlatformId, ProtocolError, TEXT_MAX_LEN,
    TestConfig,
};
use bytes::{Buf, BufMut};
use std::fmt;

// ============================================================================
// 天线状态
// ============================================================================

/// 天线状态（按平台区分的两个 8 位字段）
///
/// 线上固定占 2 字节：`[字段 0, 字段 1]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AntennaState {
    /// 双移相器
    Phaser { phase_a: u8, phase_b: u8 },
    /// PE46120 相位 + 衰减
    PhaserTx { phase: u8, attenuation: u8 },
    /// 针脚方向图
    Santa { pins: u8, extra: u8 },
    /// 无天线硬件
    #[default]
    None,
}

impl AntennaState {
    /// 线上长度
    pub const WIRE_LEN: usize = 2;

    /// 平台对应的初始（全零）状态
    pub fn initial(platform: PlatformId) -> Self {
        Self::from_bytes(platform, [0, 0])
    }

    /// 按平台解释两个原始字节
    pub fn from_bytes(platform: PlatformId, raw: [u8; 2]) -> Self {
        match platform {
            PlatformId::Phaser => AntennaState::Phaser {
                phase_a: raw[0],
                phase_b: raw[1],
            },
            PlatformId::PhaserTx => AntennaState::PhaserTx {
                phase: raw[0],
                attenuation: raw[1],
            },
            PlatformId::Santa => AntennaState::Santa {
                pins: raw[0],
                extra: raw[1],
            },
            PlatformId::TelosB => AntennaState::None,
        }
    }

    /// 原始两字节
    pub fn to_bytes(self) -> [u8; 2] {
        match self {
            AntennaState::Phaser { phase_a, phase_b } => [phase_a, phase_b],
            AntennaState::PhaserTx { phase, attenuation } => [phase, attenuation],
            AntennaState::Santa { pins, extra } => [pins, extra],
            AntennaState::None => [0, 0],
        }
    }

    /// 轴 A 的当前值
    pub fn axis_a(self) -> u8 {
        self.to_bytes()[0]
    }

    /// 轴 B 的当前值
    pub fn axis_b(self) -> u8 {
        self.to_bytes()[1]
    }

    /// 覆写两个轴的值（保持平台变体不变）
    pub fn set_axes(&mut self, a: u8, b: u8) {
        *self = match *self {
            AntennaState::Phaser { .. } => AntennaState::Phaser {
                phase_a: a,
                phase_b: b,
            },
            AntennaState::PhaserTx { .. } => AntennaState::PhaserTx {
                phase: a,
                attenuation: b,
            },
            AntennaState::Santa { .. } => AntennaState::Santa { pins: a, extra: b },
            AntennaState::None => AntennaState::None,
        };
    }
}

// ============================================================================
// 测试消息
// ============================================================================

/// 测试消息 ('T')
///
/// 发射端在每个扫描点连续发送 `send_count` 条；接收端按 `exp_idx` 聚合。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TestPing {
    /// 发送时刻（ms）
    pub timestamp: u32,
    pub msg_counter: u16,
    /// 扫描点序号
    pub exp_idx: u16,
    pub angle: u16,
    /// 天线状态原始字节（按平台解释）
    pub antenna: [u8; 2],
    /// 发射功率 0(min) - 31(max)
    pub power: u8,
}

impl TestPing {
    /// 载荷长度：4 + 2 + 2 + 2 + 2 + 1
    pub const WIRE_LEN: usize = 13;

    /// 接收端使用的相位值：两个天线字节按位或
    pub fn phase(&self) -> u8 {
        self.antenna[0] | self.antenna[1]
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.timestamp);
        buf.put_u16_le(self.msg_counter);
        buf.put_u16_le(self.exp_idx);
        buf.put_u16_le(self.angle);
        buf.put_slice(&self.antenna);
        buf.put_u8(self.power);
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        check_len(MessageType::Test, payload, Self::WIRE_LEN)?;
        let mut buf = payload;
        let timestamp = buf.get_u32_le();
        let msg_counter = buf.get_u16_le();
        let exp_idx = buf.get_u16_le();
        let angle = buf.get_u16_le();
        let antenna = [buf.get_u8(), buf.get_u8()];
        let power = buf.get_u8();
        Ok(Self {
            timestamp,
            msg_counter,
            exp_idx,
            angle,
            antenna,
            power,
        })
    }
}

// ============================================================================
// 文本消息
// ============================================================================

/// 文本消息 ('X')：1..=63 字节可打印 ASCII
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextMessage(String);

impl TextMessage {
    pub fn new(text: impl Into<String>) -> Result<Self, ProtocolError> {
        let text = text.into();
        if !is_valid_text(text.as_bytes()) {
            return Err(ProtocolError::InvalidText);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        if !is_valid_text(payload) {
            return Err(ProtocolError::InvalidText);
        }
        // 已确认为 ASCII
        let text = String::from_utf8(payload.to_vec()).map_err(|_| ProtocolError::InvalidText)?;
        Ok(Self(text))
    }
}

impl fmt::Display for TextMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_text(bytes: &[u8]) -> bool {
    !bytes.is_empty()
        && bytes.len() <= TEXT_MAX_LEN
        && bytes.iter().all(|&b| b.is_ascii_graphic() || b == b' ')
}

// ============================================================================
// 类型化消息
// ============================================================================

/// 已解析的类型化消息
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Message {
    Test(TestPing),
    Angle(AngleMessage),
    Control(ControlMessage),
    Config(TestConfig),
    Text(TextMessage),
}

impl Message {
    /// 消息类型 ID
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Test(_) => MessageType::Test,
            Message::Angle(_) => MessageType::Angle,
            Message::Control(_) => MessageType::Control,
            Message::Config(_) => MessageType::Config,
            Message::Text(_) => MessageType::Text,
        }
    }

    /// 编码载荷
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Message::Test(ping) => ping.encode(buf),
            Message::Angle(angle) => angle.encode(buf),
            Message::Control(control) => control.encode(buf),
            Message::Config(config) => config.encode(buf),
            Message::Text(text) => buf.put_slice(text.as_str().as_bytes()),
        }
    }

    /// 构建数据包
    ///
    /// 所有类型化载荷长度都有上限（最长为 63 字节的文本），不会超出帧容量。
    pub fn to_packet(&self) -> Packet {
        let mut payload = Vec::with_capacity(TEXT_MAX_LEN);
        self.encode(&mut payload);
        Packet::from_payload(self.message_type(), &payload)
    }
}

impl TryFrom<&Packet> for Message {
    type Error = ProtocolError;

    fn try_from(packet: &Packet) -> Result<Self, Self::Error> {
        let payload = packet.payload();
        match packet.msg_type() {
            MessageType::Test => TestPing::decode(payload).map(Message::Test),
            MessageType::Angle => AngleMessage::decode(payload).map(Message::Angle),
            MessageType::Control => ControlMessage::decode(payload).map(Message::Control),
            MessageType::Config => TestConfig::decode(payload).map(Message::Config),
            MessageType::Text => TextMessage::decode(payload).map(Message::Text),
            MessageType::Phase => Err(ProtocolError::UnsupportedType(MessageType::Phase)),
        }
    }
}

impl From<TestPing> for Message {
    fn from(ping: TestPing) -> Self {
        Message::Test(ping)
    }
}

impl From<AngleMessage> for Message {
    fn from(msg: AngleMessage) -> Self {
        Message::Angle(msg)
    }
}

impl From<ControlMessage> for Message {
    fn from(msg: ControlMessage) -> Self {
        Message::Control(msg)
    }
}

impl From<TestConfig> for Message {
    fn from(config: TestConfig) -> Self {
        Message::Config(config)
    }
}

impl From<TextMessage> for Message {
    fn from(text: TextMessage) -> Self {
        Message::Text(text)
    }
}
