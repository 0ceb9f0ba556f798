//! 消息类型 ID 定义
//!
//! 类型 ID 是帧头中的单个 ASCII 字节。

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum MessageType {
    /// 相位消息（保留 ID，没有载荷定义）
    Phase = b'P',
    /// 角度设置 / 应答
    Angle = b'A',
    /// 控制动作
    Control = b'C',
    /// 测试配置
    Config = b'G',
    /// 测试消息（类似 ping，携带当前扫描点）
    Test = b'T',
    /// 文本
    Text = b'X',
}

impl MessageType {
    /// 类型 ID 字节
    pub fn id(self) -> u8 {
        self.into()
    }

    /// 类型 ID 字符（用于日志）
    pub fn as_char(self) -> char {
        char::from(self.id())
    }
}
