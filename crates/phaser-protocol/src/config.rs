//! 测试配置（TestConfig）
//!
//! 一次扫描运行的完整参数集。发射端从内置测试集加载，或通过无线 'G' 消息接收。

use crate::control::check_len;
use crate::{MessageType, POWER_LIST_SIZE, Packet, ProtocolError};
use bytes::{Buf, BufMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

// ============================================================================
// 平台类型
// ============================================================================

/// 天线平台类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum PlatformId {
    /// TelosB，无天线硬件
    #[default]
    TelosB = 0,
    /// 双移相器
    Phaser = 1,
    /// PE46120 移相 + 衰减
    PhaserTx = 2,
    /// 6 针脚方向图
    Santa = 3,
}

impl PlatformId {
    /// 平台名称
    pub fn name(self) -> &'static str {
        match self {
            PlatformId::TelosB => "TelosB",
            PlatformId::Phaser => "Phaser",
            PlatformId::PhaserTx => "PhaserTX",
            PlatformId::Santa => "Santa",
        }
    }

    /// 由原始 ID 获取名称，未知 ID 返回 "?"
    pub fn name_of(id: u8) -> &'static str {
        PlatformId::try_from(id).map(PlatformId::name).unwrap_or("?")
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// 天线轴范围
// ============================================================================

/// 单个天线轴的扫描范围
///
/// `count == 0` 表示该轴固定在 `start`，不参与迭代。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AxisRange {
    pub start: u8,
    pub step: u8,
    pub count: u16,
}

impl AxisRange {
    /// 线上长度
    pub const WIRE_LEN: usize = 4;

    pub const fn new(start: u8, step: u8, count: u16) -> Self {
        Self { start, step, count }
    }

    /// 固定轴（不迭代）
    pub const fn fixed(start: u8) -> Self {
        Self {
            start,
            step: 0,
            count: 0,
        }
    }

    /// 是否参与迭代
    pub fn is_iterated(&self) -> bool {
        self.count != 0
    }

    /// 该轴贡献的取值个数（固定轴为 1）
    pub fn positions(&self) -> usize {
        (self.count as usize).max(1)
    }

    fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.start);
        buf.put_u8(self.step);
        buf.put_u16_le(self.count);
    }

    fn decode(buf: &mut &[u8]) -> Self {
        Self {
            start: buf.get_u8(),
            step: buf.get_u8(),
            count: buf.get_u16_le(),
        }
    }
}

/// 平台相关的天线测试范围
///
/// 两个轴的含义由平台决定：
/// - Phaser: A = 移相器 A，B = 移相器 B
/// - PhaserTX: A = 相位，B = 衰减
/// - Santa: A = 针脚方向图，B 保留
/// - TelosB: 两轴均不使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AntennaTestRange {
    pub axis_a: AxisRange,
    pub axis_b: AxisRange,
}

impl AntennaTestRange {
    pub const fn new(axis_a: AxisRange, axis_b: AxisRange) -> Self {
        Self { axis_a, axis_b }
    }

    /// 两轴均固定
    pub const fn fixed() -> Self {
        Self {
            axis_a: AxisRange::fixed(0),
            axis_b: AxisRange::fixed(0),
        }
    }
}

// ============================================================================
// 测试配置
// ============================================================================

/// 测试运行配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TestConfig {
    pub platform: PlatformId,
    /// 测试开始前延迟（ms）
    pub start_delay: u16,
    /// 每个扫描点发送的测试消息数
    pub send_count: u16,
    /// 测试消息发送间隔（ms）
    pub send_delay: u16,
    pub angle_step: u16,
    pub angle_count: u16,
    /// 发射功率列表，以 0 结束
    pub power: [u8; POWER_LIST_SIZE],
    pub antenna: AntennaTestRange,
}

impl TestConfig {
    /// 线上长度：1 + 5*2 + 8 + 2*4
    pub const WIRE_LEN: usize = 1 + 10 + POWER_LIST_SIZE + 2 * AxisRange::WIRE_LEN;

    /// 由功率切片构造功率列表（超出部分截断，剩余补 0）
    pub fn power_list(powers: &[u8]) -> [u8; POWER_LIST_SIZE] {
        let mut list = [0u8; POWER_LIST_SIZE];
        let len = powers.len().min(POWER_LIST_SIZE);
        list[..len].copy_from_slice(&powers[..len]);
        list
    }

    /// 扫描使用的功率值
    ///
    /// 第一项总是使用（即使为 0），之后的项遇到第一个 0 为止。
    pub fn powers(&self) -> impl Iterator<Item = u8> + '_ {
        let (first, rest) = self.power.split_at(1);
        first
            .iter()
            .chain(rest.iter().take_while(|&&p| p != 0))
            .copied()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.platform.into());
        buf.put_u16_le(self.start_delay);
        buf.put_u16_le(self.send_count);
        buf.put_u16_le(self.send_delay);
        buf.put_u16_le(self.angle_step);
        buf.put_u16_le(self.angle_count);
        buf.put_slice(&self.power);
        self.antenna.axis_a.encode(buf);
        self.antenna.axis_b.encode(buf);
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        check_len(MessageType::Config, payload, Self::WIRE_LEN)?;
        let mut buf = payload;

        let platform_id = buf.get_u8();
        let platform = PlatformId::try_from(platform_id).map_err(|_| ProtocolError::InvalidValue {
            field: "platform_id",
            value: platform_id,
        })?;
        let start_delay = buf.get_u16_le();
        let send_count = buf.get_u16_le();
        let send_delay = buf.get_u16_le();
        let angle_step = buf.get_u16_le();
        let angle_count = buf.get_u16_le();
        let mut power = [0u8; POWER_LIST_SIZE];
        buf.copy_to_slice(&mut power);
        let axis_a = AxisRange::decode(&mut buf);
        let axis_b = AxisRange::decode(&mut buf);

        Ok(Self {
            platform,
            start_delay,
            send_count,
            send_delay,
            angle_step,
            angle_count,
            power,
            antenna: AntennaTestRange { axis_a, axis_b },
        })
    }

    /// 转换为数据包
    pub fn to_packet(&self) -> Packet {
        crate::Message::Config(*self).to_packet()
    }
}

impl fmt::Display for TestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Platform: {}", self.platform)?;
        writeln!(
            f,
            "Start_delay={}\tSend_delay={}\tSend_count={}",
            self.start_delay, self.send_delay, self.send_count
        )?;
        writeln!(
            f,
            "Angle_step={}\tAngle_count={}",
            self.angle_step, self.angle_count
        )?;
        write!(f, "TX_power:")?;
        for p in self.powers() {
            write!(f, "\t{}", p)?;
        }
        writeln!(f)?;
        let AntennaTestRange { axis_a, axis_b } = self.antenna;
        write!(
            f,
            "Ant_config:\t{}\t{}\t{}\t{}\t{}\t{}",
            axis_a.start, axis_a.step, axis_a.count, axis_b.start, axis_b.step, axis_b.count
        )
    }
}
