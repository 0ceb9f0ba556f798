//! 协议常量定义

/// 帧签名（"PH"），位于每个数据包的前两个字节
pub const SIGNATURE: [u8; 2] = *b"PH";

/// 帧头长度：签名(2) + 类型(1) + 校验和(2)
pub const HEADER_LEN: usize = 5;

/// 单个无线数据包的最大长度（CC2420 帧长 127 减去 2 字节 FCS）
pub const MAX_PACKET_LEN: usize = 125;

/// 载荷最大长度
pub const MAX_PAYLOAD_LEN: usize = MAX_PACKET_LEN - HEADER_LEN;

/// 文本消息最大长度（字节，不含结束符）
pub const TEXT_MAX_LEN: usize = 63;

/// 发射功率列表长度，列表以 0 作为结束标记
pub const POWER_LIST_SIZE: usize = 8;

/// 测试开始前延迟上限（ms）
pub const MAX_START_DELAY_MS: u16 = 20_000;

/// 两次测试消息发送间隔上限（ms）
pub const MAX_SEND_DELAY_MS: u16 = 10_000;
