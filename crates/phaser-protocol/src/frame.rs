//! 帧封装与校验
//!
//! 线上格式（小端）：
//!
//! ```text
//! 0..2   签名      b"PH"
//! 2      类型 ID   'P' | 'A' | 'C' | 'G' | 'T' | 'X'
//! 3..5   校验和    Fletcher-16，覆盖 [0..3] 与载荷
//! 5..    载荷      按类型固定长度；文本为 1..=63 字节 ASCII
//! ```

use crate::{HEADER_LEN, MAX_PACKET_LEN, MAX_PAYLOAD_LEN, MessageType, ProtocolError, SIGNATURE};
use bytes::{BufMut, Bytes, BytesMut};

/// 已校验（或刚构建）的数据包
///
/// # 设计特性
///
/// - **Copy trait**：固定大小数组存储载荷，无堆分配
/// - **不变量**：`Packet` 只能通过 [`Packet::build`] 或 [`Packet::verify`] 得到，
///   因此其校验和总是与签名、类型、载荷一致
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    msg_type: MessageType,
    checksum: u16,
    payload: [u8; MAX_PAYLOAD_LEN],
    len: u8,
}

impl Packet {
    /// 构建数据包：写入签名并计算校验和
    pub fn build(msg_type: MessageType, payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::PayloadTooLong {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut fixed = [0u8; MAX_PAYLOAD_LEN];
        fixed[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            msg_type,
            checksum: checksum(msg_type.id(), payload),
            payload: fixed,
            len: payload.len() as u8,
        })
    }

    /// 由已知长度有界的类型化载荷构建（内部使用）
    ///
    /// 所有类型化消息的载荷都远小于 `MAX_PAYLOAD_LEN`。
    pub(crate) fn from_payload(msg_type: MessageType, payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD_LEN);
        let len = payload.len().min(MAX_PAYLOAD_LEN);
        let payload = &payload[..len];

        let mut fixed = [0u8; MAX_PAYLOAD_LEN];
        fixed[..len].copy_from_slice(payload);

        Self {
            msg_type,
            checksum: checksum(msg_type.id(), payload),
            payload: fixed,
            len: len as u8,
        }
    }

    /// 校验收到的原始字节
    ///
    /// 长度不足、签名不符、类型未知或校验和不符时返回错误，
    /// 调用方应直接丢弃该包。
    pub fn verify(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_LEN {
            return Err(ProtocolError::TooShort { len: bytes.len() });
        }
        if bytes.len() > MAX_PACKET_LEN {
            return Err(ProtocolError::TooLong { len: bytes.len() });
        }

        let found = [bytes[0], bytes[1]];
        if found != SIGNATURE {
            return Err(ProtocolError::BadSignature { found });
        }

        let msg_type =
            MessageType::try_from(bytes[2]).map_err(|_| ProtocolError::UnknownType { id: bytes[2] })?;

        let stored = u16::from_le_bytes([bytes[3], bytes[4]]);
        let payload = &bytes[HEADER_LEN..];
        let computed = checksum(bytes[2], payload);
        if stored != computed {
            return Err(ProtocolError::ChecksumMismatch {
                expected: computed,
                actual: stored,
            });
        }

        let mut fixed = [0u8; MAX_PAYLOAD_LEN];
        fixed[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            msg_type,
            checksum: stored,
            payload: fixed,
            len: payload.len() as u8,
        })
    }

    /// 消息类型
    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    /// 校验和
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// 获取载荷切片（只包含有效数据）
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.len as usize]
    }

    /// 线上总长度
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.len as usize
    }

    /// 序列化为线上字节
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_slice(&SIGNATURE);
        buf.put_u8(self.msg_type.id());
        buf.put_u16_le(self.checksum);
        buf.put_slice(self.payload());
        buf.freeze()
    }
}

/// Fletcher-16 校验和，覆盖签名、类型 ID 与载荷
///
/// 单个比特翻转会使 `sum1` 改变 ±2^k (k < 8)，模 255 不为零，
/// 因此任意单比特错误都能被检测出来。
pub fn checksum(type_id: u8, payload: &[u8]) -> u16 {
    let mut sum1: u16 = 0;
    let mut sum2: u16 = 0;
    for &byte in SIGNATURE.iter().chain(std::iter::once(&type_id)).chain(payload) {
        sum1 = (sum1 + byte as u16) % 255;
        sum2 = (sum2 + sum1) % 255;
    }
    (sum2 << 8) | sum1
}
