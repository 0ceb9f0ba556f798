//! 原始帧抓包
//!
//! 监听模式下不解析载荷，只记录每一帧的序号、长度、RSSI、时间与十六进制内容。
//! 记录保存在固定容量的环形缓冲中，写满后覆盖最旧的记录。

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// 默认缓冲容量
pub const DEFAULT_CAPACITY: usize = 32;

/// 单帧抓包记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// 接收序号（从 1 开始）
    pub index: u64,
    pub timestamp_ms: u64,
    pub rssi: i8,
    pub lqi: i8,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl fmt::Display for CaptureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.index,
            self.data.len(),
            self.rssi,
            self.timestamp_ms,
            hex::encode(&self.data)
        )
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

/// 抓包环形缓冲
#[derive(Debug, Clone)]
pub struct CaptureLog {
    records: VecDeque<CaptureRecord>,
    capacity: usize,
    next_index: u64,
}

impl Default for CaptureLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl CaptureLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            next_index: 1,
        }
    }

    /// 记录一帧，返回新记录
    pub fn record(&mut self, data: &[u8], rssi: i8, lqi: i8, timestamp_ms: u64) -> &CaptureRecord {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        let record = CaptureRecord {
            index: self.next_index,
            timestamp_ms,
            rssi,
            lqi,
            data: data.to_vec(),
        };
        self.next_index += 1;
        self.records.push_back(record);
        // 刚刚 push_back，必然非空
        &self.records[self.records.len() - 1]
    }

    /// 已记录的总帧数（含被覆盖的）
    pub fn total(&self) -> u64 {
        self.next_index - 1
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CaptureRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_format() {
        let mut log = CaptureLog::default();
        let line = log.record(&[0x50, 0x48, 0x43], -45, 100, 1234).to_string();
        assert_eq!(line, "1\t3\t-45\t1234\t504843");
    }

    #[test]
    fn test_ring_buffer_overwrites_oldest() {
        let mut log = CaptureLog::with_capacity(2);
        log.record(&[1], 0, 0, 0);
        log.record(&[2], 0, 0, 1);
        log.record(&[3], 0, 0, 2);

        assert_eq!(log.len(), 2);
        assert_eq!(log.total(), 3);
        let indices: Vec<_> = log.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![2, 3]);
    }

    #[test]
    fn test_json_uses_hex() {
        let mut log = CaptureLog::default();
        let record = log.record(&[0xAB, 0xCD], -1, 2, 3).clone();
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"data\":\"abcd\""));
        let back: CaptureRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
