//! Mock 射频介质
//!
//! 进程内的广播"空中接口"：任意端点发送的帧会投递给所有其他端点，
//! 用于在没有硬件的情况下跑通发射端、接收端与步进节点的完整交互。
//!
//! 通道只负责传播：每一帧在投递时打上到达时刻，
//! 接收端忙时到达的帧由分发器按到达时刻丢弃，而不是等处理器空闲后补交。
//!
//! 支持的故障注入：
//! - 丢包率（随机）
//! - 损坏后续 N 帧（翻转最后一个字节的最低位）
//! - 每个接收端独立的 RSSI/LQI 与抖动

use crate::{
    MAX_TX_POWER, RadioAdapter, RadioError, RadioFrame, RxAdapter, SplittableRadio, TxAdapter,
    check_frame_len, check_tx_power,
};
use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::trace;

/// 默认接收超时
const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(10);

/// 接收端看到的链路质量
///
/// 实际 RSSI = `rssi - (31 - 发射功率)`，再叠加 `±jitter` 的均匀抖动。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkQuality {
    pub rssi: i8,
    pub lqi: i8,
    pub jitter: u8,
}

impl Default for LinkQuality {
    fn default() -> Self {
        Self {
            rssi: -40,
            lqi: 107,
            jitter: 0,
        }
    }
}

impl LinkQuality {
    fn sample(&self, tx_power: u8) -> (i8, i8) {
        let attenuation = i16::from(MAX_TX_POWER.saturating_sub(tx_power));
        let mut rssi = i16::from(self.rssi) - attenuation;
        let mut lqi = i16::from(self.lqi);
        if self.jitter > 0 {
            let j = i16::from(self.jitter);
            let mut rng = rand::thread_rng();
            rssi += rng.gen_range(-j..=j);
            lqi += rng.gen_range(-j..=j);
        }
        (clamp_i8(rssi), clamp_i8(lqi))
    }
}

fn clamp_i8(value: i16) -> i8 {
    value.clamp(i16::from(i8::MIN), i16::from(i8::MAX)) as i8
}

/// 一次发送记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    /// 发送端名称
    pub from: String,
    pub data: Bytes,
    pub tx_power: u8,
}

struct Station {
    id: usize,
    name: String,
    tx: Sender<RadioFrame>,
    quality: LinkQuality,
}

#[derive(Default)]
struct AirInner {
    stations: Mutex<Vec<Station>>,
    history: Mutex<Vec<Transmission>>,
    loss_rate: Mutex<f64>,
    corrupt_remaining: AtomicUsize,
    next_id: AtomicUsize,
}

/// 进程内广播介质
#[derive(Clone, Default)]
pub struct MockAir {
    inner: Arc<AirInner>,
}

impl MockAir {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建一个默认链路质量的端点
    pub fn endpoint(&self, name: impl Into<String>) -> MockRadio {
        self.endpoint_with_link(name, LinkQuality::default())
    }

    /// 创建一个端点，并指定它作为接收端时看到的链路质量
    pub fn endpoint_with_link(&self, name: impl Into<String>, quality: LinkQuality) -> MockRadio {
        let (tx, rx) = unbounded();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let name = name.into();
        self.inner.stations.lock().push(Station {
            id,
            name: name.clone(),
            tx,
            quality,
        });
        MockRadio {
            air: self.clone(),
            id,
            name,
            rx,
            timeout: DEFAULT_RECEIVE_TIMEOUT,
            tx_power: MAX_TX_POWER,
            last_rssi: 0,
            last_lqi: 0,
        }
    }

    /// 修改某个端点的链路质量
    pub fn set_link_quality(&self, name: &str, quality: LinkQuality) {
        for station in self.inner.stations.lock().iter_mut() {
            if station.name == name {
                station.quality = quality;
            }
        }
    }

    /// 设置随机丢包率（0.0 ..= 1.0）
    pub fn set_loss_rate(&self, rate: f64) {
        *self.inner.loss_rate.lock() = rate.clamp(0.0, 1.0);
    }

    /// 损坏接下来的 `count` 次发送
    pub fn corrupt_next(&self, count: usize) {
        self.inner.corrupt_remaining.store(count, Ordering::Relaxed);
    }

    /// 从介质外部注入一帧（以最大功率投递给所有端点）
    pub fn inject(&self, data: &[u8]) {
        self.transmit(usize::MAX, "injector", data, MAX_TX_POWER);
    }

    /// 所有发送记录的快照
    pub fn history(&self) -> Vec<Transmission> {
        self.inner.history.lock().clone()
    }

    /// 某个端点的发送记录
    pub fn history_from(&self, name: &str) -> Vec<Transmission> {
        self.inner
            .history
            .lock()
            .iter()
            .filter(|t| t.from == name)
            .cloned()
            .collect()
    }

    pub fn clear_history(&self) {
        self.inner.history.lock().clear();
    }

    fn transmit(&self, from_id: usize, from: &str, data: &[u8], tx_power: u8) {
        let original = Bytes::copy_from_slice(data);
        self.inner.history.lock().push(Transmission {
            from: from.to_string(),
            data: original.clone(),
            tx_power,
        });

        let corrupt = self
            .inner
            .corrupt_remaining
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        let on_air = if corrupt && !data.is_empty() {
            let mut bytes = data.to_vec();
            let last = bytes.len() - 1;
            bytes[last] ^= 0x01;
            trace!("mock air: corrupting frame from {}", from);
            Bytes::from(bytes)
        } else {
            original
        };

        let loss_rate = *self.inner.loss_rate.lock();
        let mut rng = rand::thread_rng();
        for station in self.inner.stations.lock().iter() {
            if station.id == from_id {
                continue;
            }
            if loss_rate > 0.0 && rng.gen_bool(loss_rate) {
                trace!("mock air: frame from {} lost before {}", from, station.name);
                continue;
            }
            let (rssi, lqi) = station.quality.sample(tx_power);
            if station.tx.send(RadioFrame::new(on_air.clone(), rssi, lqi)).is_err() {
                trace!("mock air: {} receiver dropped", station.name);
            }
        }
    }
}

fn recv_frame(
    rx: &Receiver<RadioFrame>,
    timeout: Duration,
    last_rssi: &mut i8,
    last_lqi: &mut i8,
) -> Result<RadioFrame, RadioError> {
    let frame = if timeout.is_zero() {
        rx.try_recv().map_err(|e| {
            if e.is_disconnected() {
                RadioError::Disconnected
            } else {
                RadioError::Timeout
            }
        })?
    } else {
        rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => RadioError::Timeout,
            RecvTimeoutError::Disconnected => RadioError::Disconnected,
        })?
    };
    *last_rssi = frame.rssi;
    *last_lqi = frame.lqi;
    Ok(frame)
}

/// Mock 射频端点
pub struct MockRadio {
    air: MockAir,
    id: usize,
    name: String,
    rx: Receiver<RadioFrame>,
    timeout: Duration,
    tx_power: u8,
    last_rssi: i8,
    last_lqi: i8,
}

impl MockRadio {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tx_power(&self) -> u8 {
        self.tx_power
    }
}

impl RadioAdapter for MockRadio {
    fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        check_frame_len(data.len())?;
        self.air.transmit(self.id, &self.name, data, self.tx_power);
        Ok(())
    }

    fn receive(&mut self) -> Result<RadioFrame, RadioError> {
        recv_frame(&self.rx, self.timeout, &mut self.last_rssi, &mut self.last_lqi)
    }

    fn set_tx_power(&mut self, level: u8) -> Result<(), RadioError> {
        check_tx_power(level)?;
        self.tx_power = level;
        Ok(())
    }

    fn last_rssi(&self) -> i8 {
        self.last_rssi
    }

    fn last_lqi(&self) -> i8 {
        self.last_lqi
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

impl SplittableRadio for MockRadio {
    type RxAdapter = MockRadioRx;
    type TxAdapter = MockRadioTx;

    fn split(self) -> Result<(MockRadioRx, MockRadioTx), RadioError> {
        let rx = MockRadioRx {
            rx: self.rx,
            timeout: self.timeout,
            last_rssi: self.last_rssi,
            last_lqi: self.last_lqi,
        };
        let tx = MockRadioTx {
            air: self.air,
            id: self.id,
            name: self.name,
            tx_power: self.tx_power,
        };
        Ok((rx, tx))
    }
}

/// Mock 端点的接收半部
pub struct MockRadioRx {
    rx: Receiver<RadioFrame>,
    timeout: Duration,
    last_rssi: i8,
    last_lqi: i8,
}

impl RxAdapter for MockRadioRx {
    fn receive(&mut self) -> Result<RadioFrame, RadioError> {
        recv_frame(&self.rx, self.timeout, &mut self.last_rssi, &mut self.last_lqi)
    }

    fn last_rssi(&self) -> i8 {
        self.last_rssi
    }

    fn last_lqi(&self) -> i8 {
        self.last_lqi
    }
}

/// Mock 端点的发送半部
pub struct MockRadioTx {
    air: MockAir,
    id: usize,
    name: String,
    tx_power: u8,
}

impl TxAdapter for MockRadioTx {
    fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        check_frame_len(data.len())?;
        self.air.transmit(self.id, &self.name, data, self.tx_power);
        Ok(())
    }

    fn set_tx_power(&mut self, level: u8) -> Result<(), RadioError> {
        check_tx_power(level)?;
        self.tx_power = level;
        Ok(())
    }

    fn tx_power(&self) -> u8 {
        self.tx_power
    }
}
