//! 接收分发
//!
//! 每个收到的帧依次经过：
//! 1. 处理保护：处理器忙时到达的帧直接丢弃，不排队（计入 `rx_dropped_busy`）
//! 2. 帧校验：签名、类型、校验和（失败计入 `rx_invalid`）
//! 3. 载荷解析：按类型 ID 解码（失败计入 `rx_malformed`）
//! 4. 路由：恰好调用处理器的一个方法

use crate::guard::ProcessingGuard;
use crate::metrics::LinkMetrics;
use parking_lot::Mutex;
use phaser_protocol::{
    AngleMessage, ControlMessage, Message, MessageType, Packet, ProtocolError, TestConfig,
    TestPing, TextMessage,
};
use phaser_radio::RadioFrame;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, trace, warn};

/// 接收消息处理器
///
/// 所有方法都有空的默认实现，节点只需实现关心的消息类型。
/// 处理器运行在 RX 线程上，不应执行耗时操作或发送消息。
pub trait MessageHandler: Send {
    fn on_test(&mut self, _ping: &TestPing, _rssi: i8, _lqi: i8) {}
    fn on_angle(&mut self, _msg: &AngleMessage) {}
    fn on_control(&mut self, _msg: &ControlMessage) {}
    fn on_config(&mut self, _config: &TestConfig) {}
    fn on_text(&mut self, _text: &TextMessage) {}
}

/// 单帧分发结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 已交给处理器
    Delivered(MessageType),
    /// 处理器忙，帧被丢弃
    Busy,
    /// 帧级别校验失败
    Invalid(ProtocolError),
    /// 载荷无法解析（或类型没有载荷定义）
    Malformed(ProtocolError),
}

/// 接收分发器
pub struct Dispatcher<H: MessageHandler> {
    handler: Mutex<H>,
    guard: ProcessingGuard,
    metrics: Arc<LinkMetrics>,
}

impl<H: MessageHandler> Dispatcher<H> {
    pub fn new(handler: H, metrics: Arc<LinkMetrics>) -> Self {
        Self {
            handler: Mutex::new(handler),
            guard: ProcessingGuard::new(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<LinkMetrics> {
        &self.metrics
    }

    /// 在处理器上执行闭包（与分发互斥）
    pub fn with_handler<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(&mut self.handler.lock())
    }

    /// 分发一个射频帧
    ///
    /// 帧的到达时刻早于上一帧处理结束时，视为处理器忙时到达，直接丢弃。
    pub fn on_frame(&self, frame: &RadioFrame) -> DispatchOutcome {
        if self.guard.was_busy_at(frame.received_at) {
            return self.drop_busy(frame.data.len());
        }
        self.on_bytes(&frame.data, frame.rssi, frame.lqi)
    }

    /// 分发原始字节
    pub fn on_bytes(&self, bytes: &[u8], rssi: i8, lqi: i8) -> DispatchOutcome {
        let Some(_token) = self.guard.try_acquire() else {
            return self.drop_busy(bytes.len());
        };

        trace!("RX {} (rssi={}, lqi={})", hex::encode(bytes), rssi, lqi);

        let packet = match Packet::verify(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.metrics.rx_invalid.fetch_add(1, Ordering::Relaxed);
                debug!("RX invalid frame: {}", e);
                return DispatchOutcome::Invalid(e);
            },
        };

        let message = match Message::try_from(&packet) {
            Ok(message) => message,
            Err(e) => {
                self.metrics.rx_malformed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "RX malformed '{}' payload: {}",
                    packet.msg_type().as_char(),
                    e
                );
                return DispatchOutcome::Malformed(e);
            },
        };

        let msg_type = message.message_type();
        {
            let mut handler = self.handler.lock();
            match &message {
                Message::Test(ping) => handler.on_test(ping, rssi, lqi),
                Message::Angle(msg) => handler.on_angle(msg),
                Message::Control(msg) => handler.on_control(msg),
                Message::Config(config) => handler.on_config(config),
                Message::Text(text) => handler.on_text(text),
            }
        }
        self.metrics.rx_dispatched.fetch_add(1, Ordering::Relaxed);
        DispatchOutcome::Delivered(msg_type)
    }

    fn drop_busy(&self, len: usize) -> DispatchOutcome {
        self.metrics.rx_dropped_busy.fetch_add(1, Ordering::Relaxed);
        debug!("RX busy, dropping frame ({} bytes)", len);
        DispatchOutcome::Busy
    }
}
