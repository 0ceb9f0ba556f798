//! 消息发送链路
//!
//! 三种发送方式：
//! - [`MessageLink::send`]：发送一次
//! - [`MessageLink::send_reliable`]：最大功率下重复发送固定次数，不等待应答
//! - [`MessageLink::send_for_ack`]：发送后轮询应答标志，直到置位或超时

use crate::clock::Clock;
use crate::error::DriverError;
use crate::metrics::LinkMetrics;
use phaser_protocol::{Message, Packet};
use phaser_radio::{MAX_TX_POWER, TxAdapter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace, warn};

/// 链路配置
///
/// # Example
///
/// ```
/// use phaser_driver::LinkConfig;
///
/// // 默认：3 次重复发送，间隔 100ms，应答超时 5s
/// let config = LinkConfig::default();
/// assert_eq!(config.reliable_attempts, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// 可靠发送的重复次数
    pub reliable_attempts: u32,
    /// 可靠发送的间隔（ms）
    pub reliable_interval_ms: u64,
    /// 调高发射功率后的等待时间（ms）
    pub reliable_pre_delay_ms: u64,
    /// 可靠发送使用的发射功率
    pub control_tx_power: u8,
    /// 等待应答超时（ms）
    pub ack_timeout_ms: u64,
    /// 应答轮询间隔（ms）
    pub ack_poll_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            reliable_attempts: 3,
            reliable_interval_ms: 100,
            reliable_pre_delay_ms: 20,
            control_tx_power: MAX_TX_POWER,
            ack_timeout_ms: 5000,
            ack_poll_ms: 1,
        }
    }
}

/// 消息发送链路
pub struct MessageLink<T: TxAdapter, C: Clock> {
    tx: T,
    clock: C,
    config: LinkConfig,
    metrics: Arc<LinkMetrics>,
}

impl<T: TxAdapter, C: Clock> MessageLink<T, C> {
    pub fn new(tx: T, clock: C, config: LinkConfig, metrics: Arc<LinkMetrics>) -> Self {
        Self {
            tx,
            clock,
            config,
            metrics,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<LinkMetrics> {
        &self.metrics
    }

    pub fn tx_power(&self) -> u8 {
        self.tx.tx_power()
    }

    /// 设置发射功率
    pub fn set_tx_power(&mut self, level: u8) -> Result<(), DriverError> {
        self.tx.set_tx_power(level)?;
        Ok(())
    }

    /// 发送已构建的数据包（一次）
    pub fn send_packet(&mut self, packet: &Packet) -> Result<(), DriverError> {
        let bytes = packet.to_bytes();
        trace!(
            "TX '{}' {}",
            packet.msg_type().as_char(),
            hex::encode(&bytes)
        );
        match self.tx.send(&bytes) {
            Ok(()) => {
                self.metrics.tx_frames_total.fetch_add(1, Ordering::Relaxed);
                Ok(())
            },
            Err(e) => {
                self.metrics.tx_errors.fetch_add(1, Ordering::Relaxed);
                warn!("TX '{}' failed: {}", packet.msg_type().as_char(), e);
                Err(e.into())
            },
        }
    }

    /// 发送一次
    pub fn send(&mut self, message: impl Into<Message>) -> Result<(), DriverError> {
        let packet = message.into().to_packet();
        self.send_packet(&packet)
    }

    /// 可靠发送（至少一次，不消费应答）
    ///
    /// 发射功率调到 `control_tx_power` 并保持，等待 `reliable_pre_delay_ms`，
    /// 然后以固定间隔发送 `reliable_attempts` 次。
    /// 只要有一次发送成功就返回 `Ok`。
    pub fn send_reliable(&mut self, message: impl Into<Message>) -> Result<(), DriverError> {
        let packet = message.into().to_packet();
        debug!(
            "Reliable send '{}' x{}",
            packet.msg_type().as_char(),
            self.config.reliable_attempts
        );

        self.set_tx_power(self.config.control_tx_power)?;
        self.clock.delay_ms(self.config.reliable_pre_delay_ms);

        let mut last_error = None;
        let mut delivered = false;
        for attempt in 0..self.config.reliable_attempts {
            if attempt > 0 {
                self.clock.delay_ms(self.config.reliable_interval_ms);
            }
            match self.send_packet(&packet) {
                Ok(()) => delivered = true,
                Err(e) => last_error = Some(e),
            }
        }

        match (delivered, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// 发送并等待应答标志
    ///
    /// 发送前清除 `ack`，之后按 `ack_poll_ms` 轮询，直到标志置位（返回 `true`）
    /// 或超过 `timeout_ms`（返回 `false`）。超时只记录日志。
    pub fn send_for_ack(
        &mut self,
        message: impl Into<Message>,
        ack: &AtomicBool,
        timeout_ms: u64,
    ) -> Result<bool, DriverError> {
        ack.store(false, Ordering::Release);
        let packet = message.into().to_packet();
        self.send_packet(&packet)?;

        let start = self.clock.now_ms();
        loop {
            if ack.load(Ordering::Acquire) {
                debug!(
                    "Ack for '{}' after {}ms",
                    packet.msg_type().as_char(),
                    self.clock.now_ms().saturating_sub(start)
                );
                return Ok(true);
            }
            if self.clock.now_ms().saturating_sub(start) >= timeout_ms {
                self.metrics.ack_timeouts.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "No ack for '{}' within {}ms",
                    packet.msg_type().as_char(),
                    timeout_ms
                );
                return Ok(false);
            }
            self.clock.delay_ms(self.config.ack_poll_ms.max(1));
        }
    }

    /// 使用配置中的默认超时发送并等待应答
    pub fn send_for_default_ack(
        &mut self,
        message: impl Into<Message>,
        ack: &AtomicBool,
    ) -> Result<bool, DriverError> {
        let timeout = self.config.ack_timeout_ms;
        self.send_for_ack(message, ack, timeout)
    }
}
