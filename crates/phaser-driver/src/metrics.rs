//! 链路指标模块
//!
//! 原子计数器，记录收发链路的健康状态。
//! 所有计数器都可以在任意线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 链路实时指标
///
/// # 使用示例
///
/// ```rust
/// use phaser_driver::LinkMetrics;
/// use std::sync::Arc;
/// use std::sync::atomic::Ordering;
///
/// let metrics = Arc::new(LinkMetrics::default());
/// metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.rx_frames_total, 1);
/// ```
#[derive(Debug, Default)]
pub struct LinkMetrics {
    /// RX 接收的总帧数
    pub rx_frames_total: AtomicU64,

    /// 成功分发到处理器的帧数
    pub rx_dispatched: AtomicU64,

    /// 帧级别校验失败（长度、签名、类型、校验和）
    pub rx_invalid: AtomicU64,

    /// 帧有效但载荷无法解析（长度不符、未知动作、非 ASCII 文本、保留类型）
    pub rx_malformed: AtomicU64,

    /// 处理器忙时到达而被丢弃的帧数
    pub rx_dropped_busy: AtomicU64,

    /// 射频接收错误次数（非超时）
    pub rx_errors: AtomicU64,

    /// RX 超时次数（正常现象，无数据时会超时）
    pub rx_timeouts: AtomicU64,

    /// TX 发送的总帧数
    pub tx_frames_total: AtomicU64,

    /// TX 发送失败次数
    pub tx_errors: AtomicU64,

    /// 等待应答超时次数
    pub ack_timeouts: AtomicU64,
}

impl LinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_frames_total: self.rx_frames_total.load(Ordering::Relaxed),
            rx_dispatched: self.rx_dispatched.load(Ordering::Relaxed),
            rx_invalid: self.rx_invalid.load(Ordering::Relaxed),
            rx_malformed: self.rx_malformed.load(Ordering::Relaxed),
            rx_dropped_busy: self.rx_dropped_busy.load(Ordering::Relaxed),
            rx_errors: self.rx_errors.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            tx_frames_total: self.tx_frames_total.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            ack_timeouts: self.ack_timeouts.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.rx_frames_total.store(0, Ordering::Relaxed);
        self.rx_dispatched.store(0, Ordering::Relaxed);
        self.rx_invalid.store(0, Ordering::Relaxed);
        self.rx_malformed.store(0, Ordering::Relaxed);
        self.rx_dropped_busy.store(0, Ordering::Relaxed);
        self.rx_errors.store(0, Ordering::Relaxed);
        self.rx_timeouts.store(0, Ordering::Relaxed);
        self.tx_frames_total.store(0, Ordering::Relaxed);
        self.tx_errors.store(0, Ordering::Relaxed);
        self.ack_timeouts.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub rx_frames_total: u64,
    pub rx_dispatched: u64,
    pub rx_invalid: u64,
    pub rx_malformed: u64,
    pub rx_dropped_busy: u64,
    pub rx_errors: u64,
    pub rx_timeouts: u64,
    pub tx_frames_total: u64,
    pub tx_errors: u64,
    pub ack_timeouts: u64,
}

impl MetricsSnapshot {
    /// 被拒绝的帧数（校验失败 + 载荷错误 + 忙丢弃）
    pub fn rx_rejected(&self) -> u64 {
        self.rx_invalid + self.rx_malformed + self.rx_dropped_busy
    }

    /// 有效分发率（百分比）
    ///
    /// `rx_frames_total` 为 0 时返回 0.0。
    pub fn dispatch_rate(&self) -> f64 {
        if self.rx_frames_total == 0 {
            return 0.0;
        }
        (self.rx_dispatched as f64 / self.rx_frames_total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = LinkMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert_eq!(snapshot.dispatch_rate(), 0.0);
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = LinkMetrics::new();
        metrics.rx_frames_total.fetch_add(10, Ordering::Relaxed);
        metrics.tx_errors.fetch_add(2, Ordering::Relaxed);
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_snapshot_rates() {
        let metrics = LinkMetrics::new();
        metrics.rx_frames_total.fetch_add(10, Ordering::Relaxed);
        metrics.rx_dispatched.fetch_add(7, Ordering::Relaxed);
        metrics.rx_invalid.fetch_add(1, Ordering::Relaxed);
        metrics.rx_malformed.fetch_add(1, Ordering::Relaxed);
        metrics.rx_dropped_busy.fetch_add(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.rx_rejected(), 3);
        assert!((snapshot.dispatch_rate() - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_concurrent_increment() {
        let metrics = Arc::new(LinkMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        metrics.tx_frames_total.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().tx_frames_total, 4000);
    }
}
