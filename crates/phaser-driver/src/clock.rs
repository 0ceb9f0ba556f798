//! 时钟抽象
//!
//! 所有延时与超时都经过 [`Clock`]，测试中用 [`ManualClock`] 代替真实时间。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 毫秒级时钟
pub trait Clock: Send + Sync {
    /// 单调时间（ms）
    fn now_ms(&self) -> u64;

    /// 阻塞延时
    fn delay_ms(&self, ms: u64);
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }

    fn delay_ms(&self, ms: u64) {
        (**self).delay_ms(ms)
    }
}

/// 真实时钟
///
/// 使用 `spin_sleep` 获得比 `std::thread::sleep` 更准确的毫秒级延时。
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn delay_ms(&self, ms: u64) {
        if ms > 0 {
            spin_sleep::sleep(Duration::from_millis(ms));
        }
    }
}

/// 手动时钟
///
/// `delay_ms` 直接推进虚拟时间并让出 CPU，不真正等待。
/// 克隆共享同一个时间源。
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn delay_ms(&self, ms: u64) {
        self.advance(ms);
        std::thread::yield_now();
    }
}
