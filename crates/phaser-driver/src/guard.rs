//! 单槽处理保护
//!
//! 接收处理器同一时刻只处理一帧。处理中到达的帧不排队，
//! 由调用方直接丢弃并计数。
//!
//! 除了并发调用，保护还记录上一次处理结束的时刻：
//! 接收线程顺序取帧时，到达时刻早于该时刻的帧同样是在处理器忙时到达的。

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// 非阻塞的处理中标志
#[derive(Debug, Default)]
pub struct ProcessingGuard {
    busy: AtomicBool,
    /// 上一次处理结束的时刻
    busy_until: Mutex<Option<Instant>>,
}

impl ProcessingGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试获取处理权
    ///
    /// 已被占用时立即返回 `None`。返回的令牌在 drop 时释放处理权。
    pub fn try_acquire(&self) -> Option<ProcessingToken<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| ProcessingToken { guard: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// `at` 时刻到达的帧是否撞上了处理中的帧
    pub fn was_busy_at(&self, at: Instant) -> bool {
        if self.is_busy() {
            return true;
        }
        matches!(*self.busy_until.lock(), Some(end) if at < end)
    }
}

/// 处理权令牌（RAII）
#[derive(Debug)]
pub struct ProcessingToken<'a> {
    guard: &'a ProcessingGuard,
}

impl Drop for ProcessingToken<'_> {
    fn drop(&mut self) {
        *self.guard.busy_until.lock() = Some(Instant::now());
        self.guard.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let guard = ProcessingGuard::new();
        let token = guard.try_acquire();
        assert!(token.is_some());
        assert!(guard.is_busy());
        assert!(guard.try_acquire().is_none());
        drop(token);
        assert!(!guard.is_busy());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn test_arrival_during_processing_counts_as_busy() {
        let guard = ProcessingGuard::new();
        let before = Instant::now();
        assert!(!guard.was_busy_at(before));

        let token = guard.try_acquire();
        let during = Instant::now();
        assert!(guard.was_busy_at(during));
        drop(token);

        // 处理期间到达、释放后才被取出的帧仍然算忙
        assert!(guard.was_busy_at(during));
        assert!(guard.was_busy_at(before));
        assert!(!guard.was_busy_at(Instant::now()));
    }
}
