//! RX 线程
//!
//! 接收线程扮演射频中断的角色：循环接收帧并交给 [`Dispatcher`]。
//! 主循环与接收线程之间只通过处理器内部的共享状态通信。
//!
//! 处理器忙时到达的帧不会在处理结束后补交，而是按到达时刻被分发器丢弃。

use crate::dispatch::{Dispatcher, MessageHandler};
use crate::error::DriverError;
use phaser_radio::{RadioError, RxAdapter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{error, info, trace};

/// 接收循环
///
/// # 参数
/// - `rx`: 射频接收半部（应已设置接收超时，否则无法及时响应退出）
/// - `dispatcher`: 分发器
/// - `is_running`: 运行标志，置为 `false` 后循环在下一次超时退出
pub fn rx_loop<H: MessageHandler>(
    mut rx: impl RxAdapter,
    dispatcher: Arc<Dispatcher<H>>,
    is_running: Arc<AtomicBool>,
) {
    let metrics = dispatcher.metrics().clone();

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        let frame = match rx.receive() {
            Ok(frame) => {
                metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
                frame
            },
            Err(RadioError::Timeout) => {
                metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Err(e) => {
                error!("RX thread: radio receive error: {}", e);
                metrics.rx_errors.fetch_add(1, Ordering::Relaxed);

                if e.is_fatal() {
                    error!("RX thread: Fatal error detected, setting is_running = false");
                    is_running.store(false, Ordering::Release);
                    break;
                }
                continue;
            },
        };

        dispatcher.on_frame(&frame);
    }
}

/// RX 线程句柄
///
/// drop 时通知线程退出并等待（最多 2 秒）。
pub struct RxThread {
    handle: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
}

impl RxThread {
    /// 启动接收线程
    pub fn spawn<R, H>(name: &str, rx: R, dispatcher: Arc<Dispatcher<H>>) -> Result<Self, DriverError>
    where
        R: RxAdapter + Send + 'static,
        H: MessageHandler + 'static,
    {
        let is_running = Arc::new(AtomicBool::new(true));
        let is_running_clone = is_running.clone();

        let handle = std::thread::Builder::new()
            .name(format!("{}-rx", name))
            .spawn(move || rx_loop(rx, dispatcher, is_running_clone))
            .map_err(|e| DriverError::RxThread(e.to_string()))?;

        info!("RX thread '{}' started", name);
        Ok(Self {
            handle: Some(handle),
            is_running,
        })
    }

    /// 线程是否仍在运行
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// 通知退出并等待线程结束
    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            let join_timeout = Duration::from_secs(2);
            let start = Instant::now();
            while start.elapsed() < join_timeout && !handle.is_finished() {
                std::thread::sleep(Duration::from_millis(1));
            }
            if !handle.is_finished() {
                error!("RX thread failed to shut down within {:?}", join_timeout);
                return;
            }
            if handle.join().is_err() {
                error!("RX thread panicked");
            }
        }
    }
}

impl Drop for RxThread {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::LinkMetrics;
    use phaser_protocol::{ControlAction, ControlMessage, TestPing};
    use phaser_radio::{MockAir, RadioAdapter, SplittableRadio};

    #[derive(Default)]
    struct Counter {
        pings: usize,
        controls: usize,
    }

    /// 每条测试消息处理 30ms
    #[derive(Default)]
    struct Slow {
        pings: usize,
    }

    impl MessageHandler for Slow {
        fn on_test(&mut self, _ping: &TestPing, _rssi: i8, _lqi: i8) {
            self.pings += 1;
            std::thread::sleep(Duration::from_millis(30));
        }
    }

    impl MessageHandler for Counter {
        fn on_test(&mut self, _ping: &TestPing, _rssi: i8, _lqi: i8) {
            self.pings += 1;
        }

        fn on_control(&mut self, _msg: &ControlMessage) {
            self.controls += 1;
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let start = Instant::now();
        while !cond() {
            assert!(start.elapsed() < Duration::from_secs(2), "condition not reached");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_rx_thread_dispatches_until_stopped() {
        let air = MockAir::new();
        let mut sender = air.endpoint("sender");
        let mut node = air.endpoint("node");
        node.set_receive_timeout(Duration::from_millis(2));
        let (rx, _tx) = node.split().unwrap();

        let dispatcher = Arc::new(Dispatcher::new(Counter::default(), Arc::new(LinkMetrics::new())));
        let mut thread = RxThread::spawn("node", rx, dispatcher.clone()).unwrap();
        assert!(thread.is_alive());

        let ping = phaser_protocol::Message::Test(TestPing::default()).to_packet();
        let control = ControlMessage::new(ControlAction::Start).to_packet();
        let frames = [
            ping.to_bytes().to_vec(),
            ping.to_bytes().to_vec(),
            control.to_bytes().to_vec(),
            b"garbage".to_vec(),
        ];
        // 留出处理时间，避免后一帧在处理中到达
        for frame in &frames {
            sender.send(frame).unwrap();
            std::thread::sleep(Duration::from_millis(5));
        }

        wait_until(|| {
            let snapshot = dispatcher.metrics().snapshot();
            snapshot.rx_dispatched + snapshot.rx_invalid == 4
        });
        dispatcher.with_handler(|h| {
            assert_eq!(h.pings, 2);
            assert_eq!(h.controls, 1);
        });
        assert_eq!(dispatcher.metrics().snapshot().rx_invalid, 1);

        thread.stop();
        assert!(!thread.is_alive());
    }

    #[test]
    fn test_frames_arriving_while_busy_are_dropped_not_queued() {
        let air = MockAir::new();
        let mut node = air.endpoint("node");
        node.set_receive_timeout(Duration::from_millis(2));
        let (rx, _tx) = node.split().unwrap();

        let dispatcher = Arc::new(Dispatcher::new(Slow::default(), Arc::new(LinkMetrics::new())));
        let _thread = RxThread::spawn("node", rx, dispatcher.clone()).unwrap();

        let ping = phaser_protocol::Message::Test(TestPing::default())
            .to_packet()
            .to_bytes();
        for _ in 0..10 {
            air.inject(&ping);
        }

        wait_until(|| {
            let snapshot = dispatcher.metrics().snapshot();
            snapshot.rx_dispatched + snapshot.rx_dropped_busy == 10
        });
        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.rx_frames_total, 10);
        assert_eq!(snapshot.rx_dispatched, 1);
        assert_eq!(snapshot.rx_dropped_busy, 9);

        // 处理结束后到达的帧正常处理
        std::thread::sleep(Duration::from_millis(10));
        air.inject(&ping);
        wait_until(|| dispatcher.metrics().snapshot().rx_dispatched == 2);
        dispatcher.with_handler(|h| assert_eq!(h.pings, 2));
        assert_eq!(dispatcher.metrics().snapshot().rx_dropped_busy, 9);
    }
}
