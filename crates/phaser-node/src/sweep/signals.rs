//! 发射端共享信号
//!
//! RX 线程上的 [`TransmitterHandler`] 只通过这里的窄接口写入；
//! 扫描引擎在主循环上读取并清除。

use parking_lot::Mutex;
use phaser_driver::MessageHandler;
use phaser_protocol::{AngleMessage, ControlAction, ControlMessage, TestConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// 主循环与 RX 线程之间的共享状态
#[derive(Debug, Default)]
pub struct EngineSignals {
    restart: AtomicBool,
    stop: AtomicBool,
    idle_reply: AtomicBool,
    status: AtomicBool,
    angle_ack: AtomicBool,
    mailbox: Mutex<Option<TestConfig>>,
}

impl EngineSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求重启当前配置
    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::Release);
    }

    /// 请求停止
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// 请求回报当前配置
    pub fn request_status(&self) {
        self.status.store(true, Ordering::Release);
    }

    /// 投递新配置（单槽，后到的覆盖未处理的）
    pub fn post_config(&self, config: TestConfig) {
        if self.mailbox.lock().replace(config).is_some() {
            debug!("Config mailbox overwritten");
        }
    }

    /// 角度应答标志
    pub fn angle_ack(&self) -> &AtomicBool {
        &self.angle_ack
    }

    pub fn restart_pending(&self) -> bool {
        self.restart.load(Ordering::Acquire)
    }

    pub(crate) fn take_restart(&self) -> bool {
        self.restart.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn take_stop(&self) -> bool {
        self.stop.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn take_idle_reply(&self) -> bool {
        self.idle_reply.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn take_status(&self) -> bool {
        self.status.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn take_config(&self) -> Option<TestConfig> {
        self.mailbox.lock().take()
    }
}

/// 发射端接收处理器
pub struct TransmitterHandler {
    signals: Arc<EngineSignals>,
}

impl TransmitterHandler {
    pub fn new(signals: Arc<EngineSignals>) -> Self {
        Self { signals }
    }
}

impl MessageHandler for TransmitterHandler {
    fn on_angle(&mut self, msg: &AngleMessage) {
        if msg.is_ack() {
            debug!("Angle {} acknowledged", msg.angle);
            self.signals.angle_ack.store(true, Ordering::Release);
        }
    }

    fn on_control(&mut self, msg: &ControlMessage) {
        match msg.action {
            ControlAction::Restart => {
                info!("Rx: RESTART");
                self.signals.idle_reply.store(true, Ordering::Release);
                self.signals.request_restart();
            },
            ControlAction::Stop => {
                info!("Rx: STOP");
                self.signals.request_stop();
            },
            ControlAction::Status => self.signals.request_status(),
            other => debug!("Ignoring control action {}", other),
        }
    }

    fn on_config(&mut self, config: &TestConfig) {
        info!("Config received for {}", config.platform);
        self.signals.post_config(*config);
    }
}
