//! 接收端（监测节点）
//!
//! RX 线程上的 [`MonitorHandler`] 把测试消息交给聚合器，扫描点结束时输出报告；
//! 主循环上的 [`MonitorNode`] 负责发送重启请求。
//!
//! 重启请求在发出后保持"待确认"，直到看到发射端的 START：
//! 期间每次观察到角度变化都补发一次（角度变化时发射端最可能在收听）。

use crossbeam_channel::Sender;
use phaser_driver::{Clock, MessageHandler, MessageLink};
use phaser_protocol::{
    AngleMessage, ControlAction, ControlMessage, TestConfig, TestPing, TextMessage,
};
use phaser_radio::TxAdapter;
use phaser_tools::{ExperimentAggregator, ExperimentReport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

/// 监测节点输出事件
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// 一个扫描点的统计结果
    Report(ExperimentReport),
    /// 收到的控制动作
    Control(ControlAction),
    /// 发射端广播的测试配置
    Config(TestConfig),
    /// 发射端广播的文本（平台名等）
    Text(String),
}

/// 重启请求状态
#[derive(Debug, Default)]
pub struct MonitorSignals {
    restart_pending: AtomicBool,
    resend_restart: AtomicBool,
}

impl MonitorSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// 重启请求是否仍未被 START 确认
    pub fn restart_pending(&self) -> bool {
        self.restart_pending.load(Ordering::Acquire)
    }
}

/// 接收端处理器
pub struct MonitorHandler {
    aggregator: ExperimentAggregator,
    signals: Arc<MonitorSignals>,
    events: Sender<MonitorEvent>,
}

impl MonitorHandler {
    pub fn new(signals: Arc<MonitorSignals>, events: Sender<MonitorEvent>) -> Self {
        Self {
            aggregator: ExperimentAggregator::new(),
            signals,
            events,
        }
    }

    pub fn aggregator(&self) -> &ExperimentAggregator {
        &self.aggregator
    }

    /// 立即输出当前扫描点（关闭前调用）
    pub fn flush(&mut self) {
        let report = self.aggregator.flush();
        self.emit_report(report);
    }

    fn emit_report(&self, report: Option<ExperimentReport>) {
        if let Some(report) = report {
            info!("{}", report);
            self.emit(MonitorEvent::Report(report));
        }
    }

    fn emit(&self, event: MonitorEvent) {
        if self.events.send(event).is_err() {
            trace!("Monitor event sink closed");
        }
    }
}

impl MessageHandler for MonitorHandler {
    fn on_test(&mut self, ping: &TestPing, rssi: i8, lqi: i8) {
        let report = self.aggregator.on_test(ping, rssi, lqi);
        self.emit_report(report);
    }

    fn on_angle(&mut self, msg: &AngleMessage) {
        let report = self.aggregator.on_sweep_event();
        self.emit_report(report);
        if msg.is_ack() {
            return;
        }
        if self.signals.restart_pending.swap(false, Ordering::AcqRel) {
            debug!("Angle change observed, resending restart");
            self.signals.resend_restart.store(true, Ordering::Release);
        }
    }

    fn on_control(&mut self, msg: &ControlMessage) {
        let report = self.aggregator.on_sweep_event();
        self.emit_report(report);
        if msg.action == ControlAction::Start {
            self.signals.restart_pending.store(false, Ordering::Release);
        }
        info!("Rx: {}", msg.action);
        self.emit(MonitorEvent::Control(msg.action));
    }

    fn on_config(&mut self, config: &TestConfig) {
        info!("Config received:\n{}", config);
        self.emit(MonitorEvent::Config(*config));
    }

    fn on_text(&mut self, text: &TextMessage) {
        info!("{}", text);
        self.emit(MonitorEvent::Text(text.as_str().to_string()));
    }
}

/// 接收端主循环
pub struct MonitorNode<T: TxAdapter, C: Clock> {
    link: MessageLink<T, C>,
    signals: Arc<MonitorSignals>,
}

impl<T: TxAdapter, C: Clock> MonitorNode<T, C> {
    pub fn new(link: MessageLink<T, C>, signals: Arc<MonitorSignals>) -> Self {
        Self { link, signals }
    }

    pub fn signals(&self) -> &Arc<MonitorSignals> {
        &self.signals
    }

    /// 创建挂在 RX 线程上的处理器
    pub fn handler(&self, events: Sender<MonitorEvent>) -> MonitorHandler {
        MonitorHandler::new(self.signals.clone(), events)
    }

    /// 请求发射端重启（立即发送一次，之后在角度变化时补发）
    pub fn request_restart(&mut self) {
        info!("Requesting transmitter restart");
        self.signals.restart_pending.store(true, Ordering::Release);
        self.send_restart();
    }

    /// 主循环的一次轮询，返回是否补发了重启请求
    pub fn poll(&mut self) -> bool {
        if self.signals.resend_restart.swap(false, Ordering::AcqRel) {
            self.send_restart();
            return true;
        }
        false
    }

    /// 持续轮询，直到 `should_exit` 置位
    pub fn run_until(&mut self, should_exit: &AtomicBool, poll_ms: u64) {
        while !should_exit.load(Ordering::Acquire) {
            self.poll();
            self.link.clock().delay_ms(poll_ms);
        }
    }

    fn send_restart(&mut self) {
        if let Err(e) = self.link.send(ControlMessage::new(ControlAction::Restart)) {
            warn!("Restart request not sent: {}", e);
        }
    }
}
