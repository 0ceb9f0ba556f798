//! 进程内仿真测试台
//!
//! 在一个 [`MockAir`] 上搭起完整的测试台：
//! - 发射端：扫描引擎 + mock 天线，在独立线程上运行
//! - 步进节点（可选）：mock 步进电机，在独立线程上运行
//! - 接收端：RX 线程负责聚合，主循环（[`SimRig::poll_monitor`]）由调用方驱动
//! - 控制台：向发射端发送 STOP/STATUS/配置等命令
//! - 抓包（可选）：记录空中所有原始帧
//!
//! # Example
//!
//! ```no_run
//! use phaser_sdk::sim::SimRigBuilder;
//! use phaser_sdk::{PlatformId, SystemClock};
//! use std::time::Duration;
//!
//! let mut rig = SimRigBuilder::new(PlatformId::Phaser)
//!     .pointing(true)
//!     .build::<SystemClock>()
//!     .unwrap();
//! let log = rig.run_sweeps(Duration::from_secs(600));
//! for report in &log.reports {
//!     println!("{}", report);
//! }
//! ```

use crate::antenna::mock::{MockButton, MockStepperPins, antenna_for};
use crate::antenna::{AntennaDriver, StepperConfig, StepperMotor};
use crate::driver::{
    Clock, Dispatcher, DriverError, LinkConfig, LinkMetrics, MessageLink, MetricsSnapshot, RxThread,
};
use crate::node::{
    EngineConfig, EngineSignals, MonitorEvent, MonitorHandler, MonitorNode, MonitorSignals,
    NodeError, PointingNode, PointingSignals, SweepEngine, TransmitterHandler,
};
use crate::protocol::{ControlAction, Message, PlatformId, TestConfig};
use crate::radio::{LinkQuality, MockAir, MockRadioRx, MockRadioTx, RadioError, RxAdapter, SplittableRadio};
use crate::tools::{CaptureLog, CaptureRecord, ExperimentReport};
use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// 端点名称
pub const TRANSMITTER: &str = "transmitter";
pub const MONITOR: &str = "monitor";
pub const STEPPER: &str = "stepper";
pub const CONSOLE: &str = "console";
pub const SNIFFER: &str = "sniffer";

/// 仿真错误
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Radio error: {0}")]
    Radio(#[from] RadioError),
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("Node error: {0}")]
    Node(#[from] NodeError),
    #[error("Failed to spawn {name} thread: {reason}")]
    Thread { name: &'static str, reason: String },
}

type EngineOf<C> = SweepEngine<MockRadioTx, C, Box<dyn AntennaDriver>>;

/// 仿真测试台构建器
///
/// # Example
///
/// ```no_run
/// use phaser_sdk::sim::SimRigBuilder;
/// use phaser_sdk::radio::LinkQuality;
/// use phaser_sdk::{ManualClock, PlatformId};
///
/// let rig = SimRigBuilder::new(PlatformId::Santa)
///     .monitor_link(LinkQuality { rssi: -55, lqi: 100, jitter: 3 })
///     .loss_rate(0.01)
///     .capture(64)
///     .build::<ManualClock>()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SimRigBuilder {
    platform: PlatformId,
    test_sets: Option<Vec<TestConfig>>,
    link_config: LinkConfig,
    engine_config: EngineConfig,
    monitor_link: LinkQuality,
    loss_rate: f64,
    pointing: bool,
    stepper_config: StepperConfig,
    zero_at: i32,
    capture: Option<usize>,
}

impl SimRigBuilder {
    pub fn new(platform: PlatformId) -> Self {
        Self {
            platform,
            test_sets: None,
            link_config: LinkConfig::default(),
            engine_config: EngineConfig::default(),
            monitor_link: LinkQuality::default(),
            loss_rate: 0.0,
            pointing: false,
            stepper_config: StepperConfig::default(),
            zero_at: 0,
            capture: None,
        }
    }

    /// 替换平台内置测试集
    pub fn test_sets(mut self, sets: Vec<TestConfig>) -> Self {
        self.test_sets = Some(sets);
        self
    }

    /// 所有节点共用的链路配置
    pub fn link_config(mut self, config: LinkConfig) -> Self {
        self.link_config = config;
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// 接收端看到的链路质量
    pub fn monitor_link(mut self, quality: LinkQuality) -> Self {
        self.monitor_link = quality;
        self
    }

    pub fn loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate;
        self
    }

    /// 是否启用步进节点
    pub fn pointing(mut self, enabled: bool) -> Self {
        self.pointing = enabled;
        self
    }

    pub fn stepper_config(mut self, config: StepperConfig) -> Self {
        self.stepper_config = config;
        self
    }

    /// 步进电机零点传感器位置
    pub fn zero_at(mut self, position: i32) -> Self {
        self.zero_at = position;
        self
    }

    /// 启用抓包，保留最近 `capacity` 帧
    pub fn capture(mut self, capacity: usize) -> Self {
        self.capture = Some(capacity);
        self
    }

    /// 构建并启动测试台
    ///
    /// 每个节点拥有独立的 `C::default()` 时钟。
    pub fn build<C>(self) -> Result<SimRig<C>, SimError>
    where
        C: Clock + Clone + Default + 'static,
    {
        let air = MockAir::new();
        air.set_loss_rate(self.loss_rate);

        // 抓包与接收端先接入介质，保证不漏掉发射端的第一帧
        let capture = match self.capture {
            Some(capacity) => Some(Sniffer::spawn(&air, capacity)?),
            None => None,
        };

        // ==================== 接收端 ====================
        let (monitor_rx, monitor_tx) = air.endpoint_with_link(MONITOR, self.monitor_link).split()?;
        let monitor_metrics = Arc::new(LinkMetrics::new());
        let monitor = MonitorNode::new(
            MessageLink::new(
                monitor_tx,
                C::default(),
                self.link_config.clone(),
                monitor_metrics.clone(),
            ),
            Arc::new(MonitorSignals::new()),
        );
        let (events_tx, events) = unbounded();
        let monitor_dispatcher = Arc::new(Dispatcher::new(monitor.handler(events_tx), monitor_metrics));
        let monitor_rx_thread = RxThread::spawn(MONITOR, monitor_rx, monitor_dispatcher.clone())?;

        // ==================== 步进节点 ====================
        let (stepper_pins, pointing) = if self.pointing {
            let pins = MockStepperPins::new(self.zero_at);
            let thread = spawn_pointing::<C>(&air, pins.clone(), &self)?;
            (Some(pins), Some(thread))
        } else {
            (None, None)
        };

        // ==================== 控制台 ====================
        let (_console_rx, console_tx) = air.endpoint(CONSOLE).split()?;
        let console = MessageLink::new(
            console_tx,
            C::default(),
            self.link_config.clone(),
            Arc::new(LinkMetrics::new()),
        );

        // ==================== 发射端 ====================
        let (tx_rx, tx_tx) = air.endpoint(TRANSMITTER).split()?;
        let clock = C::default();
        let transmitter_metrics = Arc::new(LinkMetrics::new());
        let signals = Arc::new(EngineSignals::new());
        let dispatcher = Arc::new(Dispatcher::new(
            TransmitterHandler::new(signals.clone()),
            transmitter_metrics.clone(),
        ));
        let transmitter_rx_thread = RxThread::spawn(TRANSMITTER, tx_rx, dispatcher)?;

        let link = MessageLink::new(tx_tx, clock.clone(), self.link_config.clone(), transmitter_metrics.clone());
        let (antenna, button) = antenna_for(self.platform, clock);
        let test_sets = self.test_sets.unwrap_or_else(|| antenna.test_sets());
        let engine: EngineOf<C> = SweepEngine::with_test_sets(
            link,
            antenna,
            signals.clone(),
            self.engine_config,
            test_sets.clone(),
        )?;
        let engine_thread = NodeThread::spawn(TRANSMITTER, move |exit| {
            let mut engine = engine;
            engine.run_until(&exit);
        })?;

        info!("Sim rig up: {} with {} test set(s)", self.platform, test_sets.len());
        Ok(SimRig {
            air,
            platform: self.platform,
            test_sets,
            signals,
            button,
            stepper_pins,
            monitor,
            monitor_dispatcher,
            events,
            console,
            transmitter_metrics,
            capture,
            engine_thread: Some(engine_thread),
            pointing,
            _rx_threads: vec![transmitter_rx_thread, monitor_rx_thread],
        })
    }
}

fn spawn_pointing<C>(air: &MockAir, pins: MockStepperPins, builder: &SimRigBuilder) -> Result<NodeThread, SimError>
where
    C: Clock + Clone + Default + 'static,
{
    let (rx, tx) = air.endpoint(STEPPER).split()?;
    let clock = C::default();
    let metrics = Arc::new(LinkMetrics::new());
    let link = MessageLink::new(tx, clock.clone(), builder.link_config.clone(), metrics.clone());
    let mut stepper = StepperMotor::new(pins, clock, builder.stepper_config.clone());
    stepper.init();

    let mut node = PointingNode::new(link, stepper, Arc::new(PointingSignals::new()));
    let dispatcher = Arc::new(Dispatcher::new(node.handler(), metrics));
    let rx_thread = RxThread::spawn(STEPPER, rx, dispatcher)?;

    NodeThread::spawn(STEPPER, move |exit| {
        // RX 线程随节点线程一起退出
        let _rx_thread = rx_thread;
        node.calibrate();
        node.run_until(&exit);
    })
}

/// 运行中的仿真测试台
///
/// drop 时停止所有线程。
pub struct SimRig<C: Clock> {
    air: MockAir,
    platform: PlatformId,
    test_sets: Vec<TestConfig>,
    signals: Arc<EngineSignals>,
    button: MockButton,
    stepper_pins: Option<MockStepperPins>,
    monitor: MonitorNode<MockRadioTx, C>,
    monitor_dispatcher: Arc<Dispatcher<MonitorHandler>>,
    events: Receiver<MonitorEvent>,
    console: MessageLink<MockRadioTx, C>,
    transmitter_metrics: Arc<LinkMetrics>,
    capture: Option<Sniffer>,
    engine_thread: Option<NodeThread>,
    pointing: Option<NodeThread>,
    _rx_threads: Vec<RxThread>,
}

impl<C: Clock> SimRig<C> {
    pub fn air(&self) -> &MockAir {
        &self.air
    }

    pub fn platform(&self) -> PlatformId {
        self.platform
    }

    /// 发射端启动时的测试集
    pub fn test_sets(&self) -> &[TestConfig] {
        &self.test_sets
    }

    /// 接收端事件流
    pub fn events(&self) -> &Receiver<MonitorEvent> {
        &self.events
    }

    /// 发射端共享信号（相当于直接在发射端本地操作）
    pub fn engine_signals(&self) -> &Arc<EngineSignals> {
        &self.signals
    }

    /// 发射端按键
    pub fn button(&self) -> &MockButton {
        &self.button
    }

    pub fn stepper_pins(&self) -> Option<&MockStepperPins> {
        self.stepper_pins.as_ref()
    }

    pub fn transmitter_metrics(&self) -> MetricsSnapshot {
        self.transmitter_metrics.snapshot()
    }

    pub fn monitor_metrics(&self) -> MetricsSnapshot {
        self.monitor_dispatcher.metrics().snapshot()
    }

    /// 接收端请求发射端重启
    pub fn request_restart(&mut self) {
        self.monitor.request_restart();
    }

    /// 接收端主循环的一次轮询
    pub fn poll_monitor(&mut self) -> bool {
        self.monitor.poll()
    }

    /// 立即输出接收端当前扫描点
    pub fn flush_monitor(&self) {
        self.monitor_dispatcher.with_handler(|handler| handler.flush());
    }

    /// 从控制台发送一条命令
    pub fn command(&mut self, message: impl Into<Message>) -> Result<(), SimError> {
        self.console.send(message)?;
        Ok(())
    }

    /// 抓包快照（未启用时为空）
    pub fn captured(&self) -> Vec<CaptureRecord> {
        self.capture
            .as_ref()
            .map(|sniffer| sniffer.log.lock().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 收集接收端事件，直到每个测试集都收到 DONE 或超时
    pub fn run_sweeps(&mut self, timeout: Duration) -> SweepLog {
        let expected = self.test_sets.len();
        self.collect(timeout, |log| log.done >= expected)
    }

    /// 收集接收端事件，直到 `until` 满足或超时
    pub fn collect(&mut self, timeout: Duration, mut until: impl FnMut(&SweepLog) -> bool) -> SweepLog {
        let deadline = Instant::now() + timeout;
        let mut log = SweepLog::default();

        while !until(&log) {
            let now = Instant::now();
            if now >= deadline {
                warn!("Sim: timed out after {:?}", timeout);
                log.timed_out = true;
                break;
            }
            match self.events.recv_timeout((deadline - now).min(Duration::from_millis(10))) {
                Ok(event) => log.push(event),
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.poll_monitor();
        }
        log
    }

    /// 停止所有节点线程
    pub fn shutdown(&mut self) {
        if let Some(mut thread) = self.engine_thread.take() {
            thread.stop();
        }
        if let Some(mut thread) = self.pointing.take() {
            thread.stop();
        }
        self.flush_monitor();
        debug!("Sim rig stopped");
    }
}

impl<C: Clock> Drop for SimRig<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 一次收集得到的接收端事件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepLog {
    pub reports: Vec<ExperimentReport>,
    pub configs: Vec<TestConfig>,
    pub texts: Vec<String>,
    pub controls: Vec<ControlAction>,
    /// 完成的测试集数（可靠发送的重复 DONE 只计一次）
    pub done: usize,
    pub timed_out: bool,
}

impl SweepLog {
    pub fn push(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Report(report) => self.reports.push(report),
            MonitorEvent::Config(config) => self.configs.push(config),
            MonitorEvent::Text(text) => self.texts.push(text),
            MonitorEvent::Control(action) => {
                if action == ControlAction::Done && self.controls.last() != Some(&ControlAction::Done) {
                    self.done += 1;
                }
                self.controls.push(action);
            },
        }
    }
}

/// 节点线程
///
/// drop 时通知线程退出并等待（最多 5 秒）。
struct NodeThread {
    name: &'static str,
    handle: Option<JoinHandle<()>>,
    should_exit: Arc<AtomicBool>,
}

impl NodeThread {
    fn spawn(name: &'static str, body: impl FnOnce(Arc<AtomicBool>) + Send + 'static) -> Result<Self, SimError> {
        let should_exit = Arc::new(AtomicBool::new(false));
        let exit = should_exit.clone();
        let handle = std::thread::Builder::new()
            .name(format!("{}-main", name))
            .spawn(move || body(exit))
            .map_err(|e| SimError::Thread {
                name,
                reason: e.to_string(),
            })?;
        Ok(Self {
            name,
            handle: Some(handle),
            should_exit,
        })
    }

    fn stop(&mut self) {
        self.should_exit.store(true, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            let join_timeout = Duration::from_secs(5);
            let start = Instant::now();
            while start.elapsed() < join_timeout && !handle.is_finished() {
                std::thread::sleep(Duration::from_millis(1));
            }
            if !handle.is_finished() {
                error!("{} thread failed to shut down within {:?}", self.name, join_timeout);
                return;
            }
            if handle.join().is_err() {
                error!("{} thread panicked", self.name);
            }
        }
    }
}

impl Drop for NodeThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 抓包端点：不解析，只记录原始帧
struct Sniffer {
    log: Arc<Mutex<CaptureLog>>,
    _thread: NodeThread,
}

impl Sniffer {
    fn spawn(air: &MockAir, capacity: usize) -> Result<Self, SimError> {
        let (rx, _tx) = air.endpoint(SNIFFER).split()?;
        let log = Arc::new(Mutex::new(CaptureLog::with_capacity(capacity)));
        let sink = log.clone();
        let thread = NodeThread::spawn(SNIFFER, move |exit| sniff(rx, &sink, &exit))?;
        Ok(Self { log, _thread: thread })
    }
}

fn sniff(mut rx: MockRadioRx, log: &Mutex<CaptureLog>, exit: &AtomicBool) {
    let start = Instant::now();
    while !exit.load(Ordering::Acquire) {
        match rx.receive() {
            Ok(frame) => {
                let mut log = log.lock();
                let record = log.record(&frame.data, frame.rssi, frame.lqi, start.elapsed().as_millis() as u64);
                debug!("Captured {}", record);
            },
            Err(RadioError::Timeout) => {},
            Err(e) => {
                error!("Sniffer receive error: {}", e);
                if e.is_fatal() {
                    break;
                }
            },
        }
    }
}
