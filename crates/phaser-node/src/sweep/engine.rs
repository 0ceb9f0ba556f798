//! 扫描引擎状态机
//!
//! ```text
//! Idle → Starting → Running ─┬→ Restarting → Starting
//!                            ├→ Stopped（按键后 → Restarting）
//!                            └→ Finished（重启命令或按键 → Restarting）
//! ```
//!
//! 每次 [`SweepEngine::step`] 先处理 RX 线程投递的信号（状态查询、配置、停止），
//! 再执行当前状态的一步。`Running` 的一步发送一个扫描点的全部测试消息。

use super::iterator::{Advance, SweepIterator, SweepPoint};
use super::signals::EngineSignals;
use super::validation::validate;
use crate::error::NodeError;
use phaser_antenna::AntennaDriver;
use phaser_driver::{Clock, MessageLink};
use phaser_protocol::{
    AngleMessage, ControlAction, ControlMessage, Message, TestConfig, TestPing, TextMessage,
};
use phaser_radio::TxAdapter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

/// 引擎状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Starting,
    Running,
    Restarting,
    Stopped,
    Finished,
}

/// 引擎时序参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// 广播配置后、发送 START 前的等待（ms），留给接收端解析配置；
    /// 每次转动天线后也等待同样的时间再发射
    pub settle_ms: u64,
    /// 每条测试消息发送后的固定等待（ms），之后才是 `send_delay`
    pub tx_gap_ms: u64,
    /// 角度重新校准前先转到的角度（`None` 表示直接请求 0）
    pub recalibration_angle: Option<i16>,
    /// 停止/完成状态下每次轮询按键的间隔（ms）
    pub idle_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_ms: 100,
            tx_gap_ms: 1,
            recalibration_angle: Some(-10),
            // 3 次闪烁 + 500ms
            idle_poll_ms: 1100,
        }
    }
}

/// 发射端扫描引擎
pub struct SweepEngine<T: TxAdapter, C: Clock, A: AntennaDriver> {
    link: MessageLink<T, C>,
    antenna: A,
    signals: Arc<EngineSignals>,
    config: EngineConfig,
    test_sets: Vec<TestConfig>,
    set_idx: usize,
    active: TestConfig,
    iterator: SweepIterator,
    exp_idx: u16,
    msg_counter: u16,
    last_angle: Option<u16>,
    state: EngineState,
}

impl<T: TxAdapter, C: Clock, A: AntennaDriver> SweepEngine<T, C, A> {
    /// 使用天线的内置测试集创建引擎
    pub fn new(
        link: MessageLink<T, C>,
        antenna: A,
        signals: Arc<EngineSignals>,
        config: EngineConfig,
    ) -> Result<Self, NodeError> {
        let test_sets = antenna.test_sets();
        Self::with_test_sets(link, antenna, signals, config, test_sets)
    }

    /// 使用指定测试集创建引擎（至少一组）
    pub fn with_test_sets(
        link: MessageLink<T, C>,
        antenna: A,
        signals: Arc<EngineSignals>,
        config: EngineConfig,
        test_sets: Vec<TestConfig>,
    ) -> Result<Self, NodeError> {
        let active = *test_sets.first().ok_or(NodeError::NoTestSets)?;
        let iterator = SweepIterator::start(&active, &antenna);
        Ok(Self {
            link,
            antenna,
            signals,
            config,
            test_sets,
            set_idx: 0,
            active,
            iterator,
            exp_idx: 0,
            msg_counter: 0,
            last_angle: None,
            state: EngineState::Idle,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// 当前生效的测试配置
    pub fn active_config(&self) -> &TestConfig {
        &self.active
    }

    /// 当前测试集序号
    pub fn set_index(&self) -> usize {
        self.set_idx
    }

    /// 下一个要发送的扫描点
    pub fn point(&self) -> &SweepPoint {
        self.iterator.point()
    }

    pub fn exp_idx(&self) -> u16 {
        self.exp_idx
    }

    pub fn signals(&self) -> &Arc<EngineSignals> {
        &self.signals
    }

    pub fn antenna(&self) -> &A {
        &self.antenna
    }

    pub fn link(&self) -> &MessageLink<T, C> {
        &self.link
    }

    /// 执行一步，返回新状态
    pub fn step(&mut self) -> EngineState {
        self.service_signals();

        let next = match self.state {
            EngineState::Idle => {
                info!("{} antenna init", self.antenna.name());
                self.antenna.init();
                EngineState::Starting
            },
            EngineState::Starting => self.start_test(),
            EngineState::Running => self.run_point(),
            EngineState::Restarting => EngineState::Starting,
            EngineState::Stopped => {
                if self.antenna.check_button() {
                    info!("Stop cleared by button");
                    EngineState::Restarting
                } else {
                    self.link.clock().delay_ms(self.config.idle_poll_ms);
                    EngineState::Stopped
                }
            },
            EngineState::Finished => {
                if self.signals.take_restart() || self.antenna.check_button() {
                    EngineState::Restarting
                } else {
                    self.link.clock().delay_ms(self.config.idle_poll_ms);
                    EngineState::Finished
                }
            },
        };

        if next != self.state {
            debug!("Engine {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        next
    }

    /// 持续运行，直到 `should_exit` 置位
    pub fn run_until(&mut self, should_exit: &AtomicBool) {
        while !should_exit.load(Ordering::Acquire) {
            self.step();
        }
        info!("Sweep engine exiting in {:?}", self.state);
    }

    /// 运行直到进入 `Finished` 或 `Stopped`，最多 `max_steps` 步
    pub fn run_to_completion(&mut self, max_steps: usize) -> EngineState {
        for _ in 0..max_steps {
            match self.step() {
                state @ (EngineState::Finished | EngineState::Stopped) => return state,
                _ => {},
            }
        }
        self.state
    }

    fn service_signals(&mut self) {
        if self.signals.take_status() {
            debug!("Reporting status");
            self.send_logged(self.active);
        }

        if self.signals.take_idle_reply() {
            self.send_control(ControlAction::Idle);
        }

        if let Some(candidate) = self.signals.take_config() {
            match validate(&candidate, &self.antenna) {
                Ok(()) => {
                    info!("New config accepted:\n{}", candidate);
                    self.active = candidate;
                    self.signals.request_restart();
                },
                Err(e) => warn!("Config rejected: {}", e),
            }
        }

        if self.signals.take_stop() && self.state != EngineState::Stopped {
            info!("Test stopped");
            self.send_control(ControlAction::Idle);
            self.state = EngineState::Stopped;
        }
    }

    /// 开始当前配置：校准角度、重置迭代器、广播平台名与配置、发送 START
    fn start_test(&mut self) -> EngineState {
        info!(
            "Starting test set {} on {}",
            self.set_idx,
            self.antenna.name()
        );

        self.last_angle = None;
        if let Some(angle) = self.config.recalibration_angle {
            self.set_angle(angle as u16);
        }
        self.set_angle(0);

        self.iterator.reset(&self.active, &self.antenna);
        self.exp_idx = 0;
        self.msg_counter = 0;

        match TextMessage::new(self.antenna.name()) {
            Ok(text) => {
                self.raise_power();
                self.send_logged(text);
            },
            Err(e) => warn!("Cannot broadcast platform name: {}", e),
        }

        if let Err(e) = self.link.send_reliable(self.active) {
            warn!("Config broadcast failed: {}", e);
        }
        self.link.clock().delay_ms(self.config.settle_ms);
        self.send_control(ControlAction::Start);

        self.link
            .clock()
            .delay_ms(u64::from(self.active.start_delay));
        // 启动期间到达的重启请求视为已处理
        self.signals.take_restart();
        EngineState::Running
    }

    /// 发送当前扫描点，然后前进
    fn run_point(&mut self) -> EngineState {
        if self.signals.take_restart() {
            info!("Test restart requested");
            return EngineState::Restarting;
        }

        let point = *self.iterator.point();
        debug!(
            "Sweep point {}: power={} antenna={:?} angle={}",
            self.exp_idx, point.power, point.antenna, point.angle
        );

        self.set_angle(point.angle);
        self.antenna.apply(&point.antenna);
        if let Err(e) = self.link.set_tx_power(point.power) {
            warn!("Cannot set TX power {}: {}", point.power, e);
        }

        let gap = self.config.tx_gap_ms + u64::from(self.active.send_delay);
        for _ in 0..self.active.send_count {
            self.msg_counter = self.msg_counter.wrapping_add(1);
            let ping = TestPing {
                timestamp: self.link.clock().now_ms() as u32,
                msg_counter: self.msg_counter,
                exp_idx: self.exp_idx,
                angle: point.angle,
                antenna: point.antenna.to_bytes(),
                power: point.power,
            };
            // 单条失败不中断扫描点
            if let Err(e) = self.link.send(ping) {
                debug!("Ping {} not sent: {}", self.msg_counter, e);
            }
            self.link.clock().delay_ms(gap);
        }

        let next = self.advance();
        if next == EngineState::Running && self.antenna.check_button() {
            info!("Restart by button");
            return EngineState::Restarting;
        }
        next
    }

    fn advance(&mut self) -> EngineState {
        self.exp_idx = self.exp_idx.wrapping_add(1);
        match self.iterator.advance(&self.active, &self.antenna) {
            Advance::Done => {
                info!("Test set {} done", self.set_idx);
                self.send_control(ControlAction::Done);
                self.next_test_set()
            },
            step => {
                trace!("Advance {:?}", step);
                EngineState::Running
            },
        }
    }

    /// 加载下一组测试集；全部完成时回到第 0 组并进入 `Finished`
    fn next_test_set(&mut self) -> EngineState {
        self.set_idx += 1;
        let Some(next) = self.test_sets.get(self.set_idx).copied() else {
            info!("All {} test sets done", self.test_sets.len());
            self.set_idx = 0;
            if let Some(first) = self.test_sets.first() {
                self.active = *first;
            }
            return EngineState::Finished;
        };

        match validate(&next, &self.antenna) {
            Ok(()) => self.active = next,
            Err(e) => warn!("Test set {} rejected, keeping current: {}", self.set_idx, e),
        }
        EngineState::Starting
    }

    /// 请求指向角度；与上次相同则跳过
    ///
    /// 无论是否收到应答都记录为当前角度，等待 `settle_ms` 后扫描继续。
    fn set_angle(&mut self, angle: u16) -> bool {
        if self.last_angle == Some(angle) {
            return false;
        }
        self.raise_power();
        let acked = match self
            .link
            .send_for_default_ack(AngleMessage::set(angle), self.signals.angle_ack())
        {
            Ok(acked) => acked,
            Err(e) => {
                warn!("Angle request {} failed: {}", angle, e);
                false
            },
        };
        self.last_angle = Some(angle);
        self.link.clock().delay_ms(self.config.settle_ms);
        acked
    }

    fn raise_power(&mut self) {
        let level = self.link.config().control_tx_power;
        if let Err(e) = self.link.set_tx_power(level) {
            warn!("Cannot set TX power {}: {}", level, e);
        }
    }

    fn send_control(&mut self, action: ControlAction) {
        if let Err(e) = self.link.send_reliable(ControlMessage::new(action)) {
            warn!("Control {} failed: {}", action, e);
        }
    }

    fn send_logged(&mut self, message: impl Into<Message>) {
        let message = message.into();
        if let Err(e) = self.link.send(message) {
            debug!("Send failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaser_antenna::mock::{MockButton, antenna_for};
    use phaser_driver::{LinkConfig, LinkMetrics, ManualClock};
    use phaser_protocol::{AntennaTestRange, AxisRange, Packet, PlatformId};
    use phaser_radio::{MockAir, MockRadioTx, RadioError, SplittableRadio, TxAdapter};

    type TestEngine = SweepEngine<MockRadioTx, ManualClock, Box<dyn AntennaDriver>>;

    fn link_config() -> LinkConfig {
        LinkConfig {
            ack_timeout_ms: 20,
            ..LinkConfig::default()
        }
    }

    fn engine(air: &MockAir, sets: Vec<TestConfig>) -> (TestEngine, MockButton, ManualClock) {
        let clock = ManualClock::new();
        let (_rx, tx) = air.endpoint("phaser").split().unwrap();
        let link = MessageLink::new(tx, clock.clone(), link_config(), Arc::new(LinkMetrics::new()));
        let (antenna, button) = antenna_for(PlatformId::Phaser, clock.clone());
        let engine = SweepEngine::with_test_sets(
            link,
            antenna,
            Arc::new(EngineSignals::new()),
            EngineConfig::default(),
            sets,
        )
        .unwrap();
        (engine, button, clock)
    }

    fn single_point(send_count: u16) -> TestConfig {
        TestConfig {
            platform: PlatformId::Phaser,
            start_delay: 50,
            send_count,
            send_delay: 2,
            angle_step: 0,
            angle_count: 1,
            power: TestConfig::power_list(&[31]),
            antenna: AntennaTestRange::fixed(),
        }
    }

    fn sent(air: &MockAir) -> Vec<Message> {
        air.history_from("phaser")
            .iter()
            .map(|t| Message::try_from(&Packet::verify(&t.data).unwrap()).unwrap())
            .collect()
    }

    fn controls(messages: &[Message]) -> Vec<ControlAction> {
        messages
            .iter()
            .filter_map(|m| match m {
                Message::Control(c) => Some(c.action),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_test_sets_rejected() {
        let air = MockAir::new();
        let (_rx, tx) = air.endpoint("phaser").split().unwrap();
        let clock = ManualClock::new();
        let link = MessageLink::new(tx, clock.clone(), link_config(), Arc::new(LinkMetrics::new()));
        let (antenna, _) = antenna_for(PlatformId::Phaser, clock);
        let result = SweepEngine::with_test_sets(
            link,
            antenna,
            Arc::new(EngineSignals::new()),
            EngineConfig::default(),
            Vec::new(),
        );
        assert!(matches!(result, Err(NodeError::NoTestSets)));
    }

    #[test]
    fn test_single_point_run() {
        let air = MockAir::new();
        let (mut engine, _, _) = engine(&air, vec![single_point(4)]);

        assert_eq!(engine.run_to_completion(20), EngineState::Finished);

        let messages = sent(&air);
        let pings: Vec<&TestPing> = messages
            .iter()
            .filter_map(|m| match m {
                Message::Test(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(pings.len(), 4);
        assert!(pings.iter().all(|p| p.power == 31 && p.angle == 0 && p.exp_idx == 0));
        assert_eq!(
            pings.iter().map(|p| p.msg_counter).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );

        // START x3，然后 DONE x3
        assert_eq!(
            controls(&messages),
            vec![
                ControlAction::Start,
                ControlAction::Start,
                ControlAction::Start,
                ControlAction::Done,
                ControlAction::Done,
                ControlAction::Done,
            ]
        );
    }

    #[test]
    fn test_start_sequence_order() {
        let air = MockAir::new();
        let (mut engine, _, _) = engine(&air, vec![single_point(1)]);
        engine.step(); // Idle -> Starting
        engine.step(); // Starting -> Running

        let messages = sent(&air);
        // 角度校准：-10 再 0
        assert_eq!(messages[0], Message::Angle(AngleMessage::set(-10i16 as u16)));
        assert_eq!(messages[1], Message::Angle(AngleMessage::set(0)));
        assert!(matches!(&messages[2], Message::Text(t) if t.as_str() == "Phaser"));
        assert_eq!(messages[3], Message::Config(single_point(1)));
        assert_eq!(engine.state(), EngineState::Running);
    }

    /// 发送总是失败的射频
    struct DeadTx {
        power: u8,
    }

    impl TxAdapter for DeadTx {
        fn send(&mut self, _data: &[u8]) -> Result<(), RadioError> {
            Err(RadioError::Device("antenna unplugged".into()))
        }

        fn set_tx_power(&mut self, level: u8) -> Result<(), RadioError> {
            self.power = level;
            Ok(())
        }

        fn tx_power(&self) -> u8 {
            self.power
        }
    }

    #[test]
    fn test_send_failures_do_not_stop_sweep() {
        let clock = ManualClock::new();
        let metrics = Arc::new(LinkMetrics::new());
        let link = MessageLink::new(DeadTx { power: 31 }, clock.clone(), link_config(), metrics.clone());
        let (antenna, _) = antenna_for(PlatformId::Phaser, clock);
        let mut engine = SweepEngine::with_test_sets(
            link,
            antenna,
            Arc::new(EngineSignals::new()),
            EngineConfig::default(),
            vec![single_point(4)],
        )
        .unwrap();

        assert_eq!(engine.run_to_completion(20), EngineState::Finished);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tx_frames_total, 0);
        // 至少包含 4 条测试消息
        assert!(snapshot.tx_errors >= 4, "{:?}", snapshot);
    }

    #[test]
    fn test_timestamps_follow_clock() {
        let air = MockAir::new();
        let (mut engine, _, _) = engine(&air, vec![single_point(3)]);
        engine.run_to_completion(20);

        let stamps: Vec<u32> = sent(&air)
            .iter()
            .filter_map(|m| match m {
                Message::Test(p) => Some(p.timestamp),
                _ => None,
            })
            .collect();
        // 每条间隔 tx_gap + send_delay = 3ms
        assert_eq!(stamps[1] - stamps[0], 3);
        assert_eq!(stamps[2] - stamps[1], 3);
    }

    #[test]
    fn test_exp_idx_per_sweep_point() {
        let air = MockAir::new();
        let cfg = TestConfig {
            power: TestConfig::power_list(&[31, 15]),
            angle_step: 10,
            angle_count: 2,
            antenna: AntennaTestRange::new(AxisRange::fixed(0), AxisRange::new(0, 64, 2)),
            ..single_point(1)
        };
        let (mut engine, _, _) = engine(&air, vec![cfg]);
        engine.run_to_completion(50);

        let pings: Vec<(u16, u8, u8, u16)> = sent(&air)
            .iter()
            .filter_map(|m| match m {
                Message::Test(p) => Some((p.exp_idx, p.power, p.antenna[1], p.angle)),
                _ => None,
            })
            .collect();
        assert_eq!(pings.len(), 8);
        assert_eq!(pings[0], (0, 31, 0, 0));
        assert_eq!(pings[1], (1, 15, 0, 0));
        assert_eq!(pings[2], (2, 31, 64, 0));
        assert_eq!(pings[4], (4, 31, 0, 10));
        assert_eq!(pings[7], (7, 15, 64, 10));

        // 角度只在变化时请求
        let angle_requests = sent(&air)
            .iter()
            .filter(|m| matches!(m, Message::Angle(_)))
            .count();
        assert_eq!(angle_requests, 3);
    }

    #[test]
    fn test_test_sets_run_in_order_then_wrap() {
        let air = MockAir::new();
        let second = TestConfig {
            power: TestConfig::power_list(&[7]),
            ..single_point(2)
        };
        let (mut engine, _, _) = engine(&air, vec![single_point(1), second]);

        assert_eq!(engine.run_to_completion(50), EngineState::Finished);
        assert_eq!(engine.set_index(), 0);
        assert_eq!(engine.active_config(), &single_point(1));

        let powers: Vec<u8> = sent(&air)
            .iter()
            .filter_map(|m| match m {
                Message::Test(p) => Some(p.power),
                _ => None,
            })
            .collect();
        assert_eq!(powers, vec![31, 7, 7]);
    }

    #[test]
    fn test_restart_command_restarts_current_set() {
        let air = MockAir::new();
        let cfg = TestConfig {
            angle_step: 5,
            angle_count: 4,
            ..single_point(1)
        };
        let (mut engine, _, _) = engine(&air, vec![cfg]);
        engine.step();
        engine.step();
        engine.step(); // 第一个扫描点
        assert_eq!(engine.point().angle, 5);

        engine.signals().request_restart();
        assert_eq!(engine.step(), EngineState::Restarting);
        assert_eq!(engine.step(), EngineState::Starting);
        assert_eq!(engine.step(), EngineState::Running);
        assert_eq!(engine.point().angle, 0);
        assert_eq!(engine.exp_idx(), 0);
    }

    #[test]
    fn test_stop_sends_idle_and_waits_for_button() {
        let air = MockAir::new();
        let (mut engine, button, _) = engine(&air, vec![single_point(1)]);
        engine.step();
        engine.step();

        engine.signals().request_stop();
        assert_eq!(engine.step(), EngineState::Stopped);
        assert_eq!(engine.step(), EngineState::Stopped);
        assert!(controls(&sent(&air)).contains(&ControlAction::Idle));

        // 停止状态下重启命令无效
        engine.signals().request_restart();
        assert_eq!(engine.step(), EngineState::Stopped);

        button.press_for(1);
        assert_eq!(engine.step(), EngineState::Restarting);
        assert_eq!(engine.step(), EngineState::Starting);
    }

    #[test]
    fn test_config_accepted_forces_restart() {
        let air = MockAir::new();
        let cfg = TestConfig {
            angle_step: 5,
            angle_count: 4,
            ..single_point(1)
        };
        let (mut engine, _, _) = engine(&air, vec![cfg]);
        engine.step();
        engine.step();

        let new_config = TestConfig {
            send_count: 9,
            ..single_point(1)
        };
        engine.signals().post_config(new_config);
        assert_eq!(engine.step(), EngineState::Restarting);
        assert_eq!(engine.active_config(), &new_config);
    }

    #[test]
    fn test_config_rejected_keeps_active() {
        let air = MockAir::new();
        let (mut engine, _, _) = engine(&air, vec![single_point(1)]);
        engine.step();
        engine.step();

        let bad = TestConfig {
            start_delay: 30000,
            ..single_point(1)
        };
        engine.signals().post_config(bad);
        assert_eq!(engine.step(), EngineState::Finished);
        assert_eq!(engine.active_config(), &single_point(1));
    }

    #[test]
    fn test_status_rebroadcasts_config() {
        let air = MockAir::new();
        let (mut engine, _, _) = engine(&air, vec![single_point(1)]);
        engine.step();
        air.clear_history();

        engine.signals().request_status();
        engine.step();
        let messages = sent(&air);
        assert_eq!(messages.first(), Some(&Message::Config(single_point(1))));
    }

    #[test]
    fn test_angle_timeout_does_not_block_sweep() {
        let air = MockAir::new();
        let cfg = TestConfig {
            angle_step: 5,
            angle_count: 3,
            ..single_point(1)
        };
        let (mut engine, _, _) = engine(&air, vec![cfg]);
        assert_eq!(engine.run_to_completion(20), EngineState::Finished);
        // 校准 2 次 + 角度 5、10
        assert_eq!(engine.link().metrics().snapshot().ack_timeouts, 4);
    }

    #[test]
    fn test_finished_restarts_on_command() {
        let air = MockAir::new();
        let (mut engine, _, _) = engine(&air, vec![single_point(1)]);
        assert_eq!(engine.run_to_completion(20), EngineState::Finished);
        assert_eq!(engine.step(), EngineState::Finished);

        engine.signals().request_restart();
        assert_eq!(engine.step(), EngineState::Restarting);
    }
}
