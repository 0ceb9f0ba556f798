//! Mock 硬件
//!
//! 所有 mock 都可以 `clone()`，克隆体共享同一份状态，测试可以一边交给驱动、
//! 一边观察引脚。

use crate::driver::AntennaDriver;
use crate::hal::{Button, OutputPin, PhaseShifterPort, PinBank, StepperPins};
use crate::phaser::PhaserAntenna;
use crate::phaser_tx::PhaserTxAntenna;
use crate::santa::SantaAntenna;
use crate::stepper::STEPS_PER_REV;
use crate::telosb::TelosBAntenna;
use parking_lot::Mutex;
use phaser_driver::Clock;
use phaser_protocol::PlatformId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// 按键：`press_for(n)` 后接下来 n 次读取为按下
#[derive(Debug, Clone, Default)]
pub struct MockButton {
    remaining: Arc<AtomicU32>,
}

impl MockButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press_for(&self, reads: u32) {
        self.remaining.store(reads, Ordering::SeqCst);
    }
}

impl Button for MockButton {
    fn is_pressed(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// LED：统计点亮次数
#[derive(Debug, Clone, Default)]
pub struct MockLed {
    blinks: Arc<AtomicU32>,
}

impl MockLed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blinks(&self) -> u32 {
        self.blinks.load(Ordering::SeqCst)
    }
}

impl OutputPin for MockLed {
    fn set_high(&mut self) {
        self.blinks.fetch_add(1, Ordering::SeqCst);
    }

    fn set_low(&mut self) {}
}

#[derive(Debug, Default)]
struct PhaseShifterState {
    parallel: bool,
    a: u8,
    b: u8,
}

/// 并行移相器端口
#[derive(Debug, Clone, Default)]
pub struct MockPhaseShifter {
    state: Arc<Mutex<PhaseShifterState>>,
}

impl MockPhaseShifter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_parallel(&self) -> bool {
        self.state.lock().parallel
    }

    /// 当前 (A, B)
    pub fn current(&self) -> (u8, u8) {
        let state = self.state.lock();
        (state.a, state.b)
    }
}

impl PhaseShifterPort for MockPhaseShifter {
    fn set_parallel(&mut self) {
        self.state.lock().parallel = true;
    }

    fn set_phase_a(&mut self, value: u8) {
        self.state.lock().a = value;
    }

    fn set_phase_b(&mut self, value: u8) {
        self.state.lock().b = value;
    }
}

#[derive(Debug, Default)]
struct SerialBusState {
    clk: bool,
    le: bool,
    sdi: bool,
    shift: u16,
    bits: u32,
    latched: Vec<u16>,
}

#[derive(Debug, Clone, Copy)]
enum SerialLine {
    Clk,
    Le,
    Sdi,
}

/// PE46120 串行总线
///
/// LE 为低时在 CLK 上升沿采样 SDI（LSB 先行），LE 上升沿锁存。
#[derive(Debug, Clone, Default)]
pub struct MockSerialBus {
    state: Arc<Mutex<SerialBusState>>,
}

/// 串行总线上的一根线
#[derive(Debug, Clone)]
pub struct MockSerialPin {
    bus: MockSerialBus,
    line: SerialLine,
}

impl MockSerialBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// (CLK, LE, SDI)
    pub fn pins(&self) -> (MockSerialPin, MockSerialPin, MockSerialPin) {
        let pin = |line| MockSerialPin {
            bus: self.clone(),
            line,
        };
        (pin(SerialLine::Clk), pin(SerialLine::Le), pin(SerialLine::Sdi))
    }

    /// 已锁存的控制字
    pub fn latched_words(&self) -> Vec<u16> {
        self.state.lock().latched.clone()
    }
}

impl OutputPin for MockSerialPin {
    fn set_high(&mut self) {
        let mut state = self.bus.state.lock();
        match self.line {
            SerialLine::Clk => {
                if !state.clk && !state.le && state.bits < 16 {
                    let bit = u16::from(state.sdi) << state.bits;
                    state.shift |= bit;
                    state.bits += 1;
                }
                state.clk = true;
            },
            SerialLine::Le => {
                if !state.le && state.bits > 0 {
                    let word = state.shift;
                    state.latched.push(word);
                    state.shift = 0;
                    state.bits = 0;
                }
                state.le = true;
            },
            SerialLine::Sdi => state.sdi = true,
        }
    }

    fn set_low(&mut self) {
        let mut state = self.bus.state.lock();
        match self.line {
            SerialLine::Clk => state.clk = false,
            SerialLine::Le => state.le = false,
            SerialLine::Sdi => state.sdi = false,
        }
    }
}

/// 6 针脚端口：记录写入历史
#[derive(Debug, Clone, Default)]
pub struct MockPinBank {
    history: Arc<Mutex<Vec<u8>>>,
}

impl MockPinBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<u8> {
        self.history.lock().clone()
    }
}

impl PinBank for MockPinBank {
    fn write_pattern(&mut self, pattern: u8) {
        self.history.lock().push(pattern);
    }
}

#[derive(Debug, Default)]
struct StepperState {
    position: i32,
    zero_at: Option<i32>,
    reverse: bool,
    step: bool,
    brake: bool,
    pulses: u32,
}

/// 步进电机：STEP 上升沿按方向移动一步，位置在 [0, 200) 内回绕
#[derive(Debug, Clone, Default)]
pub struct MockStepperPins {
    state: Arc<Mutex<StepperState>>,
}

impl MockStepperPins {
    /// 零点传感器位于 `zero_at`
    pub fn new(zero_at: i32) -> Self {
        let pins = Self::default();
        pins.state.lock().zero_at = Some(zero_at.rem_euclid(STEPS_PER_REV));
        pins
    }

    /// 没有零点传感器（传感器故障）
    pub fn without_sensor() -> Self {
        Self::default()
    }

    pub fn set_position(&self, position: i32) {
        self.state.lock().position = position.rem_euclid(STEPS_PER_REV);
    }

    pub fn position(&self) -> i32 {
        self.state.lock().position
    }

    pub fn pulses(&self) -> u32 {
        self.state.lock().pulses
    }

    pub fn is_reverse(&self) -> bool {
        self.state.lock().reverse
    }

    pub fn is_braked(&self) -> bool {
        self.state.lock().brake
    }
}

impl StepperPins for MockStepperPins {
    fn set_brake(&mut self, engaged: bool) {
        self.state.lock().brake = engaged;
    }

    fn set_step(&mut self, high: bool) {
        let mut state = self.state.lock();
        if high && !state.step {
            let delta = if state.reverse { -1 } else { 1 };
            state.position = (state.position + delta).rem_euclid(STEPS_PER_REV);
            state.pulses += 1;
        }
        state.step = high;
    }

    fn set_reverse(&mut self, reverse: bool) {
        self.state.lock().reverse = reverse;
    }

    fn sense_zero(&self) -> bool {
        let state = self.state.lock();
        state.zero_at == Some(state.position)
    }
}

/// 按平台构建 mock 天线，同时返回其按键（Santa 的按键不接入）
pub fn antenna_for<C>(platform: PlatformId, clock: C) -> (Box<dyn AntennaDriver>, MockButton)
where
    C: Clock + Clone + 'static,
{
    let button = MockButton::new();
    let antenna: Box<dyn AntennaDriver> = match platform {
        PlatformId::TelosB => Box::new(TelosBAntenna::new(button.clone(), MockLed::new(), clock)),
        PlatformId::Phaser => Box::new(PhaserAntenna::new(
            MockPhaseShifter::new(),
            button.clone(),
            MockLed::new(),
            clock,
        )),
        PlatformId::PhaserTx => {
            let (clk, le, sdi) = MockSerialBus::new().pins();
            Box::new(PhaserTxAntenna::new(
                clk,
                le,
                sdi,
                button.clone(),
                MockLed::new(),
                clock,
            ))
        },
        PlatformId::Santa => Box::new(SantaAntenna::new(MockPinBank::new(), clock)),
    };
    (antenna, button)
}
