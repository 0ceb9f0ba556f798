//! 步进电机驱动（天线指向）
//!
//! 一圈 200 步，角度以步为单位。零点由霍尔传感器确定。

use crate::hal::StepperPins;
use phaser_driver::Clock;
use tracing::{debug, warn};

/// 每圈步数
pub const STEPS_PER_REV: i32 = 200;

/// 步进电机能力
pub trait Stepper: Send {
    /// 转到绝对角度
    ///
    /// 与当前角度相同、或 `|angle| >= 200` 时返回 `false` 且不动作。
    /// `angle == 0` 触发零点校准。
    fn absolute(&mut self, angle: i32) -> bool;

    /// 相对转动（负数为反向）
    fn relative(&mut self, steps: i32);

    /// 零点校准，找不到传感器时返回 `false`
    fn zero_calibrate(&mut self) -> bool;

    /// 最近一次已知角度
    fn last_angle(&self) -> i32;
}

/// 步进电机时序参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperConfig {
    /// 每个脉冲高/低电平各保持的时间（ms）
    pub step_delay_ms: u64,
    /// 转动前刹车保持时间（ms）
    pub brake_delay_ms: u64,
    /// 转动后释放前等待时间（ms）
    pub release_delay_ms: u64,
    /// 已在零点时先反向退出的步数
    pub zero_backoff: i32,
    /// 空闲时释放电机以省电
    pub low_power: bool,
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 10,
            brake_delay_ms: 10,
            release_delay_ms: 200,
            zero_backoff: 20,
            low_power: true,
        }
    }
}

/// 基于控制线的步进电机
pub struct StepperMotor<P, C> {
    pins: P,
    clock: C,
    config: StepperConfig,
    last_angle: i32,
}

impl<P: StepperPins, C: Clock> StepperMotor<P, C> {
    pub fn new(pins: P, clock: C, config: StepperConfig) -> Self {
        Self {
            pins,
            clock,
            config,
            // 未知位置（非 0，保证首次请求 0 会触发校准）
            last_angle: 1,
        }
    }

    /// 初始化控制线并释放电机
    pub fn init(&mut self) {
        self.pins.set_reverse(false);
        self.pins.set_step(false);
        self.pins.set_brake(true);
        self.release();
    }

    pub fn config(&self) -> &StepperConfig {
        &self.config
    }

    fn brake(&mut self) {
        self.pins.set_brake(true);
        self.clock.delay_ms(self.config.brake_delay_ms);
    }

    fn release(&mut self) {
        self.clock.delay_ms(self.config.release_delay_ms);
        self.pins.set_brake(false);
    }

    fn pulse(&mut self) {
        self.pins.set_step(true);
        self.clock.delay_ms(self.config.step_delay_ms);
        self.pins.set_step(false);
        self.clock.delay_ms(self.config.step_delay_ms);
    }

    fn step(&mut self, steps: u32) {
        if self.config.low_power {
            self.brake();
        }
        for _ in 0..steps {
            self.pulse();
        }
        if self.config.low_power {
            self.release();
        }
    }
}

impl<P: StepperPins, C: Clock> Stepper for StepperMotor<P, C> {
    fn absolute(&mut self, angle: i32) -> bool {
        if angle == self.last_angle {
            return false;
        }
        if angle.abs() >= STEPS_PER_REV {
            warn!("Stepper angle out of range: {}", angle);
            return false;
        }
        if angle == 0 {
            return self.zero_calibrate();
        }

        let mut steps = angle - self.last_angle;
        if steps >= STEPS_PER_REV {
            steps -= STEPS_PER_REV;
        }
        if steps <= -STEPS_PER_REV {
            steps += STEPS_PER_REV;
        }
        debug!("Stepper {} -> {} ({} steps)", self.last_angle, angle, steps);
        self.relative(steps);

        self.last_angle = if angle < 0 { angle + STEPS_PER_REV } else { angle };
        true
    }

    fn relative(&mut self, steps: i32) {
        if steps < 0 {
            self.pins.set_reverse(true);
        } else if steps > 0 {
            self.pins.set_reverse(false);
        }
        if steps != 0 {
            self.step(steps.unsigned_abs());
        }
        self.pins.set_reverse(false);
    }

    fn zero_calibrate(&mut self) -> bool {
        if self.pins.sense_zero() {
            self.relative(-self.config.zero_backoff);
        }

        if self.config.low_power {
            self.brake();
        }
        let mut found = false;
        for _ in 0..STEPS_PER_REV {
            self.pulse();
            if self.pins.sense_zero() {
                found = true;
                break;
            }
        }
        if self.config.low_power {
            self.release();
        }

        if found {
            self.last_angle = 0;
            debug!("Stepper zero found");
        } else {
            warn!("Stepper zero sensor not found");
        }
        found
    }

    fn last_angle(&self) -> i32 {
        self.last_angle
    }
}
