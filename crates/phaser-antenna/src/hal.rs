//! 硬件能力 trait
//!
//! 天线与步进电机只通过这些小接口访问 GPIO，真实板卡与 mock 各自实现。

use phaser_driver::Clock;

/// 数字输出引脚
pub trait OutputPin: Send {
    fn set_high(&mut self);
    fn set_low(&mut self);

    fn write(&mut self, high: bool) {
        if high {
            self.set_high()
        } else {
            self.set_low()
        }
    }
}

/// 并行移相器端口（Phaser 平台）
pub trait PhaseShifterPort: Send {
    /// 切换到并行控制模式
    fn set_parallel(&mut self);
    fn set_phase_a(&mut self, value: u8);
    fn set_phase_b(&mut self, value: u8);
}

/// 6 针脚方向图端口（Santa 平台）
pub trait PinBank: Send {
    /// 写入针脚方向图（低 6 位有效）
    fn write_pattern(&mut self, pattern: u8);
}

/// 按键
pub trait Button: Send {
    fn is_pressed(&self) -> bool;
}

/// 步进电机控制线
pub trait StepperPins: Send {
    /// 使能（刹车）线，`true` 为刹车
    fn set_brake(&mut self, engaged: bool);
    fn set_step(&mut self, high: bool);
    /// 方向线，`true` 为反向
    fn set_reverse(&mut self, reverse: bool);
    /// 霍尔零点传感器是否触发
    fn sense_zero(&self) -> bool;
}

/// LED 闪烁间隔（ms）
pub const BLINK_MS: u64 = 100;

/// 闪烁 3 次（亮 100ms / 灭 100ms）
pub fn blink3(led: &mut impl OutputPin, clock: &impl Clock) {
    for _ in 0..3 {
        led.set_high();
        clock.delay_ms(BLINK_MS);
        led.set_low();
        clock.delay_ms(BLINK_MS);
    }
}

/// 按键检查
///
/// 未按下立即返回 `false`；按下时先闪烁 3 次，松开前持续闪烁，松开后返回 `true`。
pub fn check_button(button: &impl Button, led: &mut impl OutputPin, clock: &impl Clock) -> bool {
    if !button.is_pressed() {
        return false;
    }
    blink3(led, clock);
    while button.is_pressed() {
        blink3(led, clock);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockButton, MockLed};
    use phaser_driver::ManualClock;

    #[test]
    fn test_released_button_returns_immediately() {
        let button = MockButton::new();
        let mut led = MockLed::new();
        let clock = ManualClock::new();

        assert!(!check_button(&button, &mut led, &clock));
        assert_eq!(led.blinks(), 0);
        assert_eq!(clock.now_ms(), 0);
    }

    #[test]
    fn test_held_button_blinks_until_release() {
        let button = MockButton::new();
        let mut led = MockLed::new();
        let clock = ManualClock::new();

        // 前两次读取为按下状态
        button.press_for(2);
        assert!(check_button(&button, &mut led, &clock));
        assert_eq!(led.blinks(), 6);
        assert_eq!(clock.now_ms(), 6 * 2 * BLINK_MS);
        assert!(!button.is_pressed());
    }
}
