//! 天线能力接口
//!
//! 扫描引擎只通过 [`AntennaDriver`] 操作天线：初始化迭代、前进到下一个天线状态、
//! 把状态写入硬件，以及检查用户按键。

use crate::cursor::AntennaCursor;
use crate::test_sets;
use phaser_protocol::{AntennaState, AxisRange, PlatformId, TestConfig};

/// 天线能力接口
pub trait AntennaDriver: Send {
    /// 平台类型
    fn platform(&self) -> PlatformId;

    /// 平台名称（测试开始时以文本消息广播）
    fn name(&self) -> &'static str {
        self.platform().name()
    }

    /// 初始化硬件
    fn init(&mut self);

    /// 平台相关的配置检查（默认接受）
    fn sanity_check(&self, _config: &TestConfig) -> bool {
        true
    }

    /// 开始一次配置的迭代：游标归零，状态设为各轴起点
    fn init_iteration(&self, cursor: &mut AntennaCursor, config: &TestConfig, state: &mut AntennaState) {
        init_axes(self.platform(), cursor, config, state);
    }

    /// 前进到下一个天线状态
    ///
    /// 先前进轴 A；A 回绕时重置到起点并前进轴 B；B 也回绕时返回 `false`。
    /// `count == 0` 的轴完全跳过。
    fn advance(&self, cursor: &mut AntennaCursor, config: &TestConfig, state: &mut AntennaState) -> bool {
        advance_axes(cursor, config, state, |_, value, range| value.wrapping_add(range.step))
    }

    /// 把状态写入硬件，并等待稳定
    fn apply(&mut self, state: &AntennaState);

    /// 检查用户按键（按下并松开后返回 `true`）
    fn check_button(&mut self) -> bool {
        false
    }

    /// 内置测试集
    fn test_sets(&self) -> Vec<TestConfig> {
        test_sets::builtin(self.platform())
    }
}

impl<T: AntennaDriver + ?Sized> AntennaDriver for Box<T> {
    fn platform(&self) -> PlatformId {
        (**self).platform()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn init(&mut self) {
        (**self).init()
    }

    fn sanity_check(&self, config: &TestConfig) -> bool {
        (**self).sanity_check(config)
    }

    fn init_iteration(&self, cursor: &mut AntennaCursor, config: &TestConfig, state: &mut AntennaState) {
        (**self).init_iteration(cursor, config, state)
    }

    fn advance(&self, cursor: &mut AntennaCursor, config: &TestConfig, state: &mut AntennaState) -> bool {
        (**self).advance(cursor, config, state)
    }

    fn apply(&mut self, state: &AntennaState) {
        (**self).apply(state)
    }

    fn check_button(&mut self) -> bool {
        (**self).check_button()
    }

    fn test_sets(&self) -> Vec<TestConfig> {
        (**self).test_sets()
    }
}

/// 两轴通用初始化
pub fn init_axes(
    platform: PlatformId,
    cursor: &mut AntennaCursor,
    config: &TestConfig,
    state: &mut AntennaState,
) {
    let range = config.antenna;
    cursor.axis_a.reset(range.axis_a.count);
    cursor.axis_b.reset(range.axis_b.count);
    *state = AntennaState::initial(platform);
    state.set_axes(range.axis_a.start, range.axis_b.start);
}

/// 两轴通用前进逻辑
///
/// `next_a(idx, current, range)` 计算轴 A 前进后的值，轴 B 总是按步长递增（u8 回绕）。
pub fn advance_axes(
    cursor: &mut AntennaCursor,
    config: &TestConfig,
    state: &mut AntennaState,
    next_a: impl Fn(u16, u8, &AxisRange) -> u8,
) -> bool {
    let range = config.antenna;
    let mut a = state.axis_a();
    let mut b = state.axis_b();

    let advanced = 'advance: {
        if range.axis_a.is_iterated() {
            if cursor.axis_a.step() {
                a = next_a(cursor.axis_a.idx, a, &range.axis_a);
                break 'advance true;
            }
            a = range.axis_a.start;
        }
        if range.axis_b.is_iterated() {
            if cursor.axis_b.step() {
                b = b.wrapping_add(range.axis_b.step);
                break 'advance true;
            }
            b = range.axis_b.start;
        }
        false
    };

    state.set_axes(a, b);
    advanced
}
