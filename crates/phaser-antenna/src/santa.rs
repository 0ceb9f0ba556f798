//! Santa 平台：6 针脚方向图天线

use crate::cursor::AntennaCursor;
use crate::driver::{AntennaDriver, advance_axes, init_axes};
use crate::hal::PinBank;
use phaser_driver::Clock;
use phaser_protocol::{AntennaState, PlatformId, TestConfig};
use tracing::trace;

/// 针脚方向图表（低 6 位有效）
pub const PIN_TABLE: [u8; 29] = [
    0b000000, 0b001001, 0b010010, 0b100100, 0b111111, //
    0b000001, 0b000010, 0b000100, 0b001000, 0b010000, 0b100000, //
    0b000011, 0b000110, 0b001100, 0b011000, 0b110000, 0b100001, //
    0b000101, 0b001010, 0b010100, 0b101000, 0b010001, 0b100010, //
    0b000111, 0b001110, 0b011100, 0b111000, 0b110001, 0b100011,
];

/// 写入方向图后的稳定时间（ms）
pub const SETTLE_MS: u64 = 1;

/// 轴 A 的下一个值
///
/// 扫描点数不超过表长时按表取值，否则按步长递增。
pub fn next_pattern(idx: u16, current: u8, step: u8, count: u16) -> u8 {
    if usize::from(count) > PIN_TABLE.len() {
        return current.wrapping_add(step);
    }
    PIN_TABLE
        .get(usize::from(idx))
        .copied()
        .unwrap_or_else(|| current.wrapping_add(step))
}

/// 针脚方向图天线（无按键）
pub struct SantaAntenna<P, C> {
    pins: P,
    clock: C,
}

impl<P: PinBank, C: Clock> SantaAntenna<P, C> {
    pub fn new(pins: P, clock: C) -> Self {
        Self { pins, clock }
    }
}

impl<P: PinBank, C: Clock> AntennaDriver for SantaAntenna<P, C> {
    fn platform(&self) -> PlatformId {
        PlatformId::Santa
    }

    fn init(&mut self) {
        self.pins.write_pattern(0);
    }

    fn init_iteration(&self, cursor: &mut AntennaCursor, config: &TestConfig, state: &mut AntennaState) {
        init_axes(self.platform(), cursor, config, state);
        // 轴 B 保留，不参与迭代
        cursor.axis_b.reset(0);
    }

    fn advance(&self, cursor: &mut AntennaCursor, config: &TestConfig, state: &mut AntennaState) -> bool {
        advance_axes(cursor, config, state, |idx, current, range| {
            next_pattern(idx, current, range.step, range.count)
        })
    }

    fn apply(&mut self, state: &AntennaState) {
        let pattern = state.axis_a() & 0x3f;
        trace!("Santa pattern {:06b}", pattern);
        self.pins.write_pattern(pattern);
        self.clock.delay_ms(SETTLE_MS);
    }
}
