//! PhaserTX 平台：PE46120 移相 + 衰减
//!
//! 每个通道写入一个 14 位控制字，LSB 先行，CLK 上升沿采样 SDI，最后拉高 LE 锁存：
//!
//! ```text
//! bit 0-1   保留
//! bit 2-6   相位（5 位）
//! bit 7-10  衰减（4 位）
//! bit 11-12 保留
//! bit 13    通道
//! ```

use crate::driver::AntennaDriver;
use crate::hal::{Button, OutputPin, check_button};
use bilge::prelude::*;
use phaser_driver::Clock;
use phaser_protocol::{AntennaState, PlatformId};
use tracing::trace;

/// 控制字有效位数
pub const WORD_BITS: usize = 14;

/// 设置后的稳定时间（ms）
pub const SETTLE_MS: u64 = 1;

/// PE46120 控制字
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pe46120Word {
    pub reserved_lo: u2,
    pub phase: u5,
    pub attenuation: u4,
    pub reserved_mid: u2,
    pub channel: bool,
    pub reserved_hi: u2,
}

impl Pe46120Word {
    /// 构建控制字（相位取低 5 位，衰减取低 4 位）
    pub fn for_channel(phase: u8, attenuation: u8, channel: bool) -> Self {
        let mut word = Pe46120Word::from(u16::new(0));
        word.set_phase(u5::new(phase & 0x1f));
        word.set_attenuation(u4::new(attenuation & 0x0f));
        word.set_channel(channel);
        word
    }

    pub fn raw(self) -> u16 {
        u16::from(self).value()
    }
}

/// 由天线状态计算两个通道的控制字
///
/// 通道 0 只承载相位的最高位：bit 5 为 0 时写入 `0x10`，否则写入 0，衰减为 0。
/// 通道 1 承载相位低 5 位与衰减。
pub fn channel_words(phase: u8, attenuation: u8) -> [Pe46120Word; 2] {
    let p1 = if (phase >> 5) & 0x01 == 0 { 0x10 } else { 0x00 };
    let p2 = phase & 0x1f;
    [
        Pe46120Word::for_channel(p1, 0, false),
        Pe46120Word::for_channel(p2, attenuation, true),
    ]
}

/// PE46120 天线
pub struct PhaserTxAntenna<CLK, LE, SDI, B, L, C> {
    clk: CLK,
    le: LE,
    sdi: SDI,
    button: B,
    led: L,
    clock: C,
}

impl<CLK, LE, SDI, B, L, C> PhaserTxAntenna<CLK, LE, SDI, B, L, C>
where
    CLK: OutputPin,
    LE: OutputPin,
    SDI: OutputPin,
    B: Button,
    L: OutputPin,
    C: Clock,
{
    pub fn new(clk: CLK, le: LE, sdi: SDI, button: B, led: L, clock: C) -> Self {
        Self {
            clk,
            le,
            sdi,
            button,
            led,
            clock,
        }
    }

    /// 串行写入一个控制字并锁存
    fn shift_out(&mut self, word: Pe46120Word) {
        let mut bits = word.raw();
        self.clk.set_low();
        self.le.set_low();
        for _ in 0..WORD_BITS {
            self.sdi.write(bits & 0x01 != 0);
            self.clk.set_high();
            self.clk.set_low();
            bits >>= 1;
        }
        self.le.set_high();
    }

    fn write_state(&mut self, phase: u8, attenuation: u8) {
        for word in channel_words(phase, attenuation) {
            trace!("PE46120 word 0x{:04X}", word.raw());
            self.shift_out(word);
        }
    }
}

impl<CLK, LE, SDI, B, L, C> AntennaDriver for PhaserTxAntenna<CLK, LE, SDI, B, L, C>
where
    CLK: OutputPin,
    LE: OutputPin,
    SDI: OutputPin,
    B: Button,
    L: OutputPin,
    C: Clock,
{
    fn platform(&self) -> PlatformId {
        PlatformId::PhaserTx
    }

    fn init(&mut self) {
        self.le.set_high();
        self.clk.set_low();
        self.sdi.set_low();
        self.write_state(0, 0);
    }

    fn apply(&mut self, state: &AntennaState) {
        let (phase, attenuation) = (state.axis_a(), state.axis_b());
        self.write_state(phase, attenuation);
        self.clock.delay_ms(SETTLE_MS);
    }

    fn check_button(&mut self) -> bool {
        check_button(&self.button, &mut self.led, &self.clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::AntennaCursor;
    use crate::mock::{MockButton, MockLed, MockSerialBus};
    use phaser_driver::ManualClock;

    #[test]
    fn test_word_layout() {
        let word = Pe46120Word::for_channel(0x1f, 0x0f, true);
        assert_eq!(word.raw(), (0x1f << 2) | (0x0f << 7) | (1 << 13));

        let word = Pe46120Word::for_channel(0xff, 0xff, false);
        assert_eq!(word.raw(), (0x1f << 2) | (0x0f << 7));
        assert!(word.raw() < (1 << WORD_BITS));
    }

    #[test]
    fn test_channel_split() {
        // bit 5 清零 -> 通道 0 写 0x10
        let [ch0, ch1] = channel_words(0x08, 3);
        assert_eq!(ch0, Pe46120Word::for_channel(0x10, 0, false));
        assert_eq!(ch1, Pe46120Word::for_channel(0x08, 3, true));

        // bit 5 置位 -> 通道 0 写 0
        let [ch0, ch1] = channel_words(0x28, 0);
        assert_eq!(ch0.phase().value(), 0);
        assert_eq!(ch1.phase().value(), 0x08);
    }

    #[test]
    fn test_apply_shifts_out_two_words() {
        let bus = MockSerialBus::new();
        let (clk, le, sdi) = bus.pins();
        let mut antenna = PhaserTxAntenna::new(
            clk,
            le,
            sdi,
            MockButton::new(),
            MockLed::new(),
            ManualClock::new(),
        );

        antenna.apply(&AntennaState::PhaserTx {
            phase: 0x2a,
            attenuation: 5,
        });

        let words = bus.latched_words();
        let expected: Vec<u16> = channel_words(0x2a, 5).iter().map(|w| w.raw()).collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn test_builtin_long_set_covers_phase_and_attenuation() {
        let bus = MockSerialBus::new();
        let (clk, le, sdi) = bus.pins();
        let antenna = PhaserTxAntenna::new(
            clk,
            le,
            sdi,
            MockButton::new(),
            MockLed::new(),
            ManualClock::new(),
        );
        let config = antenna.test_sets()[1];
        let mut cursor = AntennaCursor::default();
        let mut state = AntennaState::None;

        antenna.init_iteration(&mut cursor, &config, &mut state);
        let mut seen = vec![state];
        while antenna.advance(&mut cursor, &config, &mut state) {
            seen.push(state);
        }

        assert_eq!(seen.len(), 8 * 4);
        assert_eq!(
            seen[9],
            AntennaState::PhaserTx {
                phase: 8,
                attenuation: 4
            }
        );
    }
}
