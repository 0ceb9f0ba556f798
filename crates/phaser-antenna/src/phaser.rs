//! Phaser 平台：双移相器（并行控制）

use crate::driver::AntennaDriver;
use crate::hal::{Button, OutputPin, PhaseShifterPort, check_button};
use phaser_driver::Clock;
use phaser_protocol::{AntennaState, PlatformId};
use tracing::trace;

/// 移相器稳定时间（ms）
pub const SETTLE_MS: u64 = 1;

/// 双移相器天线
pub struct PhaserAntenna<P, B, L, C> {
    port: P,
    button: B,
    led: L,
    clock: C,
}

impl<P, B, L, C> PhaserAntenna<P, B, L, C>
where
    P: PhaseShifterPort,
    B: Button,
    L: OutputPin,
    C: Clock,
{
    pub fn new(port: P, button: B, led: L, clock: C) -> Self {
        Self {
            port,
            button,
            led,
            clock,
        }
    }
}

impl<P, B, L, C> AntennaDriver for PhaserAntenna<P, B, L, C>
where
    P: PhaseShifterPort,
    B: Button,
    L: OutputPin,
    C: Clock,
{
    fn platform(&self) -> PlatformId {
        PlatformId::Phaser
    }

    fn init(&mut self) {
        self.port.set_parallel();
        self.port.set_phase_a(0);
        self.port.set_phase_b(0);
    }

    fn apply(&mut self, state: &AntennaState) {
        let (a, b) = (state.axis_a(), state.axis_b());
        trace!("Phaser apply: A={} B={}", a, b);
        self.port.set_phase_a(a);
        self.port.set_phase_b(b);
        self.clock.delay_ms(SETTLE_MS);
    }

    fn check_button(&mut self) -> bool {
        check_button(&self.button, &mut self.led, &self.clock)
    }
}
