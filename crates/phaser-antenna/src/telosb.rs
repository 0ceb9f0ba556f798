//! TelosB 平台：无天线硬件，只做功率与角度扫描

use crate::driver::AntennaDriver;
use crate::hal::{Button, OutputPin, check_button};
use phaser_driver::Clock;
use phaser_protocol::{AntennaState, PlatformId};

pub struct TelosBAntenna<B, L, C> {
    button: B,
    led: L,
    clock: C,
}

impl<B: Button, L: OutputPin, C: Clock> TelosBAntenna<B, L, C> {
    pub fn new(button: B, led: L, clock: C) -> Self {
        Self { button, led, clock }
    }
}

impl<B: Button, L: OutputPin, C: Clock> AntennaDriver for TelosBAntenna<B, L, C> {
    fn platform(&self) -> PlatformId {
        PlatformId::TelosB
    }

    fn init(&mut self) {}

    fn apply(&mut self, _state: &AntennaState) {}

    fn check_button(&mut self) -> bool {
        check_button(&self.button, &mut self.led, &self.clock)
    }
}
