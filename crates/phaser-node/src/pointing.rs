//! 步进节点（天线指向）
//!
//! RX 线程锁存最近一次角度设置请求；主循环执行转动并回复应答。
//! 应答总是发送（即使请求被拒绝，例如与当前角度相同），发射端据此继续扫描。

use parking_lot::Mutex;
use phaser_antenna::Stepper;
use phaser_driver::{Clock, MessageHandler, MessageLink};
use phaser_protocol::{AngleMessage, ControlAction};
use phaser_radio::TxAdapter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// 主循环轮询间隔（ms）
pub const POLL_MS: u64 = 10;

/// 锁存的角度请求
#[derive(Debug, Default)]
pub struct PointingSignals {
    request: Mutex<Option<u16>>,
}

impl PointingSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latch(&self, angle: u16) {
        *self.request.lock() = Some(angle);
    }

    pub fn take(&self) -> Option<u16> {
        self.request.lock().take()
    }
}

/// 步进节点接收处理器
pub struct PointingHandler {
    signals: Arc<PointingSignals>,
}

impl PointingHandler {
    pub fn new(signals: Arc<PointingSignals>) -> Self {
        Self { signals }
    }
}

impl MessageHandler for PointingHandler {
    fn on_angle(&mut self, msg: &AngleMessage) {
        if msg.action == ControlAction::Set {
            debug!("Angle request {}", msg.angle);
            self.signals.latch(msg.angle);
        }
    }
}

/// 步进节点主循环
pub struct PointingNode<T: TxAdapter, C: Clock, S: Stepper> {
    link: MessageLink<T, C>,
    stepper: S,
    signals: Arc<PointingSignals>,
}

impl<T: TxAdapter, C: Clock, S: Stepper> PointingNode<T, C, S> {
    pub fn new(link: MessageLink<T, C>, stepper: S, signals: Arc<PointingSignals>) -> Self {
        Self {
            link,
            stepper,
            signals,
        }
    }

    pub fn handler(&self) -> PointingHandler {
        PointingHandler::new(self.signals.clone())
    }

    pub fn stepper(&self) -> &S {
        &self.stepper
    }

    /// 启动时零点校准
    pub fn calibrate(&mut self) -> bool {
        let found = self.stepper.zero_calibrate();
        if found {
            info!("Stepper zeroed");
        } else {
            warn!("Stepper zero calibration failed");
        }
        found
    }

    /// 处理一次待执行的角度请求
    ///
    /// 返回 `(angle, moved)`；没有请求时返回 `None`。
    pub fn poll(&mut self) -> Option<(u16, bool)> {
        let angle = self.signals.take()?;
        // 线上角度按有符号数解释（负角度用于校准前的退让）
        let moved = self.stepper.absolute(i32::from(angle as i16));
        debug!("Angle {} -> moved={}", angle as i16, moved);

        if let Err(e) = self.link.send(AngleMessage::ack(angle)) {
            warn!("Angle {} ack not sent: {}", angle as i16, e);
        }
        Some((angle, moved))
    }

    /// 持续运行，直到 `should_exit` 置位
    pub fn run_until(&mut self, should_exit: &AtomicBool) {
        while !should_exit.load(Ordering::Acquire) {
            self.poll();
            self.link.clock().delay_ms(POLL_MS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaser_antenna::mock::MockStepperPins;
    use phaser_antenna::{StepperConfig, StepperMotor};
    use phaser_driver::{LinkConfig, LinkMetrics, ManualClock};
    use phaser_protocol::{Message, Packet};
    use phaser_radio::{MockAir, MockRadioTx, SplittableRadio};

    type TestNode = PointingNode<MockRadioTx, ManualClock, StepperMotor<MockStepperPins, ManualClock>>;

    fn node(air: &MockAir, pins: &MockStepperPins) -> TestNode {
        let clock = ManualClock::new();
        let (_rx, tx) = air.endpoint("stepper").split().unwrap();
        let link = MessageLink::new(
            tx,
            clock.clone(),
            LinkConfig::default(),
            Arc::new(LinkMetrics::new()),
        );
        let stepper = StepperMotor::new(pins.clone(), clock, StepperConfig::default());
        PointingNode::new(link, stepper, Arc::new(PointingSignals::new()))
    }

    fn acks(air: &MockAir) -> Vec<u16> {
        air.history_from("stepper")
            .iter()
            .filter_map(|t| match Message::try_from(&Packet::verify(&t.data).ok()?).ok()? {
                Message::Angle(a) if a.is_ack() => Some(a.angle),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_latched_request_is_executed_and_acked() {
        let air = MockAir::new();
        let pins = MockStepperPins::new(0);
        let mut node = node(&air, &pins);
        let mut handler = node.handler();
        assert!(node.calibrate());

        handler.on_angle(&AngleMessage::set(40));
        assert_eq!(node.poll(), Some((40, true)));
        assert_eq!(pins.position(), 40);
        assert_eq!(acks(&air), vec![40]);
        assert_eq!(node.poll(), None);
    }

    #[test]
    fn test_rejected_move_still_acked() {
        let air = MockAir::new();
        let pins = MockStepperPins::new(0);
        let mut node = node(&air, &pins);
        let mut handler = node.handler();
        node.calibrate();

        handler.on_angle(&AngleMessage::set(0));
        assert_eq!(node.poll(), Some((0, false)));
        handler.on_angle(&AngleMessage::set(250));
        assert_eq!(node.poll(), Some((250, false)));
        assert_eq!(acks(&air), vec![0, 250]);
    }

    #[test]
    fn test_latest_request_wins() {
        let air = MockAir::new();
        let pins = MockStepperPins::new(0);
        let mut node = node(&air, &pins);
        let mut handler = node.handler();
        node.calibrate();

        handler.on_angle(&AngleMessage::set(10));
        handler.on_angle(&AngleMessage::set(20));
        handler.on_angle(&AngleMessage::ack(30));
        assert_eq!(node.poll(), Some((20, true)));
        assert_eq!(node.poll(), None);
    }

    #[test]
    fn test_negative_wire_angle() {
        let air = MockAir::new();
        let pins = MockStepperPins::new(0);
        let mut node = node(&air, &pins);
        let mut handler = node.handler();
        node.calibrate();

        handler.on_angle(&AngleMessage::set(-10i16 as u16));
        assert_eq!(node.poll(), Some((-10i16 as u16, true)));
        assert_eq!(node.stepper().last_angle(), 190);
    }
}
