//! 扫描迭代器

use phaser_antenna::{AntennaCursor, AntennaDriver, LoopCursor};
use phaser_protocol::{AntennaState, TestConfig};

/// 当前扫描点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepPoint {
    pub power: u8,
    pub antenna: AntennaState,
    pub angle: u16,
}

/// 一次前进改变了哪个维度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Power,
    Antenna,
    Angle,
    /// 当前配置的所有组合已完成，各维度已回到起点
    Done,
}

/// 扫描迭代器
///
/// 只由扫描引擎持有；每次开始一个测试配置时重建。
#[derive(Debug, Clone, Default)]
pub struct SweepIterator {
    power: LoopCursor,
    antenna: AntennaCursor,
    angle: LoopCursor,
    point: SweepPoint,
}

impl SweepIterator {
    /// 从配置的第一个扫描点开始
    pub fn start<A: AntennaDriver + ?Sized>(config: &TestConfig, antenna: &A) -> Self {
        let mut iter = Self::default();
        iter.reset(config, antenna);
        iter
    }

    pub fn reset<A: AntennaDriver + ?Sized>(&mut self, config: &TestConfig, antenna: &A) {
        self.power.reset(config.powers().count() as u16);
        self.angle.reset(config.angle_count);
        self.point.power = config.power[0];
        self.point.angle = 0;
        antenna.init_iteration(&mut self.antenna, config, &mut self.point.antenna);
    }

    pub fn point(&self) -> &SweepPoint {
        &self.point
    }

    /// 前进到下一个扫描点
    pub fn advance<A: AntennaDriver + ?Sized>(&mut self, config: &TestConfig, antenna: &A) -> Advance {
        if self.power.step() {
            self.point.power = config.power[usize::from(self.power.idx)];
            return Advance::Power;
        }
        self.point.power = config.power[0];

        if antenna.advance(&mut self.antenna, config, &mut self.point.antenna) {
            return Advance::Antenna;
        }

        if self.angle.step() {
            self.point.angle = self.point.angle.wrapping_add(config.angle_step);
            return Advance::Angle;
        }
        self.point.angle = 0;

        Advance::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaser_antenna::mock::antenna_for;
    use phaser_driver::ManualClock;
    use phaser_protocol::{AntennaTestRange, AxisRange, PlatformId};
    use proptest::prelude::*;

    fn config(powers: &[u8], axis_a: AxisRange, axis_b: AxisRange, angle_step: u16, angle_count: u16) -> TestConfig {
        TestConfig {
            platform: PlatformId::Phaser,
            start_delay: 0,
            send_count: 1,
            send_delay: 0,
            angle_step,
            angle_count,
            power: TestConfig::power_list(powers),
            antenna: AntennaTestRange::new(axis_a, axis_b),
        }
    }

    fn walk(config: &TestConfig) -> (Vec<(u8, u8, u8, u16)>, Vec<Advance>) {
        let (antenna, _) = antenna_for(PlatformId::Phaser, ManualClock::new());
        let mut iter = SweepIterator::start(config, &antenna);
        let mut points = Vec::new();
        let mut steps = Vec::new();
        loop {
            let p = *iter.point();
            points.push((p.power, p.antenna.axis_a(), p.antenna.axis_b(), p.angle));
            let step = iter.advance(config, &antenna);
            steps.push(step);
            if step == Advance::Done {
                break;
            }
        }
        (points, steps)
    }

    #[test]
    fn test_precedence_order() {
        let cfg = config(
            &[31, 15],
            AxisRange::new(0, 1, 2),
            AxisRange::new(0, 10, 2),
            5,
            2,
        );
        let (points, steps) = walk(&cfg);
        assert_eq!(points.len(), 16);
        assert_eq!(
            &points[..5],
            &[
                (31, 0, 0, 0),
                (15, 0, 0, 0),
                (31, 1, 0, 0),
                (15, 1, 0, 0),
                (31, 0, 10, 0),
            ]
        );
        assert_eq!(points[8], (31, 0, 0, 5));
        assert_eq!(
            &steps[..4],
            &[Advance::Power, Advance::Antenna, Advance::Power, Advance::Antenna]
        );
        assert_eq!(steps[7], Advance::Angle);
    }

    #[test]
    fn test_single_point_config() {
        let cfg = config(&[31], AxisRange::fixed(0), AxisRange::fixed(0), 0, 1);
        let (points, steps) = walk(&cfg);
        assert_eq!(points, vec![(31, 0, 0, 0)]);
        assert_eq!(steps, vec![Advance::Done]);
    }

    #[test]
    fn test_leading_zero_power_still_swept() {
        let cfg = config(&[0, 31], AxisRange::fixed(0), AxisRange::fixed(0), 0, 1);
        let (points, steps) = walk(&cfg);
        assert_eq!(points, vec![(0, 0, 0, 0), (31, 0, 0, 0)]);
        assert_eq!(steps, vec![Advance::Power, Advance::Done]);
    }

    #[test]
    fn test_done_resets_point() {
        let cfg = config(&[31, 7], AxisRange::new(3, 1, 2), AxisRange::fixed(0), 10, 3);
        let (antenna, _) = antenna_for(PlatformId::Phaser, ManualClock::new());
        let mut iter = SweepIterator::start(&cfg, &antenna);
        let first = *iter.point();
        while iter.advance(&cfg, &antenna) != Advance::Done {}
        assert_eq!(*iter.point(), first);
    }

    proptest! {
        #[test]
        fn visits_every_combination_once(
            powers in prop::collection::vec(1u8..=31, 1..4),
            a in 0u16..4,
            b in 0u16..4,
            angles in 0u16..4,
        ) {
            let cfg = config(&powers, AxisRange::new(0, 1, a), AxisRange::new(100, 1, b), 7, angles);
            let (points, _) = walk(&cfg);
            let expected = powers.len()
                * usize::from(a.max(1))
                * usize::from(b.max(1))
                * usize::from(angles.max(1));
            prop_assert_eq!(points.len(), expected);

            // 功率可能重复，用功率索引代替取值判重
            let mut keys: Vec<_> = points
                .iter()
                .enumerate()
                .map(|(i, &(_, a, b, angle))| (i % powers.len(), a, b, angle))
                .collect();
            keys.sort();
            keys.dedup();
            prop_assert_eq!(keys.len(), expected);
        }
    }
}
