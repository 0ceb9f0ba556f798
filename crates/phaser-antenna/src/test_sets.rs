//! 内置测试集
//!
//! 每个平台两组：先一组快速检查，再一组完整扫描。

use phaser_protocol::{AntennaTestRange, AxisRange, PlatformId, TestConfig};

/// 默认测试开始延迟（ms）
pub const START_DELAY_MS: u16 = 1000;

const FULL_POWER: &[u8] = &[31];
const POWER_SWEEP: &[u8] = &[31, 23, 15, 7, 3];

fn base(platform: PlatformId, antenna: AntennaTestRange) -> TestConfig {
    TestConfig {
        platform,
        start_delay: START_DELAY_MS,
        send_count: 100,
        send_delay: 1,
        angle_step: 5,
        angle_count: 40,
        power: TestConfig::power_list(FULL_POWER),
        antenna,
    }
}

/// 平台的内置测试集
pub fn builtin(platform: PlatformId) -> Vec<TestConfig> {
    match platform {
        PlatformId::Phaser => {
            let antenna = AntennaTestRange::new(AxisRange::new(0, 32, 0), AxisRange::new(0, 32, 8));
            vec![
                base(platform, antenna),
                TestConfig {
                    send_delay: 5,
                    power: TestConfig::power_list(POWER_SWEEP),
                    ..base(platform, antenna)
                },
            ]
        }
        PlatformId::PhaserTx => {
            let phase = AxisRange::new(0, 8, 8);
            vec![
                base(platform, AntennaTestRange::new(phase, AxisRange::new(0, 4, 1))),
                TestConfig {
                    send_delay: 5,
                    power: TestConfig::power_list(POWER_SWEEP),
                    ..base(platform, AntennaTestRange::new(phase, AxisRange::new(0, 4, 4)))
                },
            ]
        }
        PlatformId::Santa => {
            let antenna = AntennaTestRange::new(AxisRange::new(0, 1, 4), AxisRange::fixed(0));
            vec![
                base(platform, antenna),
                TestConfig {
                    send_delay: 5,
                    power: TestConfig::power_list(POWER_SWEEP),
                    ..base(platform, antenna)
                },
            ]
        }
        PlatformId::TelosB => {
            let antenna = AntennaTestRange::fixed();
            vec![
                TestConfig {
                    send_count: 32,
                    send_delay: 5,
                    ..base(platform, antenna)
                },
                TestConfig {
                    send_delay: 5,
                    power: TestConfig::power_list(POWER_SWEEP),
                    ..base(platform, antenna)
                },
            ]
        }
    }
}
