//! 测试配置检查

use phaser_antenna::AntennaDriver;
use phaser_protocol::{MAX_SEND_DELAY_MS, MAX_START_DELAY_MS, TestConfig};
use phaser_radio::MAX_TX_POWER;
use thiserror::Error;

/// 配置被拒绝的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigRejection {
    #[error("Start delay {0}ms exceeds 20000ms")]
    StartDelay(u16),
    #[error("Send delay {0}ms exceeds 10000ms")]
    SendDelay(u16),
    #[error("TX power {power} at index {index} exceeds 31")]
    Power { index: usize, power: u8 },
    #[error("Rejected by {0} antenna")]
    Antenna(&'static str),
}

/// 检查候选配置
///
/// 通过后由调用方整体替换当前配置；失败时当前配置保持不变。
pub fn validate<A: AntennaDriver + ?Sized>(
    candidate: &TestConfig,
    antenna: &A,
) -> Result<(), ConfigRejection> {
    if candidate.start_delay > MAX_START_DELAY_MS {
        return Err(ConfigRejection::StartDelay(candidate.start_delay));
    }
    if candidate.send_delay > MAX_SEND_DELAY_MS {
        return Err(ConfigRejection::SendDelay(candidate.send_delay));
    }
    // 检查整个列表（包括结束符之后的项）
    if let Some((index, &power)) = candidate
        .power
        .iter()
        .enumerate()
        .find(|&(_, &p)| p > MAX_TX_POWER)
    {
        return Err(ConfigRejection::Power { index, power });
    }
    if !antenna.sanity_check(candidate) {
        return Err(ConfigRejection::Antenna(antenna.name()));
    }
    Ok(())
}
