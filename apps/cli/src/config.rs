//! 仿真配置文件
//!
//! TOML 格式，所有字段都可省略：
//!
//! ```toml
//! platform = "phaser"
//! fast = true
//! pointing = true
//! loss_rate = 0.01
//! capture = 32
//! timeout_secs = 300
//!
//! [link]
//! rssi = -48
//! lqi = 105
//! jitter = 2
//!
//! [[test_sets]]
//! send_count = 20
//! powers = [31, 15]
//! angle_step = 5
//! angle_count = 4
//! axis_a = { start = 0, step = 8, count = 4 }
//! ```
//!
//! `test_sets` 中省略的字段取平台第一组内置测试集的值。

use anyhow::{Context, Result};
use phaser_sdk::antenna::mock::antenna_for;
use phaser_sdk::driver::SystemClock;
use phaser_sdk::node::validate;
use phaser_sdk::protocol::{AntennaTestRange, AxisRange, POWER_LIST_SIZE, PlatformId, TestConfig};
use phaser_sdk::radio::LinkQuality;
use phaser_sdk::test_sets;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 仿真配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub platform: PlatformId,
    /// 压缩链路与步进电机的固定等待（测试集本身的延时不变）
    pub fast: bool,
    /// 是否启用步进节点
    pub pointing: bool,
    pub loss_rate: f64,
    /// 抓包容量（0 表示不抓包）
    pub capture: usize,
    /// 最长运行时间（秒）
    pub timeout_secs: u64,
    pub link: LinkSection,
    pub test_sets: Vec<TestSetEntry>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            platform: PlatformId::Phaser,
            fast: false,
            pointing: true,
            loss_rate: 0.0,
            capture: 0,
            timeout_secs: 3600,
            link: LinkSection::default(),
            test_sets: Vec::new(),
        }
    }
}

/// 接收端链路质量
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkSection {
    pub rssi: i8,
    pub lqi: i8,
    pub jitter: u8,
}

impl Default for LinkSection {
    fn default() -> Self {
        let quality = LinkQuality::default();
        Self {
            rssi: quality.rssi,
            lqi: quality.lqi,
            jitter: quality.jitter,
        }
    }
}

impl From<LinkSection> for LinkQuality {
    fn from(section: LinkSection) -> Self {
        LinkQuality {
            rssi: section.rssi,
            lqi: section.lqi,
            jitter: section.jitter,
        }
    }
}

/// 一组测试集（省略的字段取平台默认值）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestSetEntry {
    pub start_delay: Option<u16>,
    pub send_count: Option<u16>,
    pub send_delay: Option<u16>,
    pub angle_step: Option<u16>,
    pub angle_count: Option<u16>,
    pub powers: Option<Vec<u8>>,
    pub axis_a: Option<AxisSection>,
    pub axis_b: Option<AxisSection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisSection {
    pub start: u8,
    #[serde(default)]
    pub step: u8,
    #[serde(default)]
    pub count: u16,
}

impl From<AxisSection> for AxisRange {
    fn from(axis: AxisSection) -> Self {
        AxisRange::new(axis.start, axis.step, axis.count)
    }
}

impl TestSetEntry {
    /// 以 `base` 为默认值生成测试配置
    pub fn resolve(&self, base: &TestConfig) -> Result<TestConfig> {
        let power = match &self.powers {
            Some(powers) => {
                anyhow::ensure!(
                    powers.len() <= POWER_LIST_SIZE,
                    "at most {} powers per test set, got {}",
                    POWER_LIST_SIZE,
                    powers.len()
                );
                TestConfig::power_list(powers)
            },
            None => base.power,
        };
        Ok(TestConfig {
            platform: base.platform,
            start_delay: self.start_delay.unwrap_or(base.start_delay),
            send_count: self.send_count.unwrap_or(base.send_count),
            send_delay: self.send_delay.unwrap_or(base.send_delay),
            angle_step: self.angle_step.unwrap_or(base.angle_step),
            angle_count: self.angle_count.unwrap_or(base.angle_count),
            power,
            antenna: AntennaTestRange::new(
                self.axis_a.map(Into::into).unwrap_or(base.antenna.axis_a),
                self.axis_b.map(Into::into).unwrap_or(base.antenna.axis_b),
            ),
        })
    }
}

impl SimConfig {
    /// 从文件加载
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content)?;
        anyhow::ensure!(
            (0.0..=1.0).contains(&config.loss_rate),
            "loss_rate must be within [0, 1], got {}",
            config.loss_rate
        );
        Ok(config)
    }

    /// 解析出的测试集（未配置时使用内置测试集）
    ///
    /// 每组都经过与发射端相同的检查。
    pub fn resolve_test_sets(&self) -> Result<Vec<TestConfig>> {
        let builtin = test_sets::builtin(self.platform);
        if self.test_sets.is_empty() {
            return Ok(builtin);
        }

        let base = builtin
            .first()
            .copied()
            .with_context(|| format!("No built-in test set for {}", self.platform))?;
        let (antenna, _) = antenna_for(self.platform, SystemClock::new());

        self.test_sets
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let config = entry.resolve(&base)?;
                validate(&config, &antenna)
                    .with_context(|| format!("Test set #{} rejected", idx + 1))?;
                Ok(config)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = SimConfig::parse("").unwrap();
        assert_eq!(config, SimConfig::default());
        assert_eq!(
            config.resolve_test_sets().unwrap(),
            test_sets::builtin(PlatformId::Phaser)
        );
    }

    #[test]
    fn test_partial_test_set_inherits_builtin() {
        let config = SimConfig::parse(
            r#"
            platform = "phasertx"

            [[test_sets]]
            send_count = 7
            powers = [31, 3]
            axis_b = { start = 2 }
            "#,
        )
        .unwrap();
        assert_eq!(config.platform, PlatformId::PhaserTx);

        let base = test_sets::builtin(PlatformId::PhaserTx)[0];
        let sets = config.resolve_test_sets().unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].send_count, 7);
        assert_eq!(sets[0].powers().collect::<Vec<_>>(), vec![31, 3]);
        assert_eq!(sets[0].antenna.axis_a, base.antenna.axis_a);
        assert_eq!(sets[0].antenna.axis_b, AxisRange::fixed(2));
        assert_eq!(sets[0].start_delay, base.start_delay);
        assert_eq!(sets[0].platform, PlatformId::PhaserTx);
    }

    #[test]
    fn test_link_section() {
        let config = SimConfig::parse(
            r#"
            fast = true
            [link]
            rssi = -60
            jitter = 4
            "#,
        )
        .unwrap();
        assert!(config.fast);
        let quality = LinkQuality::from(config.link);
        assert_eq!(quality.rssi, -60);
        assert_eq!(quality.lqi, LinkQuality::default().lqi);
        assert_eq!(quality.jitter, 4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(SimConfig::parse("loss_rate = 1.5").is_err());
        assert!(SimConfig::parse("platform = \"yagi\"").is_err());
        assert!(SimConfig::parse("unknown_key = 1").is_err());

        let config = SimConfig::parse(
            r#"
            [[test_sets]]
            start_delay = 25000
            "#,
        )
        .unwrap();
        let err = config.resolve_test_sets().unwrap_err();
        assert!(format!("{:#}", err).contains("Test set #1"), "{:#}", err);

        let config = SimConfig::parse(
            r#"
            [[test_sets]]
            powers = [31, 31, 31, 31, 31, 31, 31, 31, 31]
            "#,
        )
        .unwrap();
        assert!(config.resolve_test_sets().is_err());

        let config = SimConfig::parse(
            r#"
            [[test_sets]]
            powers = [40]
            "#,
        )
        .unwrap();
        assert!(config.resolve_test_sets().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "platform = \"santa\"\npointing = false\ncapture = 16").unwrap();

        let config = SimConfig::load(file.path()).unwrap();
        assert_eq!(config.platform, PlatformId::Santa);
        assert!(!config.pointing);
        assert_eq!(config.capture, 16);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = SimConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }
}
