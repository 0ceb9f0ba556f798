//! 仿真命令
//!
//! 在进程内搭起发射端、接收端与步进节点，实时输出每个扫描点的统计。

use crate::Platform;
use crate::config::SimConfig;
use anyhow::{Context, Result};
use clap::Args;
use crossbeam_channel::RecvTimeoutError;
use phaser_sdk::antenna::StepperConfig;
use phaser_sdk::node::EngineConfig;
use phaser_sdk::sim::{SimRig, SimRigBuilder, SweepLog};
use phaser_sdk::tools::ExperimentReport;
use phaser_sdk::{LinkConfig, MonitorEvent, PlatformId, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 仿真命令参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 天线平台（覆盖配置文件）
    #[arg(short, long, value_enum)]
    pub platform: Option<Platform>,

    /// 压缩链路与步进电机的固定等待
    #[arg(long)]
    pub fast: bool,

    /// 不启用步进节点
    #[arg(long)]
    pub no_pointing: bool,

    /// 抓包容量（覆盖配置文件）
    #[arg(long)]
    pub capture: Option<usize>,

    /// 以 JSON Lines 输出报告
    #[arg(long)]
    pub json: bool,
}

impl SimulateCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.resolve_config()?;
        let sets = config.resolve_test_sets()?;
        let capture = config.capture;

        let mut builder = SimRigBuilder::new(config.platform)
            .test_sets(sets)
            .monitor_link(config.link.into())
            .loss_rate(config.loss_rate)
            .pointing(config.pointing);
        if config.fast {
            builder = builder
                .link_config(fast_link())
                .engine_config(fast_engine())
                .stepper_config(fast_stepper());
        }
        if capture > 0 {
            builder = builder.capture(capture);
        }

        let mut rig = builder
            .build::<SystemClock>()
            .context("Failed to start simulated rig")?;

        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = interrupted.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal. Shutting down...");
            flag.store(true, Ordering::Release);
        })
        .context("Failed to set signal handler")?;

        eprintln!(
            "Simulating {} with {} test set(s){}",
            config.platform,
            rig.test_sets().len(),
            if config.pointing { " and stepper" } else { "" }
        );
        if !self.json {
            println!("{}", ExperimentReport::TSV_HEADER);
        }

        let log = self.stream(
            &mut rig,
            Duration::from_secs(config.timeout_secs),
            &interrupted,
        )?;
        rig.shutdown();
        // 关闭时输出的最后一个扫描点
        while let Ok(MonitorEvent::Report(report)) = rig.events().try_recv() {
            self.print_report(&report)?;
        }

        if capture > 0 {
            eprintln!("Last {} captured frame(s):", capture);
            for record in rig.captured() {
                if self.json {
                    println!("{}", serde_json::to_string(&record)?);
                } else {
                    println!("{}", record);
                }
            }
        }

        let metrics = rig.monitor_metrics();
        eprintln!(
            "{} report(s), {} set(s) done; monitor rx {} frames, {} invalid, {} malformed",
            log.reports.len(),
            log.done,
            metrics.rx_frames_total,
            metrics.rx_invalid,
            metrics.rx_malformed
        );
        if log.timed_out {
            anyhow::bail!("Timed out after {}s", config.timeout_secs);
        }
        Ok(())
    }

    /// 配置文件 + 命令行覆盖
    fn resolve_config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };
        if let Some(platform) = self.platform {
            let platform = PlatformId::from(platform);
            // 配置文件里的测试集属于原平台
            if platform != config.platform && !config.test_sets.is_empty() {
                tracing::warn!("Platform overridden, ignoring configured test sets");
                config.test_sets.clear();
            }
            config.platform = platform;
        }
        config.fast |= self.fast;
        if self.no_pointing {
            config.pointing = false;
        }
        if let Some(capture) = self.capture {
            config.capture = capture;
        }
        Ok(config)
    }

    /// 输出事件直到全部测试集完成、超时或中断
    fn stream(
        &self,
        rig: &mut SimRig<SystemClock>,
        timeout: Duration,
        interrupted: &AtomicBool,
    ) -> Result<SweepLog> {
        let expected = rig.test_sets().len();
        let deadline = Instant::now() + timeout;
        let mut log = SweepLog::default();

        while log.done < expected && !interrupted.load(Ordering::Acquire) {
            if Instant::now() >= deadline {
                log.timed_out = true;
                break;
            }
            match rig.events().recv_timeout(Duration::from_millis(10)) {
                Ok(event) => {
                    if let MonitorEvent::Report(report) = &event {
                        self.print_report(report)?;
                    }
                    log.push(event);
                },
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => break,
            }
            rig.poll_monitor();
        }
        Ok(log)
    }

    fn print_report(&self, report: &ExperimentReport) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(report)?);
        } else {
            println!("{}", report);
        }
        Ok(())
    }
}

fn fast_link() -> LinkConfig {
    LinkConfig {
        reliable_interval_ms: 5,
        reliable_pre_delay_ms: 0,
        ack_timeout_ms: 1000,
        ..LinkConfig::default()
    }
}

fn fast_engine() -> EngineConfig {
    EngineConfig {
        settle_ms: 5,
        idle_poll_ms: 50,
        ..EngineConfig::default()
    }
}

fn fast_stepper() -> StepperConfig {
    StepperConfig {
        step_delay_ms: 0,
        brake_delay_ms: 0,
        release_delay_ms: 0,
        ..StepperConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn command(config: Option<PathBuf>) -> SimulateCommand {
        SimulateCommand {
            config,
            platform: None,
            fast: false,
            no_pointing: false,
            capture: None,
            json: false,
        }
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "platform = \"santa\"\ncapture = 4\n[[test_sets]]\nsend_count = 3"
        )
        .unwrap();

        let mut cmd = command(Some(file.path().to_path_buf()));
        let config = cmd.resolve_config().unwrap();
        assert_eq!(config.platform, PlatformId::Santa);
        assert_eq!(config.test_sets.len(), 1);
        assert!(config.pointing);

        cmd.platform = Some(Platform::Phaser);
        cmd.fast = true;
        cmd.no_pointing = true;
        cmd.capture = Some(0);
        let config = cmd.resolve_config().unwrap();
        assert_eq!(config.platform, PlatformId::Phaser);
        assert!(config.test_sets.is_empty());
        assert!(config.fast);
        assert!(!config.pointing);
        assert_eq!(config.capture, 0);
    }

    #[test]
    fn test_same_platform_keeps_test_sets() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "platform = \"telosb\"\n[[test_sets]]\nsend_count = 3").unwrap();

        let mut cmd = command(Some(file.path().to_path_buf()));
        cmd.platform = Some(Platform::Telosb);
        let config = cmd.resolve_config().unwrap();
        assert_eq!(config.test_sets.len(), 1);
    }
}
