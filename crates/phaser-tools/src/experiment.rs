//! 实验聚合
//!
//! 接收端只为*当前*扫描点保留一个累加器：
//! - 收到测试消息时，若 `exp_idx` 与上一条不同且累加器有数据，先输出报告
//! - 收到角度或控制消息（扫描阶段结束）时，输出报告
//! - 输出后累加器清零

use crate::stream_stat::StreamStat;
use phaser_protocol::TestPing;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 当前扫描点的累加器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Experiment {
    pub exp_idx: u16,
    pub power: u8,
    pub angle: u16,
    pub phase: u8,
    pub rssi: StreamStat,
    pub lqi: StreamStat,
}

impl Experiment {
    fn report(&self) -> ExperimentReport {
        ExperimentReport {
            exp_idx: self.exp_idx,
            power: self.power,
            angle: self.angle,
            phase: self.phase,
            count: self.rssi.count(),
            rssi_mean: self.rssi.mean(),
            lqi_mean: self.lqi.mean(),
            rssi_var: self.rssi.variance(),
            lqi_var: self.lqi.variance(),
        }
    }
}

/// 单个扫描点的统计报告
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub exp_idx: u16,
    pub power: u8,
    pub angle: u16,
    pub phase: u8,
    pub count: u32,
    pub rssi_mean: f64,
    pub lqi_mean: f64,
    pub rssi_var: f64,
    pub lqi_var: f64,
}

impl ExperimentReport {
    /// 制表符分隔输出的表头
    pub const TSV_HEADER: &'static str =
        "Test:\texp_idx\tpower\tangle\tphase\tnum\trssi_mean\tlqi_mean\trssi_var\tlqi_var";
}

impl fmt::Display for ExperimentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Test:\t{}\t{}\t{}\t{}\t{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}",
            self.exp_idx,
            self.power,
            self.angle,
            self.phase,
            self.count,
            self.rssi_mean,
            self.lqi_mean,
            self.rssi_var,
            self.lqi_var
        )
    }
}

/// 实验聚合器
#[derive(Debug, Default)]
pub struct ExperimentAggregator {
    last_exp_idx: Option<u16>,
    active: Option<Experiment>,
}

impl ExperimentAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前累加器（没有数据时为 `None`）
    pub fn active(&self) -> Option<&Experiment> {
        self.active.as_ref()
    }

    pub fn last_exp_idx(&self) -> Option<u16> {
        self.last_exp_idx
    }

    /// 处理一条测试消息
    ///
    /// 若扫描点发生变化，返回上一个扫描点的报告。
    pub fn on_test(&mut self, ping: &TestPing, rssi: i8, lqi: i8) -> Option<ExperimentReport> {
        let report = if self.last_exp_idx != Some(ping.exp_idx) {
            self.flush()
        } else {
            None
        };

        let exp = self.active.get_or_insert_with(Experiment::default);
        exp.exp_idx = ping.exp_idx;
        exp.power = ping.power;
        exp.angle = ping.angle;
        exp.phase = ping.phase();
        exp.rssi.add(i32::from(rssi));
        exp.lqi.add(i32::from(lqi));
        self.last_exp_idx = Some(ping.exp_idx);

        report
    }

    /// 扫描阶段结束事件（角度消息或控制消息）
    pub fn on_sweep_event(&mut self) -> Option<ExperimentReport> {
        self.flush()
    }

    /// 输出并清空当前累加器
    pub fn flush(&mut self) -> Option<ExperimentReport> {
        self.active.take().map(|exp| exp.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping(exp_idx: u16) -> TestPing {
        TestPing {
            exp_idx,
            power: 31,
            angle: 10,
            antenna: [0x20, 0x01],
            ..Default::default()
        }
    }

    #[test]
    fn test_flush_on_exp_idx_change() {
        let mut agg = ExperimentAggregator::new();
        let rssi = [-40i8, -42, -44, -46, -48];
        for (i, &r) in rssi.iter().enumerate() {
            assert!(agg.on_test(&ping(0), r, 100 + i as i8).is_none());
        }

        let report = agg.on_test(&ping(1), -30, 90).unwrap();
        assert_eq!(report.exp_idx, 0);
        assert_eq!(report.count, 5);
        assert!((report.rssi_mean + 44.0).abs() < 1e-9);
        assert!((report.rssi_var - 8.0).abs() < 1e-9);
        assert!((report.lqi_mean - 102.0).abs() < 1e-9);
        assert!((report.lqi_var - 2.0).abs() < 1e-9);
        assert_eq!(report.phase, 0x21);
        assert_eq!(report.power, 31);
        assert_eq!(report.angle, 10);

        let active = agg.active().unwrap();
        assert_eq!(active.exp_idx, 1);
        assert_eq!(active.rssi.count(), 1);
    }

    #[test]
    fn test_sweep_event_flushes() {
        let mut agg = ExperimentAggregator::new();
        agg.on_test(&ping(3), -50, 100);
        agg.on_test(&ping(3), -50, 100);

        let report = agg.on_sweep_event().unwrap();
        assert_eq!(report.exp_idx, 3);
        assert_eq!(report.count, 2);
        assert_eq!(report.rssi_var, 0.0);
        assert!(agg.active().is_none());

        // 已清空，不会重复输出
        assert!(agg.on_sweep_event().is_none());
    }

    #[test]
    fn test_first_ping_does_not_report() {
        let mut agg = ExperimentAggregator::new();
        assert!(agg.on_test(&ping(7), -60, 80).is_none());
        assert_eq!(agg.last_exp_idx(), Some(7));
    }

    #[test]
    fn test_report_format() {
        let report = ExperimentReport {
            exp_idx: 2,
            power: 23,
            angle: 5,
            phase: 64,
            count: 100,
            rssi_mean: -44.0,
            lqi_mean: 105.5,
            rssi_var: 1.25,
            lqi_var: 0.0,
        };
        assert_eq!(
            report.to_string(),
            "Test:\t2\t23\t5\t64\t100\t-44.00\t105.50\t1.25\t0.00"
        );
        assert_eq!(ExperimentReport::TSV_HEADER.split('\t').count(), 10);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let mut agg = ExperimentAggregator::new();
        agg.on_test(&ping(0), -40, 100);
        let report = agg.flush().unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"exp_idx\":0"));
        let back: ExperimentReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
