//! 流式统计
//!
//! 只保存样本数、累加和与平方和，均值和方差都可以 O(1) 得到。

use serde::{Deserialize, Serialize};

/// 流式统计量
///
/// 方差为总体方差 `sum_sq / n - mean^2`，数值误差导致的负值截断为 0。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamStat {
    count: u32,
    sum: i64,
    sum_sq: i64,
}

impl StreamStat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sample: i32) {
        let sample = i64::from(sample);
        self.count += 1;
        self.sum += sample;
        self.sum_sq += sample * sample;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn sum(&self) -> i64 {
        self.sum
    }

    pub fn sum_sq(&self) -> i64 {
        self.sum_sq
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// 均值（无样本时为 0）
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum as f64 / f64::from(self.count)
    }

    /// 总体方差（无样本时为 0）
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = f64::from(self.count);
        let mean = self.mean();
        (self.sum_sq as f64 / n - mean * mean).max(0.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Extend<i32> for StreamStat {
    fn extend<I: IntoIterator<Item = i32>>(&mut self, iter: I) {
        for sample in iter {
            self.add(sample);
        }
    }
}

impl FromIterator<i32> for StreamStat {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut stat = Self::new();
        stat.extend(iter);
        stat
    }
}
