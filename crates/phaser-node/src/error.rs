//! 节点层错误类型

use phaser_driver::DriverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),
    #[error("No test sets available")]
    NoTestSets,
}
