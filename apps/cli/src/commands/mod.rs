//! 命令定义和实现

pub mod frame;
pub mod simulate;
pub mod test_sets;

pub use frame::{DecodeCommand, EncodeCommand};
pub use simulate::SimulateCommand;
pub use test_sets::TestSetsCommand;
