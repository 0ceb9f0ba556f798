//! 内置测试集命令

use crate::Platform;
use anyhow::Result;
use clap::Args;
use phaser_sdk::{PlatformId, test_sets};

/// 内置测试集命令参数
#[derive(Args, Debug)]
pub struct TestSetsCommand {
    /// 天线平台
    #[arg(short, long, value_enum)]
    pub platform: Platform,

    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,
}

impl TestSetsCommand {
    pub fn execute(&self) -> Result<()> {
        let platform = PlatformId::from(self.platform);
        let sets = test_sets::builtin(platform);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&sets)?);
            return Ok(());
        }

        println!("{} built-in test set(s) for {}", sets.len(), platform);
        for (idx, set) in sets.iter().enumerate() {
            println!("\n# {}", idx + 1);
            println!("{}", set);
        }
        Ok(())
    }
}
