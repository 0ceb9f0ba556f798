//! # Phaser CLI
//!
//! 相控阵天线扫描测试台命令行工具。
//!
//! ```bash
//! # 查看平台内置测试集
//! phaser-cli test-sets --platform phaser
//!
//! # 在进程内仿真整套测试台，输出每个扫描点的统计
//! phaser-cli simulate --platform phaser-tx --fast
//! phaser-cli simulate --config sim.toml --json
//!
//! # 校验并解析一帧
//! phaser-cli decode 5048...
//!
//! # 生成一帧（可注入到真实链路）
//! phaser-cli encode control stop
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use phaser_sdk::PlatformId;

mod commands;
mod config;

use commands::{DecodeCommand, EncodeCommand, SimulateCommand, TestSetsCommand};

/// Phaser CLI - 天线扫描测试台命令行工具
#[derive(Parser, Debug)]
#[command(name = "phaser-cli")]
#[command(about = "Command-line interface for the phaser antenna sweep rig", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 列出平台内置测试集
    TestSets {
        #[command(flatten)]
        args: TestSetsCommand,
    },

    /// 进程内仿真完整测试台
    Simulate {
        #[command(flatten)]
        args: SimulateCommand,
    },

    /// 校验并解析十六进制帧
    Decode {
        #[command(flatten)]
        args: DecodeCommand,
    },

    /// 生成十六进制帧
    #[command(subcommand)]
    Encode(EncodeCommand),
}

/// 天线平台
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Telosb,
    Phaser,
    PhaserTx,
    Santa,
}

impl From<Platform> for PlatformId {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Telosb => PlatformId::TelosB,
            Platform::Phaser => PlatformId::Phaser,
            Platform::PhaserTx => PlatformId::PhaserTx,
            Platform::Santa => PlatformId::Santa,
        }
    }
}

fn main() -> Result<()> {
    // 初始化日志
    phaser_sdk::init_logger("phaser_cli=info,phaser_node=info");

    let cli = Cli::parse();

    match cli.command {
        Commands::TestSets { args } => args.execute(),
        Commands::Simulate { args } => args.execute(),
        Commands::Decode { args } => args.execute(),
        Commands::Encode(cmd) => cmd.execute(),
    }
}
