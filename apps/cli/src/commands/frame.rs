//! 帧编解码命令

use crate::Platform;
use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use phaser_sdk::protocol::{
    AngleMessage, ControlAction, ControlMessage, Message, Packet, PlatformId, TextMessage,
};
use phaser_sdk::test_sets;

/// 解码命令参数
#[derive(Args, Debug)]
pub struct DecodeCommand {
    /// 十六进制帧（可含空格）
    #[arg(required = true)]
    pub hex: Vec<String>,

    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,
}

impl DecodeCommand {
    pub fn execute(&self) -> Result<()> {
        let message = decode_hex(&self.hex.concat())?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&message)?);
        } else {
            println!("{:#?}", message);
        }
        Ok(())
    }
}

/// 校验并解析一帧
pub fn decode_hex(text: &str) -> Result<Message> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&cleaned).context("Frame is not valid hex")?;
    let packet = Packet::verify(&bytes).context("Frame rejected")?;
    tracing::debug!(
        "Frame type '{}' payload {} bytes checksum 0x{:04X}",
        packet.msg_type().as_char(),
        packet.payload().len(),
        packet.checksum()
    );
    let message = Message::try_from(&packet).context("Payload rejected")?;
    Ok(message)
}

/// 控制动作
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Idle,
    Restart,
    Status,
    Done,
}

impl From<Action> for ControlAction {
    fn from(action: Action) -> Self {
        match action {
            Action::Start => ControlAction::Start,
            Action::Stop => ControlAction::Stop,
            Action::Idle => ControlAction::Idle,
            Action::Restart => ControlAction::Restart,
            Action::Status => ControlAction::Status,
            Action::Done => ControlAction::Done,
        }
    }
}

/// 编码命令
#[derive(Subcommand, Debug)]
pub enum EncodeCommand {
    /// 控制消息
    Control {
        #[arg(value_enum)]
        action: Action,
    },

    /// 角度请求或应答
    Angle {
        /// 角度（步数，负值按有符号数编码）
        #[arg(allow_negative_numbers = true)]
        angle: i16,

        /// 编码为应答
        #[arg(long)]
        ack: bool,
    },

    /// 文本消息
    Text { text: String },

    /// 平台内置测试集
    Config {
        #[arg(short, long, value_enum)]
        platform: Platform,

        /// 测试集序号（从 1 开始）
        #[arg(short, long, default_value_t = 1)]
        set: usize,
    },
}

impl EncodeCommand {
    pub fn execute(self) -> Result<()> {
        let message = self.message()?;
        println!("{}", hex::encode(message.to_packet().to_bytes()));
        Ok(())
    }

    fn message(self) -> Result<Message> {
        let message = match self {
            EncodeCommand::Control { action } => ControlMessage::new(action.into()).into(),
            EncodeCommand::Angle { angle, ack } => {
                let wire = angle as u16;
                if ack {
                    AngleMessage::ack(wire).into()
                } else {
                    AngleMessage::set(wire).into()
                }
            },
            EncodeCommand::Text { text } => TextMessage::new(text)?.into(),
            EncodeCommand::Config { platform, set } => {
                let platform = PlatformId::from(platform);
                let sets = test_sets::builtin(platform);
                let config = set
                    .checked_sub(1)
                    .and_then(|idx| sets.get(idx))
                    .with_context(|| {
                        format!("{} has {} test set(s), no #{}", platform, sets.len(), set)
                    })?;
                (*config).into()
            },
        };
        Ok(message)
    }
}
