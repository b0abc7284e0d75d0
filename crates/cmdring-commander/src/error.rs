//! 命令层错误类型定义

use cmdring_channel::ChannelError;
use thiserror::Error;

/// 命令层错误类型
#[derive(Error, Debug)]
pub enum CommanderError {
    /// 通道错误（存储故障、请求超时等）
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// 未知的底盘模式
    #[error("Unknown movebase mode: {0}")]
    UnknownMode(String),

    /// 命令文本不符合语法
    #[error("Malformed command '{msg}': {reason}")]
    Malformed { msg: String, reason: String },

    /// 输入值非法（NaN、无穷大、缺少摇杆轴等）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 控制器消息无法解析
    #[error("Controller message error: {0}")]
    Message(#[from] serde_json::Error),
}

impl CommanderError {
    pub(crate) fn malformed(msg: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            msg: msg.to_string(),
            reason: reason.into(),
        }
    }
}
