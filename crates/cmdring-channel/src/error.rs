//! 通道层错误类型定义

use crate::SlotId;
use cmdring_store::StoreError;
use thiserror::Error;

/// 通道层错误类型
#[derive(Error, Debug)]
pub enum ChannelError {
    /// 存储错误（连接断开等），通道层不做重试
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 存储中的数据无法解析
    #[error("Corrupt value at key '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    /// 指定的槽位超出环形缓冲区容量
    #[error("Slot {id} out of range (capacity {capacity})")]
    SlotOutOfRange { id: SlotId, capacity: u32 },

    /// 请求在重试策略限定内未收到响应
    #[error("Request '{kind}' timed out after {attempts} attempt(s) (last slot {slot})")]
    RequestTimedOut {
        kind: String,
        slot: SlotId,
        attempts: u32,
    },

    /// 停止信号监视线程已退出
    #[error("Stop watcher closed")]
    WatcherClosed,
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value: {0}")]
    Invalid(String),
}
