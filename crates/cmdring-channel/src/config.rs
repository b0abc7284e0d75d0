//! 通道配置
//!
//! 所有字段都有默认值，配置文件中只需写出需要覆盖的项：
//!
//! ```toml
//! capacity = 2000
//! stale_timeout_secs = 3.0
//! poll_interval_ms = 30
//! lock_ttl_ms = 5000
//! ```

use crate::error::ConfigError;
use crate::retry::RetryTable;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 命令通道配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// 环形缓冲区容量（槽位数 N）
    pub capacity: u32,
    /// 命令过期时间（秒）
    pub stale_timeout_secs: f64,
    /// 轮询间隔（毫秒），也是所有等待的最坏响应延迟
    pub poll_interval_ms: u64,
    /// 租约锁 TTL（毫秒）
    pub lock_ttl_ms: u64,
    /// 等待告警的间隔，以轮询间隔为单位（默认 200 × 30ms ≈ 6s）
    pub warn_every_polls: u64,
    /// 通道内部释放锁时是否校验租约令牌
    ///
    /// 默认 `false`：无条件删除锁键（多个生产者互相信任）。
    pub fenced_release: bool,
    /// 按命令类别的请求重试策略
    pub retry: RetryTable,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: 2000,
            stale_timeout_secs: 3.0,
            poll_interval_ms: 30,
            lock_ttl_ms: 5000,
            warn_every_polls: 200,
            fenced_release: false,
            retry: RetryTable::default(),
        }
    }
}

impl ChannelConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be > 0".to_string()));
        }
        if !(self.stale_timeout_secs.is_finite() && self.stale_timeout_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "stale_timeout_secs must be a positive number, got {}",
                self.stale_timeout_secs
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.lock_ttl_ms == 0 {
            return Err(ConfigError::Invalid("lock_ttl_ms must be > 0".to_string()));
        }
        if self.warn_every_polls == 0 {
            return Err(ConfigError::Invalid(
                "warn_every_polls must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.stale_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    /// 等待循环两次告警之间的时间（`warn_every_polls` 个轮询间隔）
    pub fn warn_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.saturating_mul(self.warn_every_polls))
    }
}
