//! 统一配置文件
//!
//! ```toml
//! [store]
//! host = "192.168.1.15"
//! port = 6379
//! db = 4
//!
//! [channel]
//! capacity = 2000
//! stale_timeout_secs = 3.0
//!
//! [channel.retry.kinds.get_robot_busy_state]
//! resend_after_ms = 6000
//!
//! [motion]
//! max_speed = 0.4
//!
//! [throttle]
//! min_interval_ms = 100
//! ```
//!
//! 所有表都可以省略，省略的字段取默认值。

use crate::channel::{ChannelConfig, ConfigError};
use crate::commander::{MotionLimits, ThrottleConfig};
use crate::store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    pub store: StoreConfig,
    pub channel: ChannelConfig,
    pub motion: MotionLimits,
    pub throttle: ThrottleConfig,
}

impl SdkConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.channel.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = SdkConfig::from_toml_str("").unwrap();
        assert_eq!(config, SdkConfig::default());
        assert_eq!(config.store.url(), "redis://localhost:6379/4");
    }

    #[test]
    fn test_sections() {
        let config = SdkConfig::from_toml_str(
            r#"
            [store]
            host = "192.168.1.15"
            db = 6

            [channel]
            capacity = 64

            [channel.retry.kinds.get_robot_busy_state]
            resend_after_ms = 1000

            [throttle]
            min_interval_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.store.url(), "redis://192.168.1.15:6379/6");
        assert_eq!(config.channel.capacity, 64);
        assert_eq!(
            config
                .channel
                .retry
                .policy_for("get_robot_busy_state")
                .resend_after_ms,
            1000
        );
        assert_eq!(config.throttle.min_interval_ms, 50);
        assert_eq!(config.motion, MotionLimits::default());
    }

    #[test]
    fn test_invalid_channel_rejected() {
        let err = SdkConfig::from_toml_str("[channel]\ncapacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
