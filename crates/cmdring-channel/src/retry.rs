//! 请求重试策略
//!
//! `request_command` 在等待响应时按命令类别查找 [`RetryPolicy`]：
//! 未收到响应多久后重发、最多尝试几次、两次尝试间的退避、总等待上限。
//! 策略用尽时返回 [`ChannelError::RequestTimedOut`](crate::ChannelError::RequestTimedOut)。
//!
//! 所有时长字段以毫秒表示，`0` 表示"不启用/不限"，便于在 TOML 中书写。

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// 默认总等待上限：30 分钟
pub const DEFAULT_DEADLINE_MS: u64 = 30 * 60 * 1000;

/// 关键查询命令的默认重发间隔（200 次 × 30ms 轮询）
pub const DEFAULT_RESEND_AFTER_MS: u64 = 6_000;

/// 默认启用重发的查询类命令
///
/// 这些命令没有副作用，响应丢失时整体重发是安全的。
pub const DEFAULT_RESEND_KINDS: [&str; 4] = [
    "get_neck_transformer",
    "get_movebase_enable_status",
    "get_robot_busy_state",
    "check_neck_using_priority",
];

/// 单类命令的重试策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 未收到响应多久后整体重发（新槽位、新等待），0 = 从不重发
    pub resend_after_ms: u64,
    /// 最大尝试次数（含首次），0 = 不限
    pub max_attempts: u32,
    /// 两次尝试之间的退避
    pub backoff_ms: u64,
    /// 从首次提交算起的总等待上限，0 = 无限等待
    pub deadline_ms: u64,
}

impl Default for RetryPolicy {
    /// 不重发，30 分钟后超时
    fn default() -> Self {
        Self {
            resend_after_ms: 0,
            max_attempts: 0,
            backoff_ms: 0,
            deadline_ms: DEFAULT_DEADLINE_MS,
        }
    }
}

impl RetryPolicy {
    /// 不重发、无限等待
    pub fn wait_forever() -> Self {
        Self {
            deadline_ms: 0,
            ..Self::default()
        }
    }

    /// 每隔 `after` 未收到响应就重发
    pub fn resend_every(after: Duration) -> Self {
        Self {
            resend_after_ms: after.as_millis() as u64,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff_ms = backoff.as_millis() as u64;
        self
    }

    /// 设置总等待上限（`None` = 无限等待）
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline_ms = deadline.map_or(0, |d| (d.as_millis() as u64).max(1));
        self
    }

    pub fn resend_after(&self) -> Option<Duration> {
        (self.resend_after_ms > 0).then(|| Duration::from_millis(self.resend_after_ms))
    }

    pub fn max_attempts(&self) -> Option<u32> {
        (self.max_attempts > 0).then_some(self.max_attempts)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms))
    }

    /// 已尝试 `attempts` 次后是否还允许再尝试
    pub fn allows_another_attempt(&self, attempts: u32) -> bool {
        self.max_attempts().is_none_or(|max| attempts < max)
    }
}

/// 按命令类别索引的重试策略表
///
/// ```toml
/// [channel.retry.default]
/// deadline_ms = 60000
///
/// [channel.retry.kinds.get_robot_busy_state]
/// resend_after_ms = 6000
/// max_attempts = 5
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryTable {
    /// 未单独配置的命令类别使用的策略
    pub default: RetryPolicy,
    /// 命令类别 → 策略
    pub kinds: BTreeMap<String, RetryPolicy>,
}

impl Default for RetryTable {
    fn default() -> Self {
        // 查询类命令不设总等待上限，按间隔一直重发
        let resend = RetryPolicy::resend_every(Duration::from_millis(DEFAULT_RESEND_AFTER_MS))
            .with_deadline(None);
        Self {
            default: RetryPolicy::default(),
            kinds: DEFAULT_RESEND_KINDS
                .iter()
                .map(|kind| (kind.to_string(), resend.clone()))
                .collect(),
        }
    }
}

impl RetryTable {
    /// 空表：所有命令使用同一策略
    pub fn uniform(policy: RetryPolicy) -> Self {
        Self {
            default: policy,
            kinds: BTreeMap::new(),
        }
    }

    pub fn with_policy(mut self, kind: impl Into<String>, policy: RetryPolicy) -> Self {
        self.kinds.insert(kind.into(), policy);
        self
    }

    /// 查找命令类别对应的策略
    pub fn policy_for(&self, kind: &str) -> &RetryPolicy {
        self.kinds.get(kind).unwrap_or(&self.default)
    }
}
