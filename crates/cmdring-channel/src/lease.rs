//! 租约锁
//!
//! 基于存储的"不存在才写入 + TTL"实现的互斥锁，保护"分配槽位 + 写入"整个过程。
//!
//! # 语义
//!
//! - 获取：原子地写入 `lock` 键（值为随机租约令牌），TTL 默认 5 秒
//! - 持有者崩溃：TTL 到期后锁自动消失，通道不会被永久卡死
//! - 释放：
//!   - [`LeaseLock::release`]：无条件删除（任何调用者都能释放别人的锁）
//!   - [`LeaseLock::release_lease`]：只有持有相同令牌的调用者才能删除
//!
//! # 注意
//!
//! 持有者的操作时间超过 TTL 时，锁可能已被其他生产者获取，
//! 此时无条件释放会删除**别人**的锁。需要严格互斥时使用 `release_lease`。

use crate::error::ChannelError;
use crate::keys;
use crate::metrics::{ChannelMetrics, WarnCadence};
use cmdring_store::KvStore;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// 租约令牌
///
/// 每次成功获取锁时随机生成，作为锁键的值保存在存储中。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseToken(u64);

impl LeaseToken {
    fn generate() -> Self {
        Self(rand::random())
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    fn encode(self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// 基于共享存储的租约锁
pub struct LeaseLock {
    store: Arc<dyn KvStore>,
    ttl: Duration,
    poll_interval: Duration,
    warn_interval: Duration,
    metrics: Arc<ChannelMetrics>,
}

impl LeaseLock {
    pub(crate) fn new(
        store: Arc<dyn KvStore>,
        ttl: Duration,
        poll_interval: Duration,
        warn_interval: Duration,
        metrics: Arc<ChannelMetrics>,
    ) -> Self {
        Self {
            store,
            ttl,
            poll_interval,
            warn_interval,
            metrics,
        }
    }

    /// 尝试获取一次（不阻塞）
    ///
    /// 锁被占用时返回 `None`。
    pub fn try_acquire(&self) -> Result<Option<LeaseToken>, ChannelError> {
        let token = LeaseToken::generate();
        if self
            .store
            .set_if_absent(keys::LOCK, &token.encode(), self.ttl)?
        {
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    /// 阻塞直到获取锁
    ///
    /// 占用期间按轮询间隔重试（支持推送通知的存储在锁释放时立即被唤醒）。
    pub fn acquire(&self) -> Result<LeaseToken, ChannelError> {
        let started = Instant::now();
        let mut cadence = WarnCadence::start(self.warn_interval, started);
        loop {
            let change = self.store.change_token();
            if let Some(token) = self.try_acquire()? {
                return Ok(token);
            }
            ChannelMetrics::incr(&self.metrics.lock_contentions);
            let now = Instant::now();
            if cadence.due(now) {
                warn!(
                    "Waiting for channel lock ({:.1}s)",
                    (now - started).as_secs_f64()
                );
            }
            self.store.wait_change(change, self.poll_interval)?;
        }
    }

    /// 无条件释放（不校验持有者）
    pub fn release(&self) -> Result<(), ChannelError> {
        self.store.delete(keys::LOCK)?;
        Ok(())
    }

    /// 校验令牌后释放
    ///
    /// 返回 `false` 表示锁已不属于该令牌（已过期，或已被其他生产者获取），存储未被修改。
    pub fn release_lease(&self, token: LeaseToken) -> Result<bool, ChannelError> {
        Ok(self.store.delete_if_equals(keys::LOCK, &token.encode())?)
    }

    /// 锁当前是否被持有
    pub fn is_held(&self) -> Result<bool, ChannelError> {
        Ok(self.store.exists(keys::LOCK)?)
    }
}
