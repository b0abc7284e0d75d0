//! 通道指标模块
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 通道实时指标
///
/// # 使用示例
///
/// ```rust
/// use cmdring_channel::ChannelMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = ChannelMetrics::default();
/// metrics.commands_written.fetch_add(1, Ordering::Relaxed);
///
/// let snapshot = metrics.snapshot();
/// assert_eq!(snapshot.commands_written, 1);
/// ```
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    /// 写入槽位的命令数
    pub commands_written: AtomicU64,

    /// 写回的响应数
    pub results_written: AtomicU64,

    /// 收到响应的请求数
    pub requests_completed: AtomicU64,

    /// 因疑似丢失而整体重发的次数
    pub request_resends: AtomicU64,

    /// 重试策略用尽而超时的请求数
    pub request_timeouts: AtomicU64,

    /// 获取租约锁时遇到占用的次数
    ///
    /// 快速增长说明生产者过多，或某个持有者崩溃后正在等待 TTL 过期。
    pub lock_contentions: AtomicU64,

    /// 因过期而跳过的命令数
    pub stale_skips: AtomicU64,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取快照
    ///
    /// 各计数器分别原子读取，计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_written: self.commands_written.load(Ordering::Relaxed),
            results_written: self.results_written.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            request_resends: self.request_resends.load(Ordering::Relaxed),
            request_timeouts: self.request_timeouts.load(Ordering::Relaxed),
            lock_contentions: self.lock_contentions.load(Ordering::Relaxed),
            stale_skips: self.stale_skips.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.commands_written.store(0, Ordering::Relaxed);
        self.results_written.store(0, Ordering::Relaxed);
        self.requests_completed.store(0, Ordering::Relaxed);
        self.request_resends.store(0, Ordering::Relaxed);
        self.request_timeouts.store(0, Ordering::Relaxed);
        self.lock_contentions.store(0, Ordering::Relaxed);
        self.stale_skips.store(0, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub commands_written: u64,
    pub results_written: u64,
    pub requests_completed: u64,
    pub request_resends: u64,
    pub request_timeouts: u64,
    pub lock_contentions: u64,
    pub stale_skips: u64,
}

/// 等待循环的告警节拍
///
/// 按经过的时间计算，与存储唤醒的次数无关。
#[derive(Debug)]
pub(crate) struct WarnCadence {
    interval: Duration,
    next_at: Instant,
}

impl WarnCadence {
    pub(crate) fn start(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_at: now + interval,
        }
    }

    /// 到期时返回 `true` 并进入下一个周期
    pub(crate) fn due(&mut self, now: Instant) -> bool {
        if now < self.next_at {
            return false;
        }
        self.next_at = now + self.interval;
        true
    }
}
