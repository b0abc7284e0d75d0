//! 命令通道
//!
//! 提供对外的 [`CommandChannel`] 结构体：固定容量的环形槽位、租约锁、
//! 按槽位号关联的请求/响应、过期检测、批量追赶读取以及停止信号。
//!
//! 通道是显式的上下文对象，不存在全局状态；同一个存储上可以同时存在任意多个通道实例
//! （多个生产者、多个消费者），它们只通过存储中的键协作。
//!
//! # 游标
//!
//! 每个实例维护自己的游标（不共享）：
//!
//! - `last_process_command_id`：本实例最近一次看到的槽位（读取或写入）
//! - `start_process_command_id`：批量追赶读取的检查点
//!
//! 注意写入也会移动游标，因此同一个实例不会把自己刚写入的命令再读出来。

use crate::config::ChannelConfig;
use crate::error::ChannelError;
use crate::keys;
use crate::lease::{LeaseLock, LeaseToken};
use crate::metrics::{ChannelMetrics, MetricsSnapshot, WarnCadence};
use crate::record::{CommandRecord, ResponseRecord, unix_timestamp};
use crate::retry::RetryPolicy;
use crate::stop::{StopSignal, StopWatcher};
use crate::SlotId;
use cmdring_store::KvStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 水位线之后的下一个槽位
///
/// 没有水位线（从未写入）或已到达末尾时回到 0。
pub fn next_slot_id(watermark: Option<SlotId>, capacity: u32) -> SlotId {
    match watermark {
        Some(id) if id.saturating_add(1) < capacity => id + 1,
        _ => 0,
    }
}

/// 从检查点到水位线之间新写入的槽位数（按环形取模）
pub fn pending_count(checkpoint: SlotId, watermark: SlotId, capacity: u32) -> u32 {
    (i64::from(watermark) - i64::from(checkpoint)).rem_euclid(i64::from(capacity)) as u32
}

/// 批量追赶读取的结果
///
/// `start_id` 是检查点的下一个槽位，`end_id` 是最后读取的槽位加一（均不取模）。
/// 例如读取了 5、6、7 三个槽位时为 `start_id = 5, end_id = 8`；
/// 紧接着再次读取得到空批次 `start_id = 8, end_id = 8`。
/// 通道从未写入时两者都是 `None`。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandBatch {
    pub commands: Vec<CommandRecord>,
    pub start_id: Option<SlotId>,
    pub end_id: Option<SlotId>,
}

impl CommandBatch {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Debug, Default)]
struct Cursor {
    last_process_command_id: Option<SlotId>,
    start_process_command_id: Option<SlotId>,
    stale_notice_emitted: bool,
}

/// 一次请求尝试的结局
enum Awaited {
    Response(String),
    /// 超过重发间隔仍未收到响应
    Unanswered,
    /// 超过总等待上限
    Expired,
}

/// 基于共享键值存储的命令通道
pub struct CommandChannel {
    store: Arc<dyn KvStore>,
    config: ChannelConfig,
    lock: LeaseLock,
    cursor: Mutex<Cursor>,
    metrics: Arc<ChannelMetrics>,
}

impl CommandChannel {
    /// 创建通道（校验配置）
    pub fn new(store: Arc<dyn KvStore>, config: ChannelConfig) -> Result<Self, ChannelError> {
        config.validate()?;
        Ok(Self::build(store, config))
    }

    /// 使用默认配置创建通道
    pub fn with_default_config(store: Arc<dyn KvStore>) -> Self {
        Self::build(store, ChannelConfig::default())
    }

    fn build(store: Arc<dyn KvStore>, config: ChannelConfig) -> Self {
        let metrics = Arc::new(ChannelMetrics::new());
        let lock = LeaseLock::new(
            store.clone(),
            config.lock_ttl(),
            config.poll_interval(),
            config.warn_interval(),
            metrics.clone(),
        );
        Self {
            store,
            config,
            lock,
            cursor: Mutex::new(Cursor::default()),
            metrics,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn capacity(&self) -> u32 {
        self.config.capacity
    }

    /// 底层存储（多个通道实例可以共享）
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// 获取指标快照
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 清零本通道的指标计数
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    // ==================== 租约锁 ====================

    /// 尝试获取一次锁（不阻塞），成功时返回新的租约令牌
    pub fn acquire_lock(&self) -> Result<Option<LeaseToken>, ChannelError> {
        self.lock.try_acquire()
    }

    /// 轮询直到获取锁
    pub fn acquire_lock_blocking(&self) -> Result<LeaseToken, ChannelError> {
        self.lock.acquire()
    }

    /// 无条件释放锁（不校验持有者）
    pub fn release_lock(&self) -> Result<(), ChannelError> {
        self.lock.release()
    }

    /// 校验令牌后释放锁
    ///
    /// 返回 `false` 表示锁已不属于该令牌，存储未被修改。
    pub fn release_lease(&self, token: LeaseToken) -> Result<bool, ChannelError> {
        self.lock.release_lease(token)
    }

    /// 锁当前是否被持有
    pub fn is_locked(&self) -> Result<bool, ChannelError> {
        self.lock.is_held()
    }

    /// 通道内部写入路径使用的释放方式
    fn release_held(&self, token: LeaseToken) -> Result<(), ChannelError> {
        if self.config.fenced_release {
            if !self.lock.release_lease(token)? {
                warn!("Lease {} expired before release, lock left untouched", token);
            }
            Ok(())
        } else {
            self.lock.release()
        }
    }

    // ==================== 水位线 ====================

    fn read_watermark(&self) -> Result<Option<SlotId>, ChannelError> {
        match self.store.get(keys::WATERMARK)? {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<SlotId>()
                .map(Some)
                .map_err(|e| ChannelError::Corrupt {
                    key: keys::WATERMARK.to_string(),
                    reason: format!("{:?} is not a slot id: {}", raw, e),
                }),
        }
    }

    /// 获取水位线（最近写入的槽位）
    ///
    /// 通道从未写入时：`wait = true` 轮询直到出现，`wait = false` 立即返回 `None`。
    pub fn get_last_command_id(&self, wait: bool) -> Result<Option<SlotId>, ChannelError> {
        loop {
            let change = self.store.change_token();
            let watermark = self.read_watermark()?;
            if watermark.is_some() || !wait {
                return Ok(watermark);
            }
            self.store.wait_change(change, self.config.poll_interval())?;
        }
    }

    /// 等待水位线变为 `current` 以外的值
    fn wait_for_new_watermark(&self, current: SlotId) -> Result<SlotId, ChannelError> {
        loop {
            let change = self.store.change_token();
            if let Some(id) = self.read_watermark()?
                && id != current
            {
                return Ok(id);
            }
            self.store.wait_change(change, self.config.poll_interval())?;
        }
    }

    fn check_slot(&self, id: SlotId) -> Result<(), ChannelError> {
        if id >= self.config.capacity {
            return Err(ChannelError::SlotOutOfRange {
                id,
                capacity: self.config.capacity,
            });
        }
        Ok(())
    }

    // ==================== 生产者 ====================

    /// 写入一条命令，不等待执行结果
    ///
    /// - `id`：目标槽位；`None` 时取水位线的下一个槽位
    /// - `with_lock`：是否在分配和写入期间持有租约锁（调用方已持有锁时传 `false`）
    ///
    /// 返回实际写入的槽位。
    pub fn set_command(
        &self,
        content: impl Into<CommandRecord>,
        id: Option<SlotId>,
        with_lock: bool,
    ) -> Result<SlotId, ChannelError> {
        if let Some(id) = id {
            self.check_slot(id)?;
        }
        let record = content.into();
        let lease = if with_lock {
            Some(self.lock.acquire()?)
        } else {
            None
        };

        let written = self.allocate_and_write(record, id);

        if let Some(token) = lease {
            self.release_held(token)?;
        }
        written
    }

    fn allocate_and_write(
        &self,
        record: CommandRecord,
        id: Option<SlotId>,
    ) -> Result<SlotId, ChannelError> {
        let id = match id {
            Some(id) => id,
            None => next_slot_id(self.read_watermark()?, self.config.capacity),
        };
        self.write_slot(id, record)?;
        Ok(id)
    }

    /// 加盖时间戳，写入槽位并推进水位线
    fn write_slot(&self, id: SlotId, record: CommandRecord) -> Result<(), ChannelError> {
        let record = record.stamped(unix_timestamp());
        self.store.put_hash(&keys::slot(id), record.fields())?;
        self.store.set(keys::WATERMARK, &id.to_string())?;
        self.cursor.lock().last_process_command_id = Some(id);
        ChannelMetrics::incr(&self.metrics.commands_written);
        debug!("Wrote slot {}: {}", id, record.msg().unwrap_or(""));
        Ok(())
    }

    /// 写入执行结果（消费者调用，不加锁）
    pub fn set_result(&self, result: ResponseRecord, id: SlotId) -> Result<(), ChannelError> {
        self.check_slot(id)?;
        let result = result.stamped(unix_timestamp());
        self.store.put_hash(&keys::response(id), result.fields())?;
        ChannelMetrics::incr(&self.metrics.results_written);
        debug!("Wrote response {}: {}", id, result.result().unwrap_or(""));
        Ok(())
    }

    /// 读取槽位的响应记录（不阻塞）
    pub fn get_response(&self, id: SlotId) -> Result<Option<ResponseRecord>, ChannelError> {
        Ok(self
            .store
            .get_hash(&keys::response(id))?
            .map(ResponseRecord::from_fields))
    }

    /// 写入命令并阻塞等待执行结果
    ///
    /// 重试策略按命令类别从配置的重试表中查找，见 [`RetryTable`](crate::RetryTable)。
    pub fn request_command(&self, content: impl Into<CommandRecord>) -> Result<String, ChannelError> {
        let record = content.into();
        let policy = self.config.retry.policy_for(record.kind()).clone();
        self.request_command_with(record, &policy)
    }

    /// 使用指定重试策略的 [`request_command`](Self::request_command)
    pub fn request_command_with(
        &self,
        content: impl Into<CommandRecord>,
        policy: &RetryPolicy,
    ) -> Result<String, ChannelError> {
        let record = content.into();
        let kind = record.kind().to_string();
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            if attempts > 0 && !policy.backoff().is_zero() {
                spin_sleep::sleep(policy.backoff());
            }
            let slot = self.submit_request(record.clone())?;
            attempts += 1;

            match self.await_response(slot, &kind, policy, started)? {
                Awaited::Response(result) => {
                    ChannelMetrics::incr(&self.metrics.requests_completed);
                    return Ok(result);
                },
                Awaited::Unanswered if policy.allows_another_attempt(attempts) => {
                    ChannelMetrics::incr(&self.metrics.request_resends);
                    warn!(
                        "Request '{}' on slot {} seems lost, resending (attempt {})",
                        kind,
                        slot,
                        attempts + 1
                    );
                },
                Awaited::Unanswered | Awaited::Expired => {
                    ChannelMetrics::incr(&self.metrics.request_timeouts);
                    return Err(ChannelError::RequestTimedOut {
                        kind,
                        slot,
                        attempts,
                    });
                },
            }
        }
    }

    /// 在锁内分配槽位、清除上一轮的响应、写入命令
    fn submit_request(&self, record: CommandRecord) -> Result<SlotId, ChannelError> {
        let token = self.lock.acquire()?;
        let submitted = self.submit_locked(record);
        self.release_held(token)?;
        submitted
    }

    fn submit_locked(&self, record: CommandRecord) -> Result<SlotId, ChannelError> {
        let id = next_slot_id(self.read_watermark()?, self.config.capacity);
        if self.store.delete(&keys::response(id))? {
            debug!("Dropped leftover response for slot {}", id);
        }
        self.write_slot(id, record)?;
        Ok(id)
    }

    fn await_response(
        &self,
        slot: SlotId,
        kind: &str,
        policy: &RetryPolicy,
        started: Instant,
    ) -> Result<Awaited, ChannelError> {
        let key = keys::response(slot);
        let attempt_started = Instant::now();
        let mut cadence = WarnCadence::start(self.config.warn_interval(), attempt_started);

        loop {
            let change = self.store.change_token();
            if let Some(fields) = self.store.get_hash(&key)? {
                return match ResponseRecord::from_fields(fields).into_result() {
                    Some(result) => Ok(Awaited::Response(result)),
                    None => Err(ChannelError::Corrupt {
                        key,
                        reason: "response has no 'result' field".to_string(),
                    }),
                };
            }
            if policy.deadline().is_some_and(|d| started.elapsed() >= d) {
                return Ok(Awaited::Expired);
            }
            if policy
                .resend_after()
                .is_some_and(|d| attempt_started.elapsed() >= d)
            {
                return Ok(Awaited::Unanswered);
            }

            let now = Instant::now();
            if cadence.due(now) {
                warn!(
                    "Still waiting for '{}' on slot {} ({:.1}s)",
                    kind,
                    slot,
                    (now - attempt_started).as_secs_f64()
                );
            }
            self.store
                .wait_change(change, self.config.poll_interval())?;
        }
    }

    // ==================== 消费者 ====================

    /// 读取指定槽位（不阻塞，不做过期检查）
    pub fn get_commands_by_id(&self, id: SlotId) -> Result<Option<CommandRecord>, ChannelError> {
        Ok(self
            .store
            .get_hash(&keys::slot(id))?
            .map(CommandRecord::from_fields))
    }

    /// 读取本实例尚未看到的最新命令
    ///
    /// - 水位线等于游标（没有新命令）：`wait = true` 时等待水位线变化，否则返回 `None`
    /// - 最新命令已过期（年龄 `>= timeout`，`None` 时取配置值）：
    ///   输出一次过期提示；`wait = true` 时跳过它，等待下一条命令，否则返回 `None`
    /// - 否则移动游标并返回 `(命令, 槽位)`
    ///
    /// 等待得到的下一条命令不再做过期检查。
    pub fn get_last_command_with_id(
        &self,
        wait: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<(CommandRecord, SlotId)>, ChannelError> {
        let timeout_secs = timeout
            .unwrap_or_else(|| self.config.stale_timeout())
            .as_secs_f64();

        let Some(last_id) = self.get_last_command_id(wait)? else {
            return Ok(None);
        };

        let seen = self.cursor.lock().last_process_command_id;
        if seen == Some(last_id) {
            if !wait {
                return Ok(None);
            }
            return self.next_after(last_id).map(Some);
        }

        let record = self.get_commands_by_id(last_id)?.unwrap_or_default();
        let now = unix_timestamp();
        if record.is_stale(now, timeout_secs) {
            ChannelMetrics::incr(&self.metrics.stale_skips);
            self.note_stale(last_id, &record, now);
            if !wait {
                return Ok(None);
            }
            return self.next_after(last_id).map(Some);
        }

        self.cursor.lock().last_process_command_id = Some(last_id);
        Ok(Some((record, last_id)))
    }

    /// 与 [`get_last_command_with_id`](Self::get_last_command_with_id) 相同，只返回命令
    pub fn get_last_command(
        &self,
        wait: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<CommandRecord>, ChannelError> {
        Ok(self
            .get_last_command_with_id(wait, timeout)?
            .map(|(record, _)| record))
    }

    fn next_after(&self, last_id: SlotId) -> Result<(CommandRecord, SlotId), ChannelError> {
        let new_id = self.wait_for_new_watermark(last_id)?;
        self.cursor.lock().last_process_command_id = Some(new_id);
        let record = self.get_commands_by_id(new_id)?.unwrap_or_default();
        Ok((record, new_id))
    }

    fn note_stale(&self, id: SlotId, record: &CommandRecord, now: f64) {
        let mut cursor = self.cursor.lock();
        if cursor.stale_notice_emitted {
            return;
        }
        cursor.stale_notice_emitted = true;
        match record.age(now) {
            Some(age) => warn!("Command in slot {} is stale ({:.3}s old)", id, age),
            None => warn!("Command in slot {} has no timestamp, treated as stale", id),
        }
    }

    /// 批量追赶读取
    ///
    /// 首次调用只设置检查点（当前水位线）并返回空批次；之后每次返回检查点之后
    /// 到水位线为止的全部槽位（按槽位顺序，环形回绕），并把检查点推进到水位线。
    /// 不检查单条命令是否过期。
    pub fn get_last_commands(&self) -> Result<CommandBatch, ChannelError> {
        let Some(watermark) = self.read_watermark()? else {
            return Ok(CommandBatch::default());
        };
        let capacity = self.config.capacity;

        let mut cursor = self.cursor.lock();
        let checkpoint = *cursor.start_process_command_id.get_or_insert(watermark);
        let count = pending_count(checkpoint, watermark, capacity);

        let mut commands = Vec::with_capacity(count as usize);
        let mut current = checkpoint;
        for offset in 1..=count {
            current = ((u64::from(checkpoint) + u64::from(offset)) % u64::from(capacity)) as SlotId;
            match self.get_commands_by_id(current)? {
                Some(record) => commands.push(record),
                None => {
                    warn!("Slot {} is empty during catch-up", current);
                    commands.push(CommandRecord::default());
                },
            }
        }
        cursor.start_process_command_id = Some(watermark);

        Ok(CommandBatch {
            commands,
            start_id: Some(checkpoint.saturating_add(1)),
            end_id: Some(current.saturating_add(1)),
        })
    }

    // ==================== 停止信号 ====================

    /// 停止信号句柄（与本通道共享存储）
    pub fn stop_signal(&self) -> StopSignal {
        StopSignal::new(self.store.clone(), self.config.poll_interval())
    }

    pub fn set_task_stop(&self) -> Result<(), ChannelError> {
        self.stop_signal().raise()
    }

    /// 读取并清除停止标志（每次设置最多被观察到一次）
    pub fn is_task_stop_set(&self) -> Result<bool, ChannelError> {
        self.stop_signal().take()
    }

    pub fn unset_task_stop(&self) -> Result<(), ChannelError> {
        self.stop_signal().clear()
    }

    /// 追加停止信息，返回追加后的长度
    pub fn write_stop_info(&self, info: &str) -> Result<usize, ChannelError> {
        self.stop_signal().write_info(info)
    }

    /// 阻塞直到停止信息非空，返回全部内容（不清除）
    pub fn get_stop_info(&self) -> Result<String, ChannelError> {
        self.stop_signal().wait_info()
    }

    pub fn clear_stop_info(&self) -> Result<(), ChannelError> {
        self.stop_signal().clear_info()
    }

    /// 启动后台线程监视停止标志
    pub fn watch_stop(&self) -> StopWatcher {
        self.stop_signal().watch()
    }

    // ==================== 维护 ====================

    /// 删除单个键，返回键是否存在
    pub fn clean_key(&self, key: &str) -> Result<bool, ChannelError> {
        Ok(self.store.delete(key)?)
    }

    /// 删除通道的全部键（槽位、响应、水位线、锁、停止标志与信息），并重置本实例游标
    pub fn reset(&self) -> Result<(), ChannelError> {
        for id in 0..self.config.capacity {
            self.store.delete(&keys::slot(id))?;
            self.store.delete(&keys::response(id))?;
        }
        for key in [
            keys::WATERMARK,
            keys::LOCK,
            keys::TASK_STOP,
            keys::TASK_STOP_INFO,
        ] {
            self.store.delete(key)?;
        }
        *self.cursor.lock() = Cursor::default();
        info!("Channel reset ({} slots)", self.config.capacity);
        Ok(())
    }
}
