//! 消费者辅助
//!
//! 执行端（真正驱动机器人的进程）的典型循环：读取最新命令 → 执行 → 写回结果。
//! [`CommandConsumer`] 把这一循环封装起来，执行逻辑由调用方以闭包形式提供。

use crate::SlotId;
use crate::channel::CommandChannel;
use crate::error::ChannelError;
use crate::record::{CommandRecord, ResponseRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// `serve` 检查运行标志的最大间隔
const SERVE_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// 已读取、等待执行的命令
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    pub id: SlotId,
    pub record: CommandRecord,
}

impl PendingCommand {
    pub fn msg(&self) -> &str {
        self.record.msg().unwrap_or("")
    }

    pub fn kind(&self) -> &str {
        self.record.kind()
    }

    /// 写回执行结果
    pub fn reply(
        &self,
        channel: &CommandChannel,
        result: impl Into<String>,
    ) -> Result<(), ChannelError> {
        channel.set_result(ResponseRecord::new(result), self.id)
    }
}

/// 命令消费者
pub struct CommandConsumer {
    channel: CommandChannel,
    stale_timeout: Option<Duration>,
}

impl CommandConsumer {
    pub fn new(channel: CommandChannel) -> Self {
        Self {
            channel,
            stale_timeout: None,
        }
    }

    /// 覆盖通道配置中的过期时间
    pub fn with_stale_timeout(mut self, timeout: Duration) -> Self {
        self.stale_timeout = Some(timeout);
        self
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    /// 读取下一条新命令
    ///
    /// 语义与 [`CommandChannel::get_last_command_with_id`] 相同。
    pub fn next(&self, wait: bool) -> Result<Option<PendingCommand>, ChannelError> {
        Ok(self
            .channel
            .get_last_command_with_id(wait, self.stale_timeout)?
            .map(|(record, id)| PendingCommand { id, record }))
    }

    /// 最多等待 `max_wait` 读取下一条新命令
    pub fn poll(&self, max_wait: Duration) -> Result<Option<PendingCommand>, ChannelError> {
        let deadline = Instant::now() + max_wait;
        let store = self.channel.store();
        loop {
            let change = store.change_token();
            if let Some(command) = self.next(false)? {
                return Ok(Some(command));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wait = self.channel.config().poll_interval().min(deadline - now);
            store.wait_change(change, wait)?;
        }
    }

    /// 写回执行结果
    pub fn reply(
        &self,
        command: &PendingCommand,
        result: impl Into<String>,
    ) -> Result<(), ChannelError> {
        command.reply(&self.channel, result)
    }

    /// 批量读取自上次检查点以来的全部命令，附带槽位号
    ///
    /// 首次调用只建立检查点，返回空列表。
    pub fn catch_up(&self) -> Result<Vec<PendingCommand>, ChannelError> {
        let batch = self.channel.get_last_commands()?;
        let Some(start_id) = batch.start_id else {
            return Ok(Vec::new());
        };
        let capacity = u64::from(self.channel.capacity());
        Ok(batch
            .commands
            .into_iter()
            .enumerate()
            .map(|(offset, record)| PendingCommand {
                id: ((u64::from(start_id) + offset as u64) % capacity) as SlotId,
                record,
            })
            .collect())
    }

    /// 执行循环：直到 `running` 变为 `false`
    ///
    /// 每条新命令调用一次 `handler`，其返回值作为执行结果写回。
    /// 返回处理的命令数。
    pub fn serve<F>(&self, running: &AtomicBool, mut handler: F) -> Result<u64, ChannelError>
    where
        F: FnMut(&PendingCommand) -> String,
    {
        let mut served: u64 = 0;
        info!("Consumer loop started");
        while running.load(Ordering::Acquire) {
            let Some(command) = self.poll(SERVE_CHECK_INTERVAL)? else {
                continue;
            };
            debug!("Executing slot {}: {}", command.id, command.msg());
            let result = handler(&command);
            self.reply(&command, result)?;
            served += 1;
        }
        info!("Consumer loop stopped after {} command(s)", served);
        Ok(served)
    }
}
