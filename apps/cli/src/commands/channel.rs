//! 生产者侧命令：发送、请求、观察

use anyhow::Result;
use clap::Args;
use cmdring_sdk::SdkConfig;
use cmdring_sdk::prelude::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

/// 发送命令参数
#[derive(Args, Debug)]
pub struct SendCommand {
    /// 命令文本，例如 `set_movebase_mode,push_mode`
    pub msg: String,

    /// 写入指定槽位（默认写入下一个槽位）
    #[arg(long)]
    pub slot: Option<SlotId>,

    /// 不获取租约锁
    #[arg(long)]
    pub no_lock: bool,
}

impl SendCommand {
    pub fn execute(&self, store: Arc<dyn KvStore>, config: &SdkConfig) -> Result<()> {
        let channel = cmdring_sdk::open_channel(store, config)?;
        let id = channel.set_command(self.msg.as_str(), self.slot, !self.no_lock)?;
        println!("{}", id);
        Ok(())
    }
}

/// 请求参数
#[derive(Args, Debug)]
pub struct RequestCommand {
    /// 命令文本
    pub msg: String,

    /// 总等待上限（毫秒），覆盖配置中的重试策略
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl RequestCommand {
    pub fn execute(&self, store: Arc<dyn KvStore>, config: &SdkConfig) -> Result<()> {
        let channel = cmdring_sdk::open_channel(store, config)?;
        let result = match self.timeout_ms {
            Some(ms) => {
                let record = CommandRecord::new(self.msg.as_str());
                let policy = config
                    .channel
                    .retry
                    .policy_for(record.kind())
                    .clone()
                    .with_deadline(Some(Duration::from_millis(ms)));
                channel.request_command_with(record, &policy)?
            },
            None => channel.request_command(self.msg.as_str())?,
        };
        println!("{}", result);
        Ok(())
    }
}

/// 观察参数
#[derive(Args, Debug)]
pub struct TailCommand {
    /// 两次追赶读取之间的间隔（毫秒）
    #[arg(long, default_value_t = 200)]
    pub interval_ms: u64,

    /// 同时打印完整字段（JSON）
    #[arg(long)]
    pub fields: bool,
}

impl TailCommand {
    pub fn execute(&self, store: Arc<dyn KvStore>, config: &SdkConfig) -> Result<()> {
        let consumer = CommandConsumer::new(cmdring_sdk::open_channel(store, config)?);
        let running = super::running_flag()?;

        // 首次追赶只建立检查点
        consumer.catch_up()?;
        while running.load(Ordering::Acquire) {
            for command in consumer.catch_up()? {
                if self.fields {
                    let fields = serde_json::to_string(command.record.fields())?;
                    println!("[{}] {}", command.id, fields);
                } else {
                    println!("[{}] {}", command.id, command.msg());
                }
            }
            thread::sleep(Duration::from_millis(self.interval_ms));
        }
        Ok(())
    }
}
