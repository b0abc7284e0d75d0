//! 回显执行端
//!
//! 用于联调生产者：对每条新命令写回固定结果（或命令文本本身）。

use anyhow::Result;
use clap::Args;
use cmdring_sdk::SdkConfig;
use cmdring_sdk::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 执行端参数
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// 写回的结果；不指定时回显命令文本
    #[arg(long)]
    pub reply: Option<String>,

    /// 过期时间（秒），覆盖配置
    #[arg(long)]
    pub stale_secs: Option<f64>,
}

impl ServeCommand {
    pub fn execute(&self, store: Arc<dyn KvStore>, config: &SdkConfig) -> Result<()> {
        let mut consumer = CommandConsumer::new(cmdring_sdk::open_channel(store, config)?);
        if let Some(secs) = self.stale_secs {
            consumer = consumer.with_stale_timeout(Duration::try_from_secs_f64(secs)?);
        }
        let running = super::running_flag()?;

        let served = consumer.serve(&running, |command| {
            println!("[{}] {}", command.id, command.msg());
            self.reply
                .clone()
                .unwrap_or_else(|| command.msg().to_string())
        })?;
        info!("Served {} command(s)", served);
        Ok(())
    }
}
