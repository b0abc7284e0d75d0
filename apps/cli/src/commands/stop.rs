//! 停止信号命令

use anyhow::Result;
use clap::Args;
use cmdring_sdk::SdkConfig;
use cmdring_sdk::prelude::*;
use std::sync::Arc;

/// 停止参数
#[derive(Args, Debug)]
pub struct StopCommand {
    /// 随停止标志一起写入的说明
    #[arg(long)]
    pub info: Option<String>,

    /// 撤销尚未被观察到的停止标志
    #[arg(long, conflicts_with = "info")]
    pub cancel: bool,
}

impl StopCommand {
    pub fn execute(&self, store: Arc<dyn KvStore>, config: &SdkConfig) -> Result<()> {
        let channel = cmdring_sdk::open_channel(store, config)?;
        if self.cancel {
            channel.unset_task_stop()?;
            println!("Stop flag cleared");
            return Ok(());
        }
        if let Some(info) = &self.info {
            channel.write_stop_info(info)?;
        }
        channel.set_task_stop()?;
        println!("Stop flag set");
        Ok(())
    }
}

/// 停止信息参数
#[derive(Args, Debug)]
pub struct StopInfoCommand {
    /// 清除停止信息
    #[arg(long)]
    pub clear: bool,

    /// 没有信息时立即返回，而不是阻塞等待
    #[arg(long)]
    pub no_wait: bool,
}

impl StopInfoCommand {
    pub fn execute(&self, store: Arc<dyn KvStore>, config: &SdkConfig) -> Result<()> {
        let channel = cmdring_sdk::open_channel(store, config)?;
        if self.clear {
            channel.clear_stop_info()?;
            return Ok(());
        }
        let info = if self.no_wait {
            channel.stop_signal().info()?.unwrap_or_default()
        } else {
            channel.get_stop_info()?
        };
        println!("{}", info);
        Ok(())
    }
}
