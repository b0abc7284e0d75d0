//! 子命令实现

pub mod channel;
pub mod drive;
pub mod serve;
pub mod stop;

pub use channel::{RequestCommand, SendCommand, TailCommand};
pub use drive::DriveCommand;
pub use serve::ServeCommand;
pub use stop::{StopCommand, StopInfoCommand};

use anyhow::{Context, Result};
use clap::Args;
use cmdring_sdk::SdkConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 连接参数（覆盖配置文件）
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// TOML 配置文件
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Redis 主机
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Redis 端口
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// 命名空间编号（Redis 数据库索引）
    #[arg(long, global = true)]
    pub db: Option<u32>,
}

impl ConnectArgs {
    /// 读取配置文件（若有），再应用命令行覆盖
    pub fn load(&self) -> Result<SdkConfig> {
        let mut config = match &self.config {
            Some(path) => SdkConfig::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SdkConfig::default(),
        };
        if let Some(host) = &self.host {
            config.store.host = host.clone();
        }
        if let Some(port) = self.port {
            config.store.port = port;
        }
        if let Some(db) = self.db {
            config.store.db = db;
        }
        Ok(config)
    }
}

/// 安装 Ctrl+C 处理器，返回运行标志
pub fn running_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        flag.store(false, Ordering::Release);
    })
    .context("installing Ctrl+C handler")?;
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_on_defaults() {
        let args = ConnectArgs {
            config: None,
            host: Some("192.168.1.15".to_string()),
            port: None,
            db: Some(6),
        };
        let config = args.load().unwrap();
        assert_eq!(config.store.url(), "redis://192.168.1.15:6379/6");
    }

    #[test]
    fn test_missing_config_file() {
        let args = ConnectArgs {
            config: Some(PathBuf::from("/nonexistent/cmdring.toml")),
            host: None,
            port: None,
            db: None,
        };
        assert!(args.load().is_err());
    }
}
