//! cmdring SDK - 基于共享键值存储的机器人命令通道
//!
//! 生产者（遥操作前端、任务脚本）和执行端（驱动机器人的进程）通过一个共享存储交换命令：
//! 命令写入固定容量的环形槽位，执行结果按槽位号写回。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **存储层** (`store`): `KvStore` trait，进程内后端和 Redis 后端（`redis` feature）
//! - **通道层** (`channel`): 环形槽位、租约锁、请求/响应、过期检测、批量读取、停止信号
//! - **命令层** (`commander`): 底盘命令语法、速度量化与去重、手柄输入节流
//!
//! # 快速开始
//!
//! ```rust
//! use cmdring_sdk::prelude::*;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
//! let producer = CommandChannel::with_default_config(store.clone());
//! let consumer = CommandConsumer::new(CommandChannel::with_default_config(store));
//!
//! let executor = thread::spawn(move || {
//!     let command = consumer.next(true).unwrap().unwrap();
//!     consumer.reply(&command, "ok").unwrap();
//! });
//!
//! let result = producer.request_command("set_movebase_mode,stay_at_location_mode")?;
//! assert_eq!(result, "ok");
//! executor.join().unwrap();
//! # Ok::<(), ChannelError>(())
//! ```

pub use cmdring_channel as channel;
pub use cmdring_commander as commander;
pub use cmdring_store as store;

pub mod config;
pub mod logging;
pub mod prelude;

pub use config::SdkConfig;

use channel::{ChannelError, CommandChannel};
use commander::{InputThrottle, MotionCommander};
use std::sync::Arc;
use store::KvStore;

/// 连接配置中的 Redis 存储
#[cfg(feature = "redis")]
pub fn open_store(config: &store::StoreConfig) -> Result<Arc<dyn KvStore>, store::StoreError> {
    let store = store::RedisStore::connect(config)?;
    tracing::info!("Connected to {}", config.url());
    Ok(Arc::new(store))
}

/// 按配置创建通道
pub fn open_channel(
    store: Arc<dyn KvStore>,
    config: &SdkConfig,
) -> Result<CommandChannel, ChannelError> {
    CommandChannel::new(store, config.channel.clone())
}

/// 按配置创建运动命令门面和输入节流器
pub fn open_commander(
    store: Arc<dyn KvStore>,
    config: &SdkConfig,
) -> Result<(MotionCommander, InputThrottle), ChannelError> {
    let channel = open_channel(store, config)?;
    Ok((
        MotionCommander::with_limits(channel, config.motion.clone()),
        InputThrottle::new(config.throttle.clone()),
    ))
}
