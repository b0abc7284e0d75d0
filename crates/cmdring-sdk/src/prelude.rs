//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use cmdring_sdk::prelude::*;
//! ```

// 通道层（生产者与消费者）
pub use crate::channel::{
    ChannelConfig, CommandBatch, CommandChannel, CommandConsumer, CommandRecord, PendingCommand,
    ResponseRecord, RetryPolicy, RetryTable, SlotId,
};

// 命令层
pub use crate::commander::{InputThrottle, MotionCommander, MoveBaseCommand, MoveBaseMode};

// 存储层（常用 Trait 与进程内后端）
pub use crate::store::{KvStore, MemoryStore, StoreConfig};

// 错误类型
pub use crate::channel::ChannelError;
pub use crate::commander::CommanderError;
pub use crate::store::StoreError;
