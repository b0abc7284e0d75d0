//! # cmdring Channel Layer
//!
//! 共享键值存储之上的命令/响应通道。
//!
//! 生产者把命令写入固定容量的环形槽位并推进水位线；消费者读取最新命令、执行后
//! 以 `<id>_r` 写回结果；生产者按槽位号等待结果。一个带 TTL 的租约锁保护
//! "分配槽位 + 写入"，持有者崩溃后锁会自动过期。
//!
//! ```rust
//! use cmdring_channel::{CommandChannel, ResponseRecord};
//! use cmdring_store::{KvStore, MemoryStore};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
//! let producer = CommandChannel::with_default_config(store.clone());
//! let consumer = CommandChannel::with_default_config(store);
//!
//! let id = producer.set_command("set_movebase_mode,stay_at_location_mode", None, true)?;
//! let (record, seen) = consumer.get_last_command_with_id(false, None)?.unwrap();
//! assert_eq!(seen, id);
//! assert_eq!(record.kind(), "set_movebase_mode");
//!
//! consumer.set_result(ResponseRecord::new("ok"), seen)?;
//! assert_eq!(producer.get_response(id)?.unwrap().result(), Some("ok"));
//! # Ok::<(), cmdring_channel::ChannelError>(())
//! ```

mod channel;
mod config;
mod consumer;
mod error;
pub mod keys;
mod lease;
mod metrics;
mod record;
mod retry;
mod stop;

/// 槽位号，取值范围 `0..capacity`
pub type SlotId = u32;

pub use channel::{CommandBatch, CommandChannel, next_slot_id, pending_count};
pub use config::ChannelConfig;
pub use consumer::{CommandConsumer, PendingCommand};
pub use error::{ChannelError, ConfigError};
pub use lease::{LeaseLock, LeaseToken};
pub use metrics::{ChannelMetrics, MetricsSnapshot};
pub use record::{
    CommandRecord, MSG_FIELD, RESULT_FIELD, ResponseRecord, TIMESTAMP_FIELD, unix_timestamp,
};
pub use retry::{
    DEFAULT_DEADLINE_MS, DEFAULT_RESEND_AFTER_MS, DEFAULT_RESEND_KINDS, RetryPolicy, RetryTable,
};
pub use stop::{StopSignal, StopWatcher};
