//! # cmdring Store Layer
//!
//! 键值存储抽象层，为命令通道提供统一的存储接口。
//!
//! 命令通道只依赖 [`KvStore`] trait，具体后端可以替换：
//!
//! - [`MemoryStore`]：进程内存储，支持写入通知（测试、单进程多线程场景）
//! - `RedisStore`：Redis 后端（需要启用 `redis` feature），用于跨进程共享通道

use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

mod config;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use config::StoreConfig;
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// 字段表（Hash 值）
///
/// 使用 `BTreeMap` 保证字段按名称有序，便于日志输出和测试断言。
pub type FieldMap = BTreeMap<String, String>;

/// 存储层统一错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 对字符串键执行 Hash 操作（或反之）
    #[error("Wrong value type at key '{key}': expected {expected}")]
    WrongType { key: String, expected: &'static str },
    /// 后端错误（连接断开、协议错误等）
    #[error("Backend error: {0}")]
    Backend(#[from] StoreBackendError),
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// 后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackendErrorKind {
    Unknown,
    Unreachable,
    Closed,
    InvalidResponse,
}

/// 结构化后端错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct StoreBackendError {
    pub kind: StoreBackendErrorKind,
    pub message: String,
}

impl StoreBackendError {
    pub fn new(kind: StoreBackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            StoreBackendErrorKind::Unreachable | StoreBackendErrorKind::Closed
        )
    }
}

impl From<String> for StoreBackendError {
    fn from(message: String) -> Self {
        Self::new(StoreBackendErrorKind::Unknown, message)
    }
}

impl From<&str> for StoreBackendError {
    fn from(message: &str) -> Self {
        Self::new(StoreBackendErrorKind::Unknown, message)
    }
}

/// 共享键值存储
///
/// 所有方法都是同步、线程安全的；实现者必须保证
/// [`set_if_absent`](KvStore::set_if_absent)、[`delete`](KvStore::delete)、
/// [`delete_if_equals`](KvStore::delete_if_equals) 和 [`put_hash`](KvStore::put_hash)
/// 的原子性，命令通道的锁和读后即删语义依赖于此。
pub trait KvStore: Send + Sync {
    /// 读取字符串值
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// 写入字符串值（覆盖，并清除过期时间）
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// 删除键，返回键删除前是否存在
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// 键是否存在
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// 原子地"不存在才写入"，并设置过期时间
    ///
    /// 写入成功返回 `true`；键已存在返回 `false`。
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// 原子地"值相等才删除"
    ///
    /// 删除成功返回 `true`；键不存在或值不匹配返回 `false`。
    fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// 整体替换 Hash 值（旧字段不会残留）
    fn put_hash(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError>;

    /// 读取 Hash 的单个字段
    fn get_hash_field(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// 读取整个 Hash，键不存在时返回 `None`
    fn get_hash(&self, key: &str) -> Result<Option<FieldMap>, StoreError>;

    /// 追加字符串（键不存在时创建），返回追加后的长度
    fn append(&self, key: &str, text: &str) -> Result<usize, StoreError>;

    /// 当前写入代数（用于 [`wait_change`](KvStore::wait_change)）
    ///
    /// 不支持推送通知的后端返回常量 0。
    fn change_token(&self) -> u64 {
        0
    }

    /// 等待存储发生写入，最多等待 `timeout`
    ///
    /// `token` 为等待前通过 [`change_token`](KvStore::change_token) 取得的值；
    /// 如果其后已有写入，立即返回。默认实现直接休眠 `timeout`（轮询回退）。
    fn wait_change(&self, _token: u64, timeout: Duration) -> Result<(), StoreError> {
        spin_sleep::sleep(timeout);
        Ok(())
    }
}
