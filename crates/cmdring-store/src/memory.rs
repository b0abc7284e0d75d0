//! 进程内存储后端
//!
//! 语义与 Redis 保持一致（字符串/Hash 两种值类型、惰性过期、类型错误），
//! 额外提供写入通知：每次写入递增写入代数并唤醒 [`KvStore::wait_change`] 的等待者，
//! 因此同一进程内的生产者/消费者无需固定间隔轮询。

use crate::{FieldMap, KvStore, StoreError};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::time::{Duration, Instant};

enum Value {
    Text(String),
    Hash(FieldMap),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn text(value: String) -> Self {
        Self {
            value: Value::Text(value),
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<String, Entry>,
    /// 写入代数（每次写操作 +1）
    generation: u64,
}

impl State {
    /// 获取未过期的条目（过期条目在此处被惰性清除）
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }
}

/// 进程内键值存储
///
/// 通过 `Arc<MemoryStore>` 在多个线程（多个通道实例）之间共享。
///
/// # Example
///
/// ```
/// use cmdring_store::{KvStore, MemoryStore};
/// use std::time::Duration;
///
/// let store = MemoryStore::new();
/// assert!(store.set_if_absent("lock", "1", Duration::from_secs(5)).unwrap());
/// assert!(!store.set_if_absent("lock", "2", Duration::from_secs(5)).unwrap());
/// assert!(store.delete("lock").unwrap());
/// ```
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    changed: Condvar,
}

impl MemoryStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 未过期的键数量
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let state = self.state.lock();
        state
            .entries
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 写入代数递增并唤醒等待者
    fn commit(&self, state: &mut State) {
        state.generation = state.generation.wrapping_add(1);
        self.changed.notify_all();
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut state = self.state.lock();
        match state.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => Ok(Some(text.clone())),
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state
            .entries
            .insert(key.to_string(), Entry::text(value.to_string()));
        self.commit(&mut state);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        let existed = state.live(key).is_some();
        if existed {
            state.entries.remove(key);
            self.commit(&mut state);
        }
        Ok(existed)
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().live(key).is_some())
    }

    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        if state.live(key).is_some() {
            return Ok(false);
        }
        state.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        self.commit(&mut state);
        Ok(true)
    }

    fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        let matches = match state.live(key) {
            None => false,
            Some(Entry {
                value: Value::Text(text),
                ..
            }) => text == expected,
            Some(_) => {
                return Err(StoreError::WrongType {
                    key: key.to_string(),
                    expected: "string",
                });
            },
        };
        if matches {
            state.entries.remove(key);
            self.commit(&mut state);
        }
        Ok(matches)
    }

    fn put_hash(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if fields.is_empty() {
            // 与 Redis 一致：空 Hash 等同于不存在
            state.entries.remove(key);
        } else {
            state.entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(fields.clone()),
                    expires_at: None,
                },
            );
        }
        self.commit(&mut state);
        Ok(())
    }

    fn get_hash_field(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .get_hash(key)?
            .and_then(|mut fields| fields.remove(field)))
    }

    fn get_hash(&self, key: &str) -> Result<Option<FieldMap>, StoreError> {
        let mut state = self.state.lock();
        match state.live(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => Ok(Some(fields.clone())),
            Some(_) => Err(StoreError::WrongType {
                key: key.to_string(),
                expected: "hash",
            }),
        }
    }

    fn append(&self, key: &str, text: &str) -> Result<usize, StoreError> {
        let mut state = self.state.lock();
        let len = match state.live(key) {
            None => {
                state
                    .entries
                    .insert(key.to_string(), Entry::text(text.to_string()));
                text.len()
            },
            Some(Entry {
                value: Value::Text(existing),
                ..
            }) => {
                existing.push_str(text);
                existing.len()
            },
            Some(_) => {
                return Err(StoreError::WrongType {
                    key: key.to_string(),
                    expected: "string",
                });
            },
        };
        self.commit(&mut state);
        Ok(len)
    }

    fn change_token(&self) -> u64 {
        self.state.lock().generation
    }

    fn wait_change(&self, token: u64, timeout: Duration) -> Result<(), StoreError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.generation == token {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        Ok(())
    }
}
