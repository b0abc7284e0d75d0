//! Redis 存储后端
//!
//! 使用同步连接（互斥锁保护），与命令通道的阻塞式 API 一致。
//! Redis 未配置键空间通知时无法推送写入事件，因此沿用默认的轮询回退。

use crate::{FieldMap, KvStore, StoreConfig, StoreError};
use parking_lot::Mutex;
use redis::{Commands, Connection, Script};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// 值相等才删除（原子执行）
const DELETE_IF_EQUALS: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis 键值存储
pub struct RedisStore {
    conn: Mutex<Connection>,
    delete_if_equals: Script,
}

impl RedisStore {
    /// 按配置建立连接
    ///
    /// # 错误
    /// - `StoreError::Redis`: URL 无效或连接失败
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config.url();
        let client = redis::Client::open(url.as_str())?;
        let conn = client.get_connection()?;
        info!("Connected to redis store at {}", url);
        Ok(Self {
            conn: Mutex::new(conn),
            delete_if_equals: Script::new(DELETE_IF_EQUALS),
        })
    }
}

impl KvStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn.lock().get(key)?)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _: () = self.conn.lock().set(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed: i64 = self.conn.lock().del(key)?;
        Ok(removed > 0)
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.conn.lock().exists(key)?)
    }

    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.lock();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query(&mut *conn)?;
        Ok(reply.is_some())
    }

    fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.lock();
        let removed: i64 = self
            .delete_if_equals
            .key(key)
            .arg(expected)
            .invoke(&mut *conn)?;
        Ok(removed > 0)
    }

    fn put_hash(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !items.is_empty() {
            pipe.hset_multiple(key, items.as_slice()).ignore();
        }
        let mut conn = self.conn.lock();
        let _: () = pipe.query(&mut *conn)?;
        Ok(())
    }

    fn get_hash_field(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self.conn.lock().hget(key, field)?)
    }

    fn get_hash(&self, key: &str) -> Result<Option<FieldMap>, StoreError> {
        let fields: HashMap<String, String> = self.conn.lock().hgetall(key)?;
        if fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(fields.into_iter().collect()))
        }
    }

    fn append(&self, key: &str, text: &str) -> Result<usize, StoreError> {
        Ok(self.conn.lock().append(key, text)?)
    }
}
