//! 槽位记录与响应记录
//!
//! 两者在存储中都是字段表（Hash），写入时由通道加盖 `timestamp`
//! （Unix 纪元秒，浮点数）。时间戳是墙上时间而非单调时间，
//! 因为生产者与消费者通常位于不同主机上。

use cmdring_store::FieldMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// 命令文本字段
pub const MSG_FIELD: &str = "msg";
/// 时间戳字段
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// 执行结果字段
pub const RESULT_FIELD: &str = "result";

/// 当前 Unix 时间（秒）
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn parse_timestamp(fields: &FieldMap) -> Option<f64> {
    fields
        .get(TIMESTAMP_FIELD)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|ts| ts.is_finite())
}

/// 槽位中的命令
///
/// 至少包含 `msg` 字段；允许携带任意附加字段。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandRecord {
    fields: FieldMap,
}

impl CommandRecord {
    /// 以命令文本创建
    pub fn new(msg: impl Into<String>) -> Self {
        let mut fields = FieldMap::new();
        fields.insert(MSG_FIELD.to_string(), msg.into());
        Self { fields }
    }

    /// 从存储读出的字段表创建
    pub fn from_fields(fields: FieldMap) -> Self {
        Self { fields }
    }

    /// 附加字段
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// 命令文本
    pub fn msg(&self) -> Option<&str> {
        self.field(MSG_FIELD)
    }

    /// 命令类别：命令文本中第一个逗号之前的部分
    ///
    /// 例如 `set_movebase_mode,stay_at_location_mode` 的类别是 `set_movebase_mode`。
    pub fn kind(&self) -> &str {
        self.msg()
            .and_then(|msg| msg.split(',').next())
            .map(str::trim)
            .unwrap_or("")
    }

    /// 写入时间戳（Unix 秒）
    pub fn timestamp(&self) -> Option<f64> {
        parse_timestamp(&self.fields)
    }

    /// 相对 `now` 的年龄（秒）；没有有效时间戳时返回 `None`
    pub fn age(&self, now: f64) -> Option<f64> {
        self.timestamp().map(|ts| now - ts)
    }

    /// 是否已过期
    ///
    /// 年龄 `>= timeout_secs` 即视为过期；缺少时间戳的记录同样视为过期。
    pub fn is_stale(&self, now: f64, timeout_secs: f64) -> bool {
        self.age(now).is_none_or(|age| age >= timeout_secs)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn into_fields(self) -> FieldMap {
        self.fields
    }

    /// 加盖时间戳（覆盖调用方提供的 `timestamp`）
    pub(crate) fn stamped(mut self, now: f64) -> Self {
        self.fields
            .insert(TIMESTAMP_FIELD.to_string(), now.to_string());
        self
    }
}

impl From<&str> for CommandRecord {
    fn from(msg: &str) -> Self {
        Self::new(msg)
    }
}

impl From<String> for CommandRecord {
    fn from(msg: String) -> Self {
        Self::new(msg)
    }
}

/// 消费者写回的响应
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseRecord {
    fields: FieldMap,
}

impl ResponseRecord {
    /// 以执行结果创建
    pub fn new(result: impl Into<String>) -> Self {
        let mut fields = FieldMap::new();
        fields.insert(RESULT_FIELD.to_string(), result.into());
        Self { fields }
    }

    pub fn from_fields(fields: FieldMap) -> Self {
        Self { fields }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// 执行结果
    pub fn result(&self) -> Option<&str> {
        self.fields.get(RESULT_FIELD).map(String::as_str)
    }

    pub fn timestamp(&self) -> Option<f64> {
        parse_timestamp(&self.fields)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub(crate) fn into_result(mut self) -> Option<String> {
        self.fields.remove(RESULT_FIELD)
    }

    pub(crate) fn stamped(mut self, now: f64) -> Self {
        self.fields
            .insert(TIMESTAMP_FIELD.to_string(), now.to_string());
        self
    }
}
