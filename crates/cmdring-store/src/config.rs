//! 存储连接配置

use serde::{Deserialize, Serialize};

/// 存储连接配置
///
/// `db` 是命名空间编号（Redis 数据库索引）；不同编号的通道彼此隔离。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 主机名或 IP
    pub host: String,
    /// 端口
    pub port: u16,
    /// 命名空间编号
    pub db: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 4,
        }
    }
}

impl StoreConfig {
    /// 连接 URL（`redis://host:port/db`）
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}
