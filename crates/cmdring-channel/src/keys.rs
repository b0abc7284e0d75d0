//! 键空间约定
//!
//! | 键 | 类型 | 含义 |
//! |----|------|------|
//! | `lastID` | 整数 | 水位线（最近写入的槽位） |
//! | `<id>` | Hash | 槽位内容（`msg`、`timestamp` …） |
//! | `<id>_r` | Hash | 响应记录（`result`、`timestamp`） |
//! | `lock` | 带 TTL 的标志 | 租约锁，值为租约令牌 |
//! | `task_stop` | 标志 | 协作式停止信号（读后即删） |
//! | `task_stop_info` | 追加字符串 | 停止原因 |

use crate::SlotId;

/// 水位线
pub const WATERMARK: &str = "lastID";

/// 租约锁
pub const LOCK: &str = "lock";

/// 停止标志
pub const TASK_STOP: &str = "task_stop";

/// 停止信息
pub const TASK_STOP_INFO: &str = "task_stop_info";

/// 槽位键
pub fn slot(id: SlotId) -> String {
    id.to_string()
}

/// 响应记录键
pub fn response(id: SlotId) -> String {
    format!("{}_r", id)
}
