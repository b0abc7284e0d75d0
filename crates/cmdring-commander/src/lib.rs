//! # cmdring Commander Layer
//!
//! 生产者侧门面：把底盘运动意图格式化为命令文本，并抑制重复发送。
//!
//! - [`MotionCommander`]：速度量化、限幅、去重、发送频率统计
//! - [`MoveBaseCommand`] / [`MoveBaseMode`]：命令语法（生成与解析）
//! - [`InputThrottle`]：手柄输入到速度的映射与节流

mod commander;
mod error;
pub mod grammar;
mod throttle;

pub use commander::{MotionCommander, MotionLimits, RAD_TO_DEG};
pub use error::CommanderError;
pub use grammar::{MoveBaseCommand, MoveBaseMode};
pub use throttle::{
    ControllerData, ControllerMessage, DEFAULT_CONTROLLER_ID, InputThrottle, ThrottleConfig,
};
