//! 手柄输入节流
//!
//! 控制器以很高的频率上报摇杆状态，[`InputThrottle`] 负责：
//!
//! - 把摇杆轴映射为速度：`linear = -axes[3] * 0.4`（m/s），`angular = -axes[2] * 50°/s`（换算为 rad/s）
//! - 限制命令频率（默认最小间隔 100 ms，即 10 Hz）
//! - 已经处于停止状态时不重复发送停止命令
//!
//! 消息的传输方式（UDP、WebSocket 等）不在本模块范围内，这里只定义消息格式
//! [`ControllerMessage`]。

use crate::commander::{MotionCommander, RAD_TO_DEG};
use crate::error::CommanderError;
use cmdring_channel::SlotId;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 默认接受的控制器 ID
pub const DEFAULT_CONTROLLER_ID: &str = "controller1";

/// 控制器上报的状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerData {
    #[serde(default)]
    pub axes: Vec<f64>,
    /// 按键状态，格式因控制器而异
    #[serde(default)]
    pub buttons: Vec<serde_json::Value>,
}

/// 控制器消息
///
/// ```json
/// {"controller_id": "controller1", "data": {"axes": [0, 0, 0.5, -1.0], "buttons": []}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerMessage {
    pub controller_id: String,
    pub data: ControllerData,
}

impl ControllerMessage {
    pub fn from_json(payload: &[u8]) -> Result<Self, CommanderError> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn to_json(&self) -> Result<String, CommanderError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 节流参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// 两条命令之间的最小间隔（毫秒）
    pub min_interval_ms: u64,
    /// 摇杆满量程对应的线速度（m/s）
    pub linear_scale: f64,
    /// 摇杆满量程对应的角速度（°/s）
    pub angular_scale_deg: f64,
    /// 线速度和角速度都低于此值时视为停止命令
    pub stop_epsilon: f64,
    /// 只处理来自该控制器的消息
    pub controller_id: String,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 100,
            linear_scale: 0.4,
            angular_scale_deg: 50.0,
            stop_epsilon: 0.001,
            controller_id: DEFAULT_CONTROLLER_ID.to_string(),
        }
    }
}

impl ThrottleConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// 手柄输入节流器
#[derive(Debug)]
pub struct InputThrottle {
    config: ThrottleConfig,
    last_command_at: Option<Instant>,
    is_stopped: bool,
}

impl Default for InputThrottle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

impl InputThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            last_command_at: None,
            is_stopped: false,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// 摇杆轴 → `(线速度 m/s, 角速度 rad/s)`
    pub fn speeds(&self, axes: &[f64]) -> Result<(f64, f64), CommanderError> {
        match axes {
            [_, _, turn, drive, ..] => Ok((
                -drive * self.config.linear_scale,
                -turn * self.config.angular_scale_deg / RAD_TO_DEG,
            )),
            _ => Err(CommanderError::InvalidInput(format!(
                "controller reports {} axes, need at least 4",
                axes.len()
            ))),
        }
    }

    /// 判断 `now` 时刻的这组速度是否应当发送，并更新内部状态
    pub fn admit(&mut self, now: Instant, linear: f64, angular: f64) -> bool {
        if self
            .last_command_at
            .is_some_and(|last| now.saturating_duration_since(last) < self.config.min_interval())
        {
            return false;
        }
        let is_stop = linear.abs() < self.config.stop_epsilon
            && angular.abs() < self.config.stop_epsilon;
        if is_stop && self.is_stopped {
            return false;
        }
        self.is_stopped = is_stop;
        self.last_command_at = Some(now);
        true
    }

    /// 处理一次控制器上报
    ///
    /// 被节流时返回 `Ok(None)`；否则交给 [`MotionCommander::set_movebase_speed`]。
    pub fn handle(
        &mut self,
        commander: &mut MotionCommander,
        data: &ControllerData,
    ) -> Result<Option<SlotId>, CommanderError> {
        self.handle_at(Instant::now(), commander, data)
    }

    pub fn handle_at(
        &mut self,
        now: Instant,
        commander: &mut MotionCommander,
        data: &ControllerData,
    ) -> Result<Option<SlotId>, CommanderError> {
        let (linear, angular) = self.speeds(&data.axes)?;
        if !self.admit(now, linear, angular) {
            return Ok(None);
        }
        debug!("Linear speed {:.3} m/s, angular speed {:.3} rad/s", linear, angular);
        commander.set_movebase_speed(linear, angular)
    }

    /// 处理一条完整的控制器消息，忽略其他控制器
    pub fn handle_message(
        &mut self,
        commander: &mut MotionCommander,
        message: &ControllerMessage,
    ) -> Result<Option<SlotId>, CommanderError> {
        if message.controller_id != self.config.controller_id {
            warn!("Ignoring message from controller '{}'", message.controller_id);
            return Ok(None);
        }
        self.handle(commander, &message.data)
    }
}
