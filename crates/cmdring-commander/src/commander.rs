//! 底盘运动命令门面
//!
//! [`MotionCommander`] 把"以速度 v 前进、以角速度 w 转向"这类意图转换成通道命令。
//!
//! # 速度模式到位移模式的转换
//!
//! 底盘只接受位移命令，因此速度输入被量化为一步固定位移：
//! 控制中断时机器人最多按最后一条命令的速度再移动 0.5 m、转动 45°。
//!
//! | 输入 | 结果 |
//! |------|------|
//! | `\|speed\| >= 0.04 m/s` | 前进/后退 0.5 m，速度取 `\|speed\|` |
//! | `\|speed\| < 0.04 m/s` | 不平移，速度取默认 0.1 m/s |
//! | `\|turn\| >= 10 °/s` | 左转/右转 45°，角速度取 `\|turn\|` |
//! | `\|turn\| < 10 °/s` | 不转向，角速度取默认 10 °/s |
//!
//! 速度被限幅到 0.4 m/s、角速度被限幅到 45 °/s。既不平移也不转向时发送
//! `stay_at_location_mode`。量化后的命令与上一次发送的完全相同时不再发送。
//!
//! 本类型没有内部并发，由接收控制器输入的事件循环单线程调用。

use crate::error::CommanderError;
use crate::grammar::{MoveBaseCommand, MoveBaseMode};
use cmdring_channel::{CommandChannel, RetryPolicy, SlotId};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// 弧度转角度
pub const RAD_TO_DEG: f64 = 57.29578;

/// 每多少条命令输出一次发送频率
const RATE_WINDOW: u64 = 100;

/// 速度量化参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionLimits {
    /// 低于此速度（m/s）视为不平移
    pub min_speed: f64,
    /// 速度上限（m/s）
    pub max_speed: f64,
    /// 不平移时附带的默认速度（m/s）
    pub default_speed: f64,
    /// 每条命令的平移距离（m）
    pub step_distance: f64,
    /// 低于此角速度（°/s）视为不转向
    pub min_turn_speed: f64,
    /// 角速度上限（°/s）
    pub max_turn_speed: f64,
    /// 不转向时附带的默认角速度（°/s）
    pub default_turn_speed: f64,
    /// 每条命令的转向角度（°）
    pub step_angle: f64,
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            min_speed: 0.04,
            max_speed: 0.4,
            default_speed: 0.1,
            step_distance: 0.5,
            min_turn_speed: 10.0,
            max_turn_speed: 45.0,
            default_turn_speed: 10.0,
            step_angle: 45.0,
        }
    }
}

impl MotionLimits {
    /// 把速度（m/s）和角速度（rad/s）量化为一条底盘命令
    pub fn quantize(&self, speed: f64, turn_speed: f64) -> Result<MoveBaseCommand, CommanderError> {
        if !speed.is_finite() || !turn_speed.is_finite() {
            return Err(CommanderError::InvalidInput(format!(
                "speed {} / turn speed {} must be finite",
                speed, turn_speed
            )));
        }
        let turn_speed = turn_speed * RAD_TO_DEG;

        let (forward, speed) = step(
            speed,
            self.min_speed,
            self.step_distance,
            self.default_speed,
        );
        let (turn_left, turn_speed) = step(
            turn_speed,
            self.min_turn_speed,
            self.step_angle,
            self.default_turn_speed,
        );

        if forward == 0.0 && turn_left == 0.0 {
            return Ok(MoveBaseCommand::STAY);
        }
        Ok(MoveBaseCommand::Dist {
            forward,
            turn_left,
            speed: Some(speed.min(self.max_speed)),
            turn_speed: Some(turn_speed.min(self.max_turn_speed)),
        })
    }
}

/// 返回 `(位移, 速度大小)`
fn step(value: f64, threshold: f64, distance: f64, default: f64) -> (f64, f64) {
    if value >= threshold {
        (distance, value)
    } else if value <= -threshold {
        (-distance, -value)
    } else {
        (0.0, default)
    }
}

/// 发送频率统计
#[derive(Debug)]
struct RateCounter {
    count: u64,
    window_start: Instant,
}

impl RateCounter {
    fn new() -> Self {
        Self {
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn record(&mut self) {
        if self.count % RATE_WINDOW == 0 {
            self.window_start = Instant::now();
        } else if self.count % RATE_WINDOW == RATE_WINDOW - 1 {
            let elapsed = self.window_start.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                info!(
                    "Last {} commands: {:.1} Hz",
                    RATE_WINDOW,
                    RATE_WINDOW as f64 / elapsed
                );
            }
        }
        self.count += 1;
    }
}

/// 底盘运动命令门面
pub struct MotionCommander {
    channel: CommandChannel,
    limits: MotionLimits,
    last_sent: Option<String>,
    rate: RateCounter,
}

impl MotionCommander {
    pub fn new(channel: CommandChannel) -> Self {
        Self::with_limits(channel, MotionLimits::default())
    }

    pub fn with_limits(channel: CommandChannel, limits: MotionLimits) -> Self {
        Self {
            channel,
            limits,
            last_sent: None,
            rate: RateCounter::new(),
        }
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn limits(&self) -> &MotionLimits {
        &self.limits
    }

    /// 发送命令，不等待执行结果
    pub fn send_msg(&self, msg: &str) -> Result<SlotId, CommanderError> {
        Ok(self.channel.set_command(msg, None, true)?)
    }

    /// 发送命令并阻塞等待执行结果
    pub fn request_msg(&self, msg: &str) -> Result<String, CommanderError> {
        Ok(self.channel.request_command(msg)?)
    }

    /// 使用指定重试策略的 [`request_msg`](Self::request_msg)
    pub fn request_msg_with(&self, msg: &str, policy: &RetryPolicy) -> Result<String, CommanderError> {
        Ok(self.channel.request_command_with(msg, policy)?)
    }

    /// 发送一条底盘命令
    pub fn send_command(&self, command: &MoveBaseCommand) -> Result<SlotId, CommanderError> {
        self.send_msg(&command.render())
    }

    /// 按距离（m）和角度（°）移动
    pub fn set_movebase_loc_and_angle(
        &self,
        forward: f64,
        turn_left: f64,
        speed: Option<f64>,
        turn_speed: Option<f64>,
    ) -> Result<SlotId, CommanderError> {
        self.send_command(&MoveBaseCommand::Dist {
            forward,
            turn_left,
            speed,
            turn_speed,
        })
    }

    /// 切换底盘模式
    pub fn set_movebase_mode(&self, mode: MoveBaseMode) -> Result<SlotId, CommanderError> {
        self.send_command(&MoveBaseCommand::Mode(mode))
    }

    /// 以速度（m/s）和角速度（rad/s）驱动底盘
    ///
    /// 量化后的命令文本（含方向）与上一次相同时不发送，返回 `Ok(None)`。
    pub fn set_movebase_speed(
        &mut self,
        speed: f64,
        turn_speed: f64,
    ) -> Result<Option<SlotId>, CommanderError> {
        let command = self.limits.quantize(speed, turn_speed)?;
        let msg = command.render();
        if self.last_sent.as_deref() == Some(msg.as_str()) {
            debug!("Same movebase command, skipped: {}", msg);
            return Ok(None);
        }

        let id = self.send_msg(&msg)?;
        debug!("Movebase command on slot {}: {}", id, msg);
        self.last_sent = Some(msg);
        self.rate.record();
        Ok(Some(id))
    }

    /// 上一次发送的速度命令
    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    /// 忘记上一次发送的命令，下一次速度输入一定会发送
    pub fn reset_dedup(&mut self) {
        self.last_sent = None;
    }
}
