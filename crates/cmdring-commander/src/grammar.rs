//! 底盘命令语法
//!
//! 命令文本以逗号分隔，第一个字段是命令类别：
//!
//! ```text
//! set_movebase_dist_mode,<forward>,<turn_left>[,<speed>[,<turn_speed>]]
//! set_movebase_mode,<mode>
//! ```
//!
//! - 数值固定保留 4 位小数（`0.5000`、`-45.0000`）
//! - `forward` 单位为米，`turn_left` 单位为度（左转为正）
//! - `speed` 单位为 m/s，`turn_speed` 单位为 °/s；只给出 `turn_speed` 而省略 `speed` 是不允许的
//!
//! 生产者用 [`MoveBaseCommand::render`] 生成命令，执行端用 [`MoveBaseCommand::parse`] 解析。

use crate::error::CommanderError;
use std::fmt;
use std::str::FromStr;

/// 位移命令类别
pub const DIST_MODE_KIND: &str = "set_movebase_dist_mode";
/// 模式切换命令类别
pub const MODE_KIND: &str = "set_movebase_mode";

/// 底盘模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveBaseMode {
    Push,
    Dist,
    LocAndRot,
    /// 原地停止
    StayAtLocation,
}

impl MoveBaseMode {
    pub const ALL: [MoveBaseMode; 4] = [
        MoveBaseMode::Push,
        MoveBaseMode::Dist,
        MoveBaseMode::LocAndRot,
        MoveBaseMode::StayAtLocation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MoveBaseMode::Push => "push_mode",
            MoveBaseMode::Dist => "dist_mode",
            MoveBaseMode::LocAndRot => "loc_and_rot_mode",
            MoveBaseMode::StayAtLocation => "stay_at_location_mode",
        }
    }
}

impl fmt::Display for MoveBaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MoveBaseMode {
    type Err = CommanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoveBaseMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.trim())
            .ok_or_else(|| CommanderError::UnknownMode(s.to_string()))
    }
}

/// 底盘命令
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveBaseCommand {
    /// 按距离/角度移动
    Dist {
        forward: f64,
        turn_left: f64,
        speed: Option<f64>,
        turn_speed: Option<f64>,
    },
    /// 切换模式
    Mode(MoveBaseMode),
}

impl MoveBaseCommand {
    /// 原地停止命令
    pub const STAY: MoveBaseCommand = MoveBaseCommand::Mode(MoveBaseMode::StayAtLocation);

    pub fn kind(&self) -> &'static str {
        match self {
            MoveBaseCommand::Dist { .. } => DIST_MODE_KIND,
            MoveBaseCommand::Mode(_) => MODE_KIND,
        }
    }

    /// 生成命令文本
    pub fn render(&self) -> String {
        match *self {
            MoveBaseCommand::Dist {
                forward,
                turn_left,
                speed,
                turn_speed,
            } => match (speed, turn_speed) {
                (None, _) => format!("{},{:.4},{:.4}", DIST_MODE_KIND, forward, turn_left),
                (Some(speed), None) => format!(
                    "{},{:.4},{:.4},{:.4}",
                    DIST_MODE_KIND, forward, turn_left, speed
                ),
                (Some(speed), Some(turn_speed)) => format!(
                    "{},{:.4},{:.4},{:.4},{:.4}",
                    DIST_MODE_KIND, forward, turn_left, speed, turn_speed
                ),
            },
            MoveBaseCommand::Mode(mode) => format!("{},{}", MODE_KIND, mode),
        }
    }

    /// 解析命令文本
    pub fn parse(msg: &str) -> Result<Self, CommanderError> {
        let mut parts = msg.split(',').map(str::trim);
        let kind = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        match kind {
            DIST_MODE_KIND => {
                if !(2..=4).contains(&args.len()) {
                    return Err(CommanderError::malformed(
                        msg,
                        format!("expected 2 to 4 values, got {}", args.len()),
                    ));
                }
                let values = args
                    .iter()
                    .map(|raw| {
                        raw.parse::<f64>()
                            .ok()
                            .filter(|v| v.is_finite())
                            .ok_or_else(|| {
                                CommanderError::malformed(msg, format!("'{}' is not a number", raw))
                            })
                    })
                    .collect::<Result<Vec<f64>, _>>()?;
                Ok(MoveBaseCommand::Dist {
                    forward: values[0],
                    turn_left: values[1],
                    speed: values.get(2).copied(),
                    turn_speed: values.get(3).copied(),
                })
            },
            MODE_KIND => match args.as_slice() {
                [mode] => Ok(MoveBaseCommand::Mode(mode.parse()?)),
                _ => Err(CommanderError::malformed(msg, "expected exactly one mode")),
            },
            _ => Err(CommanderError::malformed(msg, "not a movebase command")),
        }
    }
}

impl fmt::Display for MoveBaseCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for MoveBaseCommand {
    type Err = CommanderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
