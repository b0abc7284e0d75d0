//! 手柄遥操作
//!
//! 标准输入每行一条手柄 JSON 消息：
//!
//! ```json
//! {"controller_id": "controller1", "data": {"axes": [0.0, 0.0, 0.1, -0.8], "buttons": []}}
//! ```

use anyhow::Result;
use clap::Args;
use cmdring_sdk::SdkConfig;
use cmdring_sdk::commander::ControllerMessage;
use cmdring_sdk::prelude::*;
use std::io::{self, BufRead};
use std::sync::Arc;
use tracing::{info, warn};

/// 遥操作参数
#[derive(Args, Debug)]
pub struct DriveCommand {
    /// 只接受该控制器的消息（覆盖配置）
    #[arg(long)]
    pub controller: Option<String>,
}

impl DriveCommand {
    pub fn execute(&self, store: Arc<dyn KvStore>, config: &SdkConfig) -> Result<()> {
        let mut config = config.clone();
        if let Some(controller) = &self.controller {
            config.throttle.controller_id = controller.clone();
        }
        let (mut commander, mut throttle) = cmdring_sdk::open_commander(store, &config)?;

        let mut sent: u64 = 0;
        for line in io::stdin().lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let message = match ControllerMessage::from_json(line.as_bytes()) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Skipping malformed controller message: {}", e);
                    continue;
                },
            };
            match throttle.handle_message(&mut commander, &message) {
                Ok(Some(id)) => {
                    sent += 1;
                    println!("[{}] {}", id, commander.last_sent().unwrap_or(""));
                },
                Ok(None) => {},
                Err(CommanderError::InvalidInput(reason)) => {
                    warn!("Skipping controller message: {}", reason);
                },
                Err(e) => return Err(e.into()),
            }
        }

        // 输入结束时让底盘停下
        commander.set_movebase_mode(MoveBaseMode::StayAtLocation)?;
        info!("Input closed after {} command(s), base stopped", sent);
        Ok(())
    }
}
