//! # cmdring CLI
//!
//! 命令通道的命令行工具：从终端发送命令、充当简易执行端、观察通道内容。
//!
//! ```bash
//! # 发送一条命令（不等待结果）
//! cmdring-cli send "set_movebase_mode,stay_at_location_mode"
//!
//! # 发送并等待执行端写回结果
//! cmdring-cli --db 6 request get_robot_busy_state
//!
//! # 充当回显执行端
//! cmdring-cli serve --reply ok
//!
//! # 从标准输入读取手柄 JSON，节流后驱动底盘
//! teleop-bridge | cmdring-cli drive
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{
    ConnectArgs, DriveCommand, RequestCommand, SendCommand, ServeCommand, StopCommand,
    StopInfoCommand, TailCommand,
};

/// cmdring CLI - 命令通道工具
#[derive(Parser, Debug)]
#[command(name = "cmdring-cli")]
#[command(about = "Command-line tool for the cmdring command channel", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connect: ConnectArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 写入一条命令，不等待结果
    Send {
        #[command(flatten)]
        args: SendCommand,
    },

    /// 写入一条命令并等待结果
    Request {
        #[command(flatten)]
        args: RequestCommand,
    },

    /// 充当执行端：对每条命令写回固定结果
    Serve {
        #[command(flatten)]
        args: ServeCommand,
    },

    /// 持续打印新写入的命令
    Tail {
        #[command(flatten)]
        args: TailCommand,
    },

    /// 从标准输入读取手柄消息并驱动底盘
    Drive {
        #[command(flatten)]
        args: DriveCommand,
    },

    /// 设置停止标志
    Stop {
        #[command(flatten)]
        args: StopCommand,
    },

    /// 读取或清除停止信息
    StopInfo {
        #[command(flatten)]
        args: StopInfoCommand,
    },

    /// 清空通道的全部键
    Reset,
}

fn main() -> Result<()> {
    cmdring_sdk::logging::init()?;

    let cli = Cli::parse();
    let config = cli.connect.load()?;
    let store = cmdring_sdk::open_store(&config.store)?;

    match cli.command {
        Commands::Send { args } => args.execute(store, &config),
        Commands::Request { args } => args.execute(store, &config),
        Commands::Serve { args } => args.execute(store, &config),
        Commands::Tail { args } => args.execute(store, &config),
        Commands::Drive { args } => args.execute(store, &config),
        Commands::Stop { args } => args.execute(store, &config),
        Commands::StopInfo { args } => args.execute(store, &config),
        Commands::Reset => {
            cmdring_sdk::open_channel(store, &config)?.reset()?;
            println!("Channel reset");
            Ok(())
        },
    }
}
