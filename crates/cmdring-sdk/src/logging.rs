//! 日志初始化
//!
//! 安装 `tracing-subscriber` 的 fmt 订阅者，过滤规则取自 `RUST_LOG`
//! （未设置时使用 `info`），并通过 `tracing-log` 把 `log` 记录转发到 tracing。
//!
//! ```rust,no_run
//! cmdring_sdk::logging::init().expect("logger already installed");
//! tracing::info!("ready");
//! ```

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// 未设置 `RUST_LOG` 时的默认过滤规则
pub const DEFAULT_FILTER: &str = "info";

/// 日志初始化错误（通常是重复初始化）
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Log bridge already installed: {0}")]
    Bridge(#[from] log::SetLoggerError),

    #[error("Global subscriber already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// 使用默认过滤规则初始化
pub fn init() -> Result<(), LoggingError> {
    init_with_filter(DEFAULT_FILTER)
}

/// 初始化；`RUST_LOG` 优先于 `default_filter`
pub fn init_with_filter(default_filter: &str) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
