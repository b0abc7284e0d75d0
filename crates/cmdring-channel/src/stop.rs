//! 协作式停止信号
//!
//! - `task_stop`：停止标志，读后即删，每次设置最多被一个读者观察到一次
//! - `task_stop_info`：只追加的停止原因文本，读取不会清除
//!
//! 读后即删依赖存储 `delete` 的原子返回值：多个读者并发读取时只有一个得到 `true`。
//!
//! [`StopWatcher`] 在后台线程中轮询停止标志，并通过容量为 1 的通道把信号交给
//! 唯一的接收者，适合在控制循环中用 `try_recv` 非阻塞检查。

use crate::error::ChannelError;
use crate::keys;
use cmdring_store::KvStore;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{debug, error};

/// 停止信号句柄
#[derive(Clone)]
pub struct StopSignal {
    store: Arc<dyn KvStore>,
    poll_interval: Duration,
}

impl StopSignal {
    pub fn new(store: Arc<dyn KvStore>, poll_interval: Duration) -> Self {
        Self {
            store,
            poll_interval,
        }
    }

    /// 设置停止标志
    pub fn raise(&self) -> Result<(), ChannelError> {
        self.store.set(keys::TASK_STOP, "1")?;
        Ok(())
    }

    /// 读取并清除停止标志
    pub fn take(&self) -> Result<bool, ChannelError> {
        Ok(self.store.delete(keys::TASK_STOP)?)
    }

    /// 查看停止标志但不清除
    pub fn is_pending(&self) -> Result<bool, ChannelError> {
        Ok(self.store.exists(keys::TASK_STOP)?)
    }

    /// 清除停止标志（不关心之前是否设置）
    pub fn clear(&self) -> Result<(), ChannelError> {
        self.store.delete(keys::TASK_STOP)?;
        Ok(())
    }

    /// 追加停止信息，返回追加后的长度
    pub fn write_info(&self, text: &str) -> Result<usize, ChannelError> {
        Ok(self.store.append(keys::TASK_STOP_INFO, text)?)
    }

    /// 读取停止信息（不阻塞）
    pub fn info(&self) -> Result<Option<String>, ChannelError> {
        Ok(self.store.get(keys::TASK_STOP_INFO)?)
    }

    /// 阻塞直到停止信息非空
    pub fn wait_info(&self) -> Result<String, ChannelError> {
        loop {
            let change = self.store.change_token();
            if let Some(info) = self.info()?
                && !info.is_empty()
            {
                return Ok(info);
            }
            self.store.wait_change(change, self.poll_interval)?;
        }
    }

    pub fn clear_info(&self) -> Result<(), ChannelError> {
        self.store.delete(keys::TASK_STOP_INFO)?;
        Ok(())
    }

    /// 启动监视线程
    pub fn watch(&self) -> StopWatcher {
        StopWatcher::spawn(self.clone())
    }
}

/// 停止标志监视器
///
/// 后台线程每个轮询间隔消费一次停止标志；观察到的信号放入容量为 1 的通道，
/// 接收者尚未取走时新的信号被合并。
///
/// 存储出错时线程记录错误并退出，之后接收端返回 [`ChannelError::WatcherClosed`]。
/// Drop 时通知线程退出并等待其结束（最多一个轮询间隔）。
pub struct StopWatcher {
    rx: Receiver<()>,
    is_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl StopWatcher {
    fn spawn(signal: StopSignal) -> Self {
        let (tx, rx) = bounded(1);
        let is_running = Arc::new(AtomicBool::new(true));
        let running = is_running.clone();

        let thread = spawn(move || {
            while running.load(Ordering::Acquire) {
                let change = signal.store.change_token();
                match signal.take() {
                    Ok(true) => match tx.try_send(()) {
                        Ok(()) | Err(TrySendError::Full(())) => {
                            debug!("Stop signal observed");
                        },
                        Err(TrySendError::Disconnected(())) => break,
                    },
                    Ok(false) => {},
                    Err(e) => {
                        error!("Stop watcher exiting: {}", e);
                        break;
                    },
                }
                if let Err(e) = signal.store.wait_change(change, signal.poll_interval) {
                    error!("Stop watcher exiting: {}", e);
                    break;
                }
            }
        });

        Self {
            rx,
            is_running,
            thread: Some(thread),
        }
    }

    /// 非阻塞检查是否收到停止信号
    pub fn try_recv(&self) -> Result<bool, ChannelError> {
        match self.rx.try_recv() {
            Ok(()) => Ok(true),
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Disconnected) => Err(ChannelError::WatcherClosed),
        }
    }

    /// 最多等待 `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<bool, ChannelError> {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => Ok(true),
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(ChannelError::WatcherClosed),
        }
    }

    /// 监视线程是否仍在运行
    pub fn is_alive(&self) -> bool {
        self.thread.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for StopWatcher {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            error!("Stop watcher thread panicked");
        }
    }
}
