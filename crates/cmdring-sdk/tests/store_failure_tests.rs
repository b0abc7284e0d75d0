//! 存储故障传播测试
//!
//! 通道层不捕获存储故障：连接断开必须以 `ChannelError::Store` 返回给调用方，
//! 阻塞中的等待也必须退出，而不是永远轮询下去。

use cmdring_sdk::channel::{ChannelConfig, ChannelError, CommandChannel};
use cmdring_sdk::store::{
    FieldMap, KvStore, MemoryStore, StoreBackendError, StoreBackendErrorKind, StoreError,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// 可注入故障的存储：`should_fail` 置位后所有操作返回"连接被拒绝"
struct FailingStore {
    inner: MemoryStore,
    should_fail: Arc<AtomicBool>,
}

impl FailingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            should_fail: Arc::new(AtomicBool::new(false)),
        }
    }

    fn fail_switch(&self) -> Arc<AtomicBool> {
        self.should_fail.clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(StoreError::Backend(StoreBackendError::new(
                StoreBackendErrorKind::Unreachable,
                "Connection refused",
            )));
        }
        Ok(())
    }
}

impl KvStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.delete(key)
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.exists(key)
    }

    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.set_if_absent(key, value, ttl)
    }

    fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.delete_if_equals(key, expected)
    }

    fn put_hash(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        self.check()?;
        self.inner.put_hash(key, fields)
    }

    fn get_hash_field(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.inner.get_hash_field(key, field)
    }

    fn get_hash(&self, key: &str) -> Result<Option<FieldMap>, StoreError> {
        self.check()?;
        self.inner.get_hash(key)
    }

    fn append(&self, key: &str, text: &str) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.append(key, text)
    }

    fn change_token(&self) -> u64 {
        self.inner.change_token()
    }

    fn wait_change(&self, token: u64, timeout: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.inner.wait_change(token, timeout)
    }
}

fn open(store: &Arc<dyn KvStore>) -> CommandChannel {
    CommandChannel::new(
        store.clone(),
        ChannelConfig {
            capacity: 16,
            poll_interval_ms: 5,
            ..Default::default()
        },
    )
    .unwrap()
}

fn assert_unreachable(err: ChannelError) {
    match err {
        ChannelError::Store(StoreError::Backend(e)) => {
            assert_eq!(e.kind, StoreBackendErrorKind::Unreachable);
            assert!(e.is_fatal());
        },
        other => panic!("Expected store backend error, got {:?}", other),
    }
}

#[test]
fn test_write_fails_fast() {
    let failing = FailingStore::new();
    let switch = failing.fail_switch();
    let store: Arc<dyn KvStore> = Arc::new(failing);
    let channel = open(&store);

    channel.set_command("ok", None, true).unwrap();
    switch.store(true, Ordering::Relaxed);

    assert_unreachable(channel.set_command("lost", None, true).unwrap_err());
    assert_unreachable(channel.get_last_command_id(false).unwrap_err());
    assert_unreachable(channel.is_task_stop_set().unwrap_err());
    assert_unreachable(channel.get_last_commands().unwrap_err());
}

#[test]
fn test_pending_request_aborts_on_store_failure() {
    let failing = FailingStore::new();
    let switch = failing.fail_switch();
    let store: Arc<dyn KvStore> = Arc::new(failing);
    let producer = open(&store);

    let breaker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        switch.store(true, Ordering::Relaxed);
    });

    // 没有执行端应答，查询类请求会一直重发等待
    let err = producer.request_command("get_robot_busy_state").unwrap_err();
    breaker.join().unwrap();
    assert_unreachable(err);
}

#[test]
fn test_blocking_read_aborts_on_store_failure() {
    let failing = FailingStore::new();
    let switch = failing.fail_switch();
    let store: Arc<dyn KvStore> = Arc::new(failing);
    let consumer = open(&store);

    let breaker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        switch.store(true, Ordering::Relaxed);
    });

    let err = consumer.get_last_command_with_id(true, None).unwrap_err();
    breaker.join().unwrap();
    assert_unreachable(err);
}

#[test]
fn test_stop_watcher_closes_on_store_failure() {
    let failing = FailingStore::new();
    let switch = failing.fail_switch();
    let store: Arc<dyn KvStore> = Arc::new(failing);
    let channel = open(&store);
    let watcher = channel.watch_stop();

    switch.store(true, Ordering::Relaxed);
    let result = watcher.recv_timeout(Duration::from_secs(2));
    assert!(matches!(result, Err(ChannelError::WatcherClosed)));
    assert!(matches!(watcher.try_recv(), Err(ChannelError::WatcherClosed)));
}
