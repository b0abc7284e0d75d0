//! 请求重试集成测试
//!
//! 执行端"丢失"第一条命令时，按重试策略整体重发；策略用尽或超过总等待上限时
//! 返回 `RequestTimedOut`。

use cmdring_sdk::channel::{
    ChannelConfig, ChannelError, CommandChannel, ResponseRecord, RetryPolicy, RetryTable,
};
use cmdring_sdk::store::{KvStore, MemoryStore};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn open(store: &Arc<dyn KvStore>, retry: RetryTable) -> CommandChannel {
    CommandChannel::new(
        store.clone(),
        ChannelConfig {
            capacity: 32,
            poll_interval_ms: 5,
            retry,
            ..Default::default()
        },
    )
    .unwrap()
}

/// 执行端：忽略前 `drop_first` 条命令，之后以 `reply` 应答一条
fn lossy_executor(
    consumer: CommandChannel,
    drop_first: usize,
    reply: &'static str,
) -> thread::JoinHandle<Vec<u32>> {
    thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..drop_first {
            let (_, id) = consumer.get_last_command_with_id(true, None).unwrap().unwrap();
            seen.push(id);
        }
        let (_, id) = consumer.get_last_command_with_id(true, None).unwrap().unwrap();
        consumer.set_result(ResponseRecord::new(reply), id).unwrap();
        seen.push(id);
        seen
    })
}

#[test]
fn test_resend_recovers_dropped_command() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let producer = open(&store, RetryTable::default());
    let executor = lossy_executor(open(&store, RetryTable::default()), 1, "idle");

    let policy = RetryPolicy::resend_every(Duration::from_millis(60)).with_max_attempts(5);
    let result = producer
        .request_command_with("get_robot_busy_state", &policy)
        .unwrap();

    assert_eq!(result, "idle");
    assert_eq!(executor.join().unwrap(), vec![0, 1]);
    let metrics = producer.get_metrics();
    assert_eq!(metrics.request_resends, 1);
    assert_eq!(metrics.requests_completed, 1);
}

#[test]
fn test_retry_table_selects_policy_by_kind() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let table = RetryTable::default().with_policy(
        "get_neck_transformer",
        RetryPolicy::resend_every(Duration::from_millis(40)),
    );
    let producer = open(&store, table.clone());
    let executor = lossy_executor(open(&store, table), 2, "0.1,0.2,0.3");

    let result = producer
        .request_command("get_neck_transformer,head")
        .unwrap();
    assert_eq!(result, "0.1,0.2,0.3");
    assert_eq!(executor.join().unwrap(), vec![0, 1, 2]);
    assert_eq!(producer.get_metrics().request_resends, 2);
}

#[test]
fn test_default_kinds_do_not_resend() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let table = RetryTable::uniform(
        RetryPolicy::default().with_deadline(Some(Duration::from_millis(120))),
    );
    let producer = open(&store, table);

    let started = Instant::now();
    let err = producer
        .request_command("set_movebase_mode,push_mode")
        .unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(120));

    match err {
        ChannelError::RequestTimedOut {
            kind,
            slot,
            attempts,
        } => {
            assert_eq!(kind, "set_movebase_mode");
            assert_eq!(slot, 0);
            assert_eq!(attempts, 1);
        },
        other => panic!("Expected RequestTimedOut, got {:?}", other),
    }
    let metrics = producer.get_metrics();
    assert_eq!(metrics.request_resends, 0);
    assert_eq!(metrics.request_timeouts, 1);
}

#[test]
fn test_deadline_bounds_resending() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let producer = open(&store, RetryTable::default());

    // 不限次数的重发也受总等待上限约束
    let policy = RetryPolicy::resend_every(Duration::from_millis(30))
        .with_deadline(Some(Duration::from_millis(100)));
    let started = Instant::now();
    let err = producer
        .request_command_with("get_movebase_enable_status", &policy)
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2));
    match err {
        ChannelError::RequestTimedOut { attempts, .. } => assert!(attempts >= 2),
        other => panic!("Expected RequestTimedOut, got {:?}", other),
    }
}

#[test]
fn test_backoff_between_attempts() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let producer = open(&store, RetryTable::default());

    let policy = RetryPolicy::resend_every(Duration::from_millis(10))
        .with_max_attempts(3)
        .with_backoff(Duration::from_millis(40));
    let started = Instant::now();
    let err = producer
        .request_command_with("check_neck_using_priority", &policy)
        .unwrap_err();

    // 3 次尝试之间有 2 次退避
    assert!(started.elapsed() >= Duration::from_millis(3 * 10 + 2 * 40));
    assert!(matches!(
        err,
        ChannelError::RequestTimedOut { attempts: 3, slot: 2, .. }
    ));
}
