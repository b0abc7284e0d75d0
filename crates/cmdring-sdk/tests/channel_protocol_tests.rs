//! 通道协议集成测试
//!
//! 多个通道实例共享同一个进程内存储，模拟生产者与执行端位于不同进程：
//! 1. 请求/响应按槽位号关联
//! 2. 环形槽位回绕
//! 3. 过期命令的处理
//! 4. 批量追赶读取
//! 5. 停止信号最多被观察一次

use cmdring_sdk::channel::{
    ChannelConfig, CommandChannel, ResponseRecord, TIMESTAMP_FIELD, keys, unix_timestamp,
};
use cmdring_sdk::commander::MoveBaseCommand;
use cmdring_sdk::store::{KvStore, MemoryStore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn test_config(capacity: u32) -> ChannelConfig {
    ChannelConfig {
        capacity,
        poll_interval_ms: 5,
        ..Default::default()
    }
}

fn shared_store() -> Arc<dyn KvStore> {
    Arc::new(MemoryStore::new())
}

fn open(store: &Arc<dyn KvStore>, capacity: u32) -> CommandChannel {
    CommandChannel::new(store.clone(), test_config(capacity)).unwrap()
}

/// 把槽位的时间戳改写为 `age_secs` 秒之前
fn age_slot(store: &Arc<dyn KvStore>, id: u32, age_secs: f64) {
    let mut fields = store.get_hash(&keys::slot(id)).unwrap().unwrap();
    fields.insert(
        TIMESTAMP_FIELD.to_string(),
        (unix_timestamp() - age_secs).to_string(),
    );
    store.put_hash(&keys::slot(id), &fields).unwrap();
}

#[test]
fn test_stay_at_location_round_trip() {
    let store = shared_store();
    let producer = open(&store, 2000);
    let consumer = open(&store, 2000);

    let executor = thread::spawn(move || {
        let (record, id) = consumer
            .get_last_command_with_id(true, None)
            .unwrap()
            .expect("blocking read returns a command");
        assert_eq!(
            MoveBaseCommand::parse(record.msg().unwrap()).unwrap(),
            MoveBaseCommand::STAY
        );
        consumer.set_result(ResponseRecord::new("ok"), id).unwrap();
        id
    });

    let result = producer
        .request_command(MoveBaseCommand::STAY.render())
        .unwrap();
    let served_id = executor.join().unwrap();

    assert_eq!(result, "ok");
    assert_eq!(served_id, 0);
    let response = producer.get_response(served_id).unwrap().unwrap();
    assert!(response.timestamp().is_some());
}

#[test]
fn test_fire_and_forget_then_reply() {
    let store = shared_store();
    let producer = open(&store, 16);
    let consumer = open(&store, 16);

    let id = producer
        .set_command("set_movebase_mode,stay_at_location_mode", None, true)
        .unwrap();
    let (record, seen) = consumer.get_last_command_with_id(true, None).unwrap().unwrap();
    assert_eq!(seen, id);
    assert_eq!(record.kind(), "set_movebase_mode");

    consumer.set_result(ResponseRecord::new("ok"), seen).unwrap();
    assert_eq!(
        producer.get_response(id).unwrap().unwrap().result(),
        Some("ok")
    );
}

#[test]
fn test_each_request_gets_its_own_result() {
    let store = shared_store();
    let producer = open(&store, 4);
    let consumer = open(&store, 4);

    let executor = thread::spawn(move || {
        for _ in 0..10 {
            let (record, id) = consumer.get_last_command_with_id(true, None).unwrap().unwrap();
            let reply = format!("{}@{}", record.msg().unwrap(), id);
            consumer.set_result(ResponseRecord::new(reply), id).unwrap();
        }
    });

    // 10 次请求在容量为 4 的环上回绕，每次只能拿到自己槽位的结果
    for i in 0..10u32 {
        let result = producer.request_command(format!("query_{}", i)).unwrap();
        assert_eq!(result, format!("query_{}@{}", i, i % 4));
    }
    executor.join().unwrap();
}

#[test]
fn test_ring_wraps_after_capacity_writes() {
    let store = shared_store();
    let producer = open(&store, 8);
    let capacity = 8u32;
    let extra = 3u32;

    let ids: Vec<u32> = (0..capacity + extra)
        .map(|i| producer.set_command(format!("cmd_{}", i), None, true).unwrap())
        .collect();

    let expected: Vec<u32> = (0..capacity + extra).map(|i| i % capacity).collect();
    assert_eq!(ids, expected);
    assert_eq!(producer.get_last_command_id(false).unwrap(), Some(extra - 1));

    // 被覆盖的槽位保存第二轮的内容，其余保存第一轮的内容
    for slot in 0..capacity {
        let record = producer.get_commands_by_id(slot).unwrap().unwrap();
        let write_index = if slot < extra { slot + capacity } else { slot };
        assert_eq!(record.msg(), Some(format!("cmd_{}", write_index).as_str()));
    }
}

#[test]
fn test_concurrent_producers_never_share_a_slot() {
    let store = shared_store();
    let written = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();

    for p in 0..4 {
        let producer = open(&store, 1000);
        let written = written.clone();
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                let id = producer
                    .set_command(format!("p{}_{}", p, i), None, true)
                    .unwrap();
                written.lock().unwrap().push(id);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let ids = written.lock().unwrap();
    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(ids.len(), 100);
    assert_eq!(unique.len(), 100, "two producers wrote the same slot");
    assert_eq!(unique, (0..100).collect::<HashSet<u32>>());

    let reader = open(&store, 1000);
    assert_eq!(reader.get_last_command_id(false).unwrap(), Some(99));
}

#[test]
fn test_stale_command_is_skipped_without_wait() {
    let store = shared_store();
    let producer = open(&store, 16);
    let consumer = open(&store, 16);

    let id = producer.set_command("old", None, true).unwrap();
    age_slot(&store, id, 3.0 + 0.5);

    assert_eq!(consumer.get_last_command(false, None).unwrap(), None);
    assert_eq!(consumer.get_last_command_with_id(false, None).unwrap(), None);
    assert!(consumer.get_metrics().stale_skips >= 2);
}

#[test]
fn test_stale_command_blocks_until_fresh_one() {
    let store = shared_store();
    let producer = open(&store, 16);
    let consumer = open(&store, 16);

    let id = producer.set_command("old", None, true).unwrap();
    age_slot(&store, id, 3.5);

    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(80));
        producer.set_command("fresh", None, true).unwrap()
    });

    let started = Instant::now();
    let (record, seen) = consumer.get_last_command_with_id(true, None).unwrap().unwrap();
    let fresh_id = writer.join().unwrap();

    assert!(started.elapsed() >= Duration::from_millis(60));
    assert_eq!(seen, fresh_id);
    assert_eq!(record.msg(), Some("fresh"));
}

#[test]
fn test_non_blocking_read_without_watermark() {
    let store = shared_store();
    let consumer = open(&store, 16);
    assert_eq!(consumer.get_last_command_id(false).unwrap(), None);
    assert_eq!(consumer.get_last_command(false, None).unwrap(), None);
}

#[test]
fn test_batch_catch_up_from_checkpoint() {
    let store = shared_store();
    let producer = open(&store, 2000);
    let consumer = open(&store, 2000);

    producer.set_command("c4", Some(4), true).unwrap();
    let first = consumer.get_last_commands().unwrap();
    assert!(first.is_empty());

    for msg in ["c5", "c6", "c7"] {
        producer.set_command(msg, None, true).unwrap();
    }

    let batch = consumer.get_last_commands().unwrap();
    let msgs: Vec<_> = batch.commands.iter().map(|c| c.msg().unwrap()).collect();
    assert_eq!(msgs, ["c5", "c6", "c7"]);
    assert_eq!(batch.start_id, Some(5));
    assert_eq!(batch.end_id, Some(8));

    let second = consumer.get_last_commands().unwrap();
    assert!(second.is_empty());
    assert_eq!((second.start_id, second.end_id), (Some(8), Some(8)));
}

#[test]
fn test_batch_ignores_staleness() {
    let store = shared_store();
    let producer = open(&store, 16);
    let consumer = open(&store, 16);

    producer.set_command("base", None, true).unwrap();
    consumer.get_last_commands().unwrap();

    let id = producer.set_command("old", None, true).unwrap();
    age_slot(&store, id, 60.0);

    let batch = consumer.get_last_commands().unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.commands[0].msg(), Some("old"));
}

#[test]
fn test_stop_flag_observed_at_most_once() {
    let store = shared_store();
    let operator = open(&store, 16);
    let executor = open(&store, 16);

    operator.set_task_stop().unwrap();
    assert!(executor.is_task_stop_set().unwrap());
    assert!(!executor.is_task_stop_set().unwrap());
    assert!(!operator.is_task_stop_set().unwrap());

    operator.set_task_stop().unwrap();
    operator.unset_task_stop().unwrap();
    assert!(!executor.is_task_stop_set().unwrap());
}

#[test]
fn test_stop_flag_single_winner_under_race() {
    let store = shared_store();
    open(&store, 16).set_task_stop().unwrap();

    let winners = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let channel = open(&store, 16);
            let winners = winners.clone();
            thread::spawn(move || {
                if channel.is_task_stop_set().unwrap() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(winners.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stop_watcher_and_info() {
    let store = shared_store();
    let operator = open(&store, 16);
    let executor = open(&store, 16);
    let watcher = executor.watch_stop();

    let reporter = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        operator.write_stop_info("neck: ").unwrap();
        operator.write_stop_info("torque limit").unwrap();
        operator.set_task_stop().unwrap();
    });

    assert!(watcher.recv_timeout(Duration::from_secs(2)).unwrap());
    reporter.join().unwrap();
    assert_eq!(executor.get_stop_info().unwrap(), "neck: torque limit");
    // 读取不清除
    assert_eq!(executor.get_stop_info().unwrap(), "neck: torque limit");

    executor.clear_stop_info().unwrap();
    assert_eq!(executor.stop_signal().info().unwrap(), None);
}

#[test]
fn test_reset_then_reuse() {
    let store = shared_store();
    let producer = open(&store, 8);
    for i in 0..5 {
        producer.set_command(format!("cmd_{}", i), None, true).unwrap();
    }
    producer.reset().unwrap();

    assert_eq!(producer.get_last_command_id(false).unwrap(), None);
    assert_eq!(producer.set_command("again", None, true).unwrap(), 0);
}
