//! 运动命令端到端测试
//!
//! 生产者通过 `MotionCommander` 发送，执行端用命令语法解析收到的文本。

use cmdring_sdk::SdkConfig;
use cmdring_sdk::channel::{ChannelConfig, CommandChannel, CommandConsumer};
use cmdring_sdk::commander::{ControllerData, ControllerMessage, MoveBaseCommand, MoveBaseMode};
use cmdring_sdk::store::{KvStore, MemoryStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> SdkConfig {
    SdkConfig {
        channel: ChannelConfig {
            poll_interval_ms: 5,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn test_speed_commands_reach_executor_in_order() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let config = fast_config();
    let (mut commander, _) = cmdring_sdk::open_commander(store.clone(), &config).unwrap();
    let reader = cmdring_sdk::open_channel(store, &config).unwrap();

    let inputs = [(0.2, 0.0), (0.2, 0.0), (-0.2, 0.5), (0.0, 0.0), (0.01, 0.0)];
    let sent: Vec<_> = inputs
        .iter()
        .map(|&(v, w)| commander.set_movebase_speed(v, w).unwrap())
        .collect();
    assert_eq!(sent, [Some(0), None, Some(1), Some(2), None]);

    assert_eq!(reader.get_last_command_id(false).unwrap(), Some(2));
    let received: Vec<MoveBaseCommand> = (0..3)
        .map(|id| {
            let record = reader.get_commands_by_id(id).unwrap().unwrap();
            MoveBaseCommand::parse(record.msg().unwrap()).unwrap()
        })
        .collect();
    assert_eq!(
        received[0],
        MoveBaseCommand::Dist {
            forward: 0.5,
            turn_left: 0.0,
            speed: Some(0.2),
            turn_speed: Some(10.0),
        }
    );
    match received[1] {
        MoveBaseCommand::Dist {
            forward,
            turn_left,
            turn_speed,
            ..
        } => {
            assert_eq!(forward, -0.5);
            assert_eq!(turn_left, 45.0);
            // 0.5 rad/s ≈ 28.6479 °/s
            assert_eq!(turn_speed, Some(28.6479));
        },
        other => panic!("Expected Dist, got {:?}", other),
    }
    assert_eq!(received[2], MoveBaseCommand::STAY);
}

#[test]
fn test_query_round_trip_through_commander() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let config = fast_config();
    let (commander, _) = cmdring_sdk::open_commander(store.clone(), &config).unwrap();
    let consumer = CommandConsumer::new(cmdring_sdk::open_channel(store, &config).unwrap());

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let server = thread::spawn(move || {
        consumer
            .serve(&flag, |command| match command.kind() {
                "get_movebase_enable_status" => "1".to_string(),
                "set_movebase_mode" => match MoveBaseCommand::parse(command.msg()) {
                    Ok(_) => "ok".to_string(),
                    Err(e) => format!("error: {}", e),
                },
                other => format!("unknown: {}", other),
            })
            .unwrap()
    });

    assert_eq!(
        commander.request_msg("get_movebase_enable_status").unwrap(),
        "1"
    );
    assert_eq!(
        commander
            .request_msg(&MoveBaseCommand::Mode(MoveBaseMode::LocAndRot).render())
            .unwrap(),
        "ok"
    );
    assert_eq!(
        commander.request_msg("set_movebase_mode,fly_mode").unwrap(),
        "error: Unknown movebase mode: fly_mode"
    );

    running.store(false, Ordering::Release);
    assert_eq!(server.join().unwrap(), 3);
}

#[test]
fn test_controller_stream_is_throttled() {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let config = fast_config();
    let (mut commander, mut throttle) =
        cmdring_sdk::open_commander(store.clone(), &config).unwrap();
    let reader = CommandChannel::new(store, config.channel.clone()).unwrap();

    // 1 秒内 50 Hz 的上报：前半段全速前进，后半段松开摇杆
    let t0 = Instant::now();
    let mut sent = Vec::new();
    for i in 0..50u64 {
        let axes = if i < 25 {
            vec![0.0, 0.0, 0.0, -1.0]
        } else {
            vec![0.0; 4]
        };
        let message = ControllerMessage {
            controller_id: "controller1".to_string(),
            data: ControllerData {
                axes,
                buttons: Vec::new(),
            },
        };
        let payload = message.to_json().unwrap();
        let decoded = ControllerMessage::from_json(payload.as_bytes()).unwrap();
        let now = t0 + Duration::from_millis(i * 20);
        if let Some(id) = throttle.handle_at(now, &mut commander, &decoded.data).unwrap() {
            sent.push(id);
        }
    }

    // 只有第一次前进和第一次停止真正写入通道
    assert_eq!(sent, [0, 1]);
    assert_eq!(reader.get_last_command_id(false).unwrap(), Some(1));
    assert_eq!(
        reader.get_commands_by_id(1).unwrap().unwrap().msg(),
        Some("set_movebase_mode,stay_at_location_mode")
    );
}
