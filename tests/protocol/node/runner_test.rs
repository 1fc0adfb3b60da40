mod helpers {
    include!("../../helpers/mod.rs");
}

use embassy_time::Duration as HatDuration;
use hat_can_core::config::HatConfig;
use hat_can_core::error::RunnerError;
use hat_can_core::protocol::messages::msg_type;
use hat_can_core::protocol::node::{runner::NodeRunner, HatNode};
use hat_can_core::protocol::safety::{Authority, OperatingState};
use hat_can_core::protocol::transport::{
    can_frame::CanFrame,
    can_id::{encode, CanId},
    frame_queue::FrameQueue,
    traits::{can_bus::CanBus, hat_clock::HatClock},
};
use helpers::{drain_bus, MockCanBus, MockTimer, TokioClock};
use static_cell::StaticCell;
use tokio::time::{sleep, Duration};

const NODE: u8 = 0x07;
const BASE_STATION: u8 = 0x01;
const OPERATOR: u8 = 0x02;

static STATE_QUEUE: StaticCell<FrameQueue<16>> = StaticCell::new();
static TIMEOUT_QUEUE: StaticCell<FrameQueue<16>> = StaticCell::new();
static EMERGENCY_QUEUE: StaticCell<FrameQueue<16>> = StaticCell::new();
static CLOSED_QUEUE: StaticCell<FrameQueue<16>> = StaticCell::new();
static TRAFFIC_QUEUE: StaticCell<FrameQueue<16>> = StaticCell::new();
static ORDER_QUEUE: StaticCell<FrameQueue<16>> = StaticCell::new();

fn config() -> HatConfig {
    HatConfig::builder(NODE)
        .source_authority(BASE_STATION, Authority::BaseStation)
        .source_authority(OPERATOR, Authority::Operator)
        .build()
        .expect("valid config")
}

fn command(source: u8, message_type: u8) -> CanFrame {
    CanFrame::new(
        CanId(encode(3, source, NODE, message_type)),
        &[],
        embassy_time::Instant::from_ticks(0),
    )
    .expect("valid frame")
}

fn types(frames: &[CanFrame]) -> Vec<u8> {
    frames.iter().map(|f| f.id.message_type()).collect()
}

#[tokio::test]
async fn runner_applies_state_commands_and_reports() {
    let queue = STATE_QUEUE.init(FrameQueue::new());
    let (dut_bus, mut host_bus) = MockCanBus::create_pair();
    let clock = TokioClock::new();
    let node = HatNode::new(config(), clock.now());
    let mut runner: NodeRunner<'_, _, _, _, _, 16, 8> =
        NodeRunner::new(dut_bus, MockTimer, clock, queue, node).with_tick_ms(5);

    host_bus.send(&command(OPERATOR, msg_type::STATE_LOCK)).await.unwrap();
    host_bus.send(&command(OPERATOR, msg_type::STATE_UNLOCK)).await.unwrap();
    host_bus.send(&command(OPERATOR, msg_type::STATUS_REQUEST)).await.unwrap();

    let mut handlers = ();
    tokio::select! {
        result = runner.drive(&mut handlers) => panic!("runner stopped: {result:?}"),
        _ = sleep(Duration::from_millis(100)) => {}
    }

    let state = runner.node().state_machine();
    assert_eq!(state.current_state(), OperatingState::Unlocked);
    assert_eq!(state.previous_state(), OperatingState::Locked);

    let sent = types(&drain_bus(&host_bus).await);
    assert!(sent.contains(&msg_type::HEARTBEAT));
    assert!(sent.contains(&msg_type::STATUS_RESPONSE));
    assert_eq!(
        sent.iter().filter(|t| **t == msg_type::STATE_RESPONSE).count(),
        2
    );
}

#[tokio::test]
async fn runner_times_out_unlocked_once() {
    let queue = TIMEOUT_QUEUE.init(FrameQueue::new());
    let (dut_bus, mut host_bus) = MockCanBus::create_pair();
    let clock = TokioClock::new();
    let config = HatConfig::builder(NODE)
        .source_authority(OPERATOR, Authority::Operator)
        .state_timeout(OperatingState::Unlocked, Some(HatDuration::from_millis(50)))
        .build()
        .expect("valid config");
    let node = HatNode::new(config, clock.now());
    let mut runner: NodeRunner<'_, _, _, _, _, 16, 8> =
        NodeRunner::new(dut_bus, MockTimer, clock, queue, node).with_tick_ms(5);

    host_bus.send(&command(OPERATOR, msg_type::STATE_LOCK)).await.unwrap();
    host_bus.send(&command(OPERATOR, msg_type::STATE_UNLOCK)).await.unwrap();

    let mut handlers = ();
    tokio::select! {
        result = runner.drive(&mut handlers) => panic!("runner stopped: {result:?}"),
        _ = sleep(Duration::from_millis(300)) => {}
    }

    assert_eq!(
        runner.node().state_machine().current_state(),
        OperatingState::Locked
    );
    let responses: Vec<u8> = drain_bus(&host_bus)
        .await
        .iter()
        .filter(|f| f.id.message_type() == msg_type::STATE_RESPONSE)
        .map(|f| f.payload()[1])
        .collect();
    assert_eq!(
        responses,
        vec![
            OperatingState::Locked as u8,
            OperatingState::Unlocked as u8,
            OperatingState::Locked as u8,
        ]
    );
}

#[tokio::test]
async fn runner_broadcasts_emergency_stop() {
    let queue = EMERGENCY_QUEUE.init(FrameQueue::new());
    let (dut_bus, mut host_bus) = MockCanBus::create_pair();
    let clock = TokioClock::new();
    let node = HatNode::new(config(), clock.now());
    let mut runner: NodeRunner<'_, _, _, _, _, 16, 8> =
        NodeRunner::new(dut_bus, MockTimer, clock, queue, node).with_tick_ms(5);

    let thermal = CanFrame::new(
        CanId(encode(0, 0x03, 0xFF, msg_type::EMERGENCY_THERMAL)),
        &[],
        embassy_time::Instant::from_ticks(0),
    )
    .unwrap();
    host_bus.send(&thermal).await.unwrap();
    host_bus.send(&command(OPERATOR, msg_type::STATE_LOCK)).await.unwrap();

    let mut handlers = ();
    tokio::select! {
        result = runner.drive(&mut handlers) => panic!("runner stopped: {result:?}"),
        _ = sleep(Duration::from_millis(100)) => {}
    }

    let state = runner.node().state_machine();
    assert_eq!(state.current_state(), OperatingState::EmergencyStop);
    assert!(state.emergency_flag());
    assert_eq!(runner.node().stats().rejected_events, 1);

    let stops: Vec<CanFrame> = drain_bus(&host_bus)
        .await
        .into_iter()
        .filter(|f| f.id.message_type() == msg_type::EMERGENCY_STOP)
        .collect();
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].id.priority(), 0);
    assert_eq!(stops[0].id.source_node(), NODE);
}

#[tokio::test]
async fn runner_stops_on_receive_error() {
    let queue = CLOSED_QUEUE.init(FrameQueue::new());
    let (dut_bus, host_bus) = MockCanBus::create_pair();
    let clock = TokioClock::new();
    let node = HatNode::new(config(), clock.now());
    let mut runner: NodeRunner<'_, _, _, _, _, 16, 8> =
        NodeRunner::new(dut_bus, MockTimer, clock, queue, node).with_tick_ms(5);

    drop(host_bus);

    let mut handlers = ();
    let outcome = tokio::time::timeout(Duration::from_secs(1), runner.drive(&mut handlers)).await;
    assert!(matches!(outcome, Ok(Err(RunnerError::Receive(())))));
}

#[tokio::test]
async fn runner_ticks_under_continuous_traffic() {
    let queue = TRAFFIC_QUEUE.init(FrameQueue::new());
    let (dut_bus, mut host_bus) = MockCanBus::create_pair();
    let clock = TokioClock::new();
    let node = HatNode::new(config(), clock.now());
    let mut runner: NodeRunner<'_, _, _, _, _, 16, 8> =
        NodeRunner::new(dut_bus, MockTimer, clock, queue, node).with_tick_ms(10);

    let thermal = CanFrame::new(
        CanId(encode(0, 0x03, 0xFF, msg_type::EMERGENCY_THERMAL)),
        &[],
        embassy_time::Instant::from_ticks(0),
    )
    .unwrap();
    host_bus.send(&thermal).await.unwrap();

    // Another node's telemetry arrives faster than the tick period.
    let telemetry = CanFrame::new(
        CanId(encode(5, 0x05, 0xFF, msg_type::TELEMETRY_SENSOR)),
        &[1, 2, 3, 4],
        embassy_time::Instant::from_ticks(0),
    )
    .unwrap();
    let mut chatter_bus = host_bus.clone();
    let chatter = async {
        loop {
            chatter_bus.send(&telemetry).await.unwrap();
            sleep(Duration::from_millis(2)).await;
        }
    };

    let mut handlers = ();
    tokio::select! {
        result = runner.drive(&mut handlers) => panic!("runner stopped: {result:?}"),
        _ = chatter => unreachable!(),
        _ = sleep(Duration::from_millis(500)) => {}
    }

    let state = runner.node().state_machine();
    assert_eq!(state.current_state(), OperatingState::EmergencyStop);
    assert!(runner.node().stats().frames_seen > 20);

    let sent = types(&drain_bus(&host_bus).await);
    assert!(sent.contains(&msg_type::HEARTBEAT));
    assert_eq!(
        sent.iter().filter(|t| **t == msg_type::EMERGENCY_STOP).count(),
        1
    );
}

#[tokio::test]
async fn runner_sends_emergency_stop_first_when_outbox_overflows() {
    let queue: &'static FrameQueue<16> = ORDER_QUEUE.init(FrameQueue::new());
    let (dut_bus, host_bus) = MockCanBus::create_pair();
    let clock = TokioClock::new();
    let node = HatNode::new(config(), clock.now());

    // One tick's worth of replies is more than the outbox holds.
    let producer = queue.producer();
    for _ in 0..9 {
        producer.on_frame_received(
            encode(3, OPERATOR, NODE, msg_type::STATUS_REQUEST),
            &[],
            clock.now(),
        );
    }
    producer.on_frame_received(
        encode(0, 0x03, 0xFF, msg_type::EMERGENCY_THERMAL),
        &[],
        clock.now(),
    );

    let mut runner: NodeRunner<'_, _, _, _, _, 16, 8> =
        NodeRunner::new(dut_bus, MockTimer, clock, queue, node).with_tick_ms(5);

    let mut handlers = ();
    tokio::select! {
        result = runner.drive(&mut handlers) => panic!("runner stopped: {result:?}"),
        _ = sleep(Duration::from_millis(50)) => {}
    }

    assert_eq!(
        runner.node().state_machine().current_state(),
        OperatingState::EmergencyStop
    );
    assert!(runner.node().stats().send_errors > 0);

    let sent = types(&drain_bus(&host_bus).await);
    assert_eq!(sent.first(), Some(&msg_type::EMERGENCY_STOP));
    assert_eq!(
        sent.iter().filter(|t| **t == msg_type::EMERGENCY_STOP).count(),
        1
    );
}
