mod helpers {
    include!("../../helpers/mod.rs");
}

use hat_can_core::config::HatConfig;
use hat_can_core::protocol::dispatch::HatHandlers;
use hat_can_core::protocol::messages::{classify, is_emergency_type, msg_type, MessageCategory};
use hat_can_core::protocol::node::HatNode;
use hat_can_core::protocol::safety::{Authority, OperatingState, StateHooks, StateMachineEvent};
use hat_can_core::protocol::transport::{
    can_frame::CanFrame,
    can_id::{decode, encode},
    frame_queue::FrameQueue,
    traits::{frame_sink::Outbox, hat_clock::HatClock},
};
use helpers::ManualClock;

const NODE: u8 = 0x07;
const BASE_STATION: u8 = 0x01;
const OPERATOR: u8 = 0x02;

fn config() -> HatConfig {
    HatConfig::builder(NODE)
        .source_authority(BASE_STATION, Authority::BaseStation)
        .source_authority(OPERATOR, Authority::Operator)
        .build()
        .expect("valid config")
}

#[derive(Default)]
struct Drivers {
    control: Vec<u8>,
    send_failures: usize,
}

impl HatHandlers for Drivers {
    fn on_control(&mut self, frame: &CanFrame, _state: OperatingState) {
        self.control.push(frame.id.message_type());
    }

    fn on_send_failure(&mut self, _message_type: u8) {
        self.send_failures += 1;
    }
}

/// Re-homes actuators when leaving `Locked`.
#[derive(Default)]
struct Actuators {
    rehomed: usize,
}

impl StateHooks for Actuators {
    fn on_exit_state(&mut self, state: OperatingState) {
        if state == OperatingState::Locked {
            self.rehomed += 1;
        }
    }
}

#[test]
/// Boot, rejected arm, lock/unlock, actuator commands, then an idle timeout.
fn boot_to_timeout_scenario() {
    let clock = ManualClock::new();
    let queue: FrameQueue<16> = FrameQueue::new();
    let producer = queue.producer();
    let mut outbox: Outbox<32> = Outbox::new();
    let mut drivers = Drivers::default();
    let mut node = HatNode::with_hooks(config(), Actuators::default(), clock.now());

    node.tick(&queue, &mut drivers, &mut outbox, clock.now());
    assert_eq!(
        node.state_machine().current_state(),
        OperatingState::Disarmed
    );

    clock.advance_ms(10);
    producer.on_frame_received(encode(3, BASE_STATION, NODE, msg_type::STATE_ARM), &[], clock.now());
    producer.on_frame_received(encode(3, OPERATOR, NODE, msg_type::CONTROL_START), &[1], clock.now());
    producer.on_frame_received(encode(3, OPERATOR, NODE, msg_type::STATE_LOCK), &[], clock.now());
    producer.on_frame_received(encode(3, OPERATOR, NODE, msg_type::STATE_UNLOCK), &[], clock.now());
    producer.on_frame_received(encode(3, OPERATOR, 0xFF, msg_type::CONTROL_START), &[1], clock.now());
    producer.on_frame_received(encode(3, OPERATOR, 0x05, msg_type::CONTROL_ENABLE), &[], clock.now());
    node.tick(&queue, &mut drivers, &mut outbox, clock.now());

    let sm = node.state_machine();
    assert_eq!(sm.current_state(), OperatingState::Unlocked);
    assert_eq!(sm.previous_state(), OperatingState::Locked);
    assert_eq!(sm.hooks().rehomed, 1);
    assert_eq!(drivers.control, vec![msg_type::CONTROL_START]);

    let stats = node.stats();
    assert_eq!(stats.frames_seen, 6);
    assert_eq!(stats.foreign, 1);
    assert_eq!(stats.denied, 1);
    assert_eq!(stats.rejected_events, 1);

    // Activity at t=10 ms; the default unlocked timeout is 5000 ms.
    clock.set_ms(5010);
    assert!(node
        .tick(&queue, &mut drivers, &mut outbox, clock.now())
        .timeout
        .is_none());
    clock.set_ms(5011);
    let report = node.tick(&queue, &mut drivers, &mut outbox, clock.now());
    assert!(matches!(report.timeout, Some(Ok(change)) if change.to == OperatingState::Locked));

    for _ in 0..10 {
        clock.advance_ms(1000);
        let report = node.tick(&queue, &mut drivers, &mut outbox, clock.now());
        assert!(report.timeout.is_none());
    }
    assert_eq!(node.state_machine().current_state(), OperatingState::Locked);
    assert_eq!(drivers.send_failures, 0);
}

#[test]
/// The state-emergency identifier decodes as documented and stops the node.
fn state_emergency_identifier_scenario() {
    let raw = encode(3, 0x07, 0xFF, 0x34);
    let fields = decode(raw);
    assert_eq!(
        (fields.priority, fields.source_node, fields.target_node, fields.message_type),
        (3, 7, 255, 0x34)
    );
    assert_eq!(classify(0x34), MessageCategory::StateCommand);
    assert!(is_emergency_type(0x34));

    let clock = ManualClock::new();
    let queue: FrameQueue<4> = FrameQueue::new();
    let mut outbox: Outbox<8> = Outbox::new();
    let mut node = HatNode::new(config(), clock.now());

    queue.producer().on_frame_received(raw, &[], clock.now());
    node.tick(&queue, &mut (), &mut outbox, clock.now());
    assert_eq!(
        node.state_machine().current_state(),
        OperatingState::EmergencyStop
    );
    assert!(node.state_machine().emergency_flag());

    let mut stops = 0;
    while let Some(frame) = outbox.pop() {
        if frame.id.message_type() == msg_type::EMERGENCY_STOP {
            stops += 1;
        }
    }
    assert_eq!(stops, 1);
}

#[test]
/// A flood larger than the queue keeps the newest frames, in order.
fn queue_flood_scenario() {
    let clock = ManualClock::new();
    let queue: FrameQueue<4> = FrameQueue::new();
    let producer = queue.producer();
    let mut outbox: Outbox<16> = Outbox::new();
    let mut drivers = Drivers::default();
    let mut node = HatNode::new(config(), clock.now());

    // Reach Unlocked so every control command is honored.
    node.state_machine_mut()
        .process_event(
            StateMachineEvent::Lock,
            Authority::Operator,
            clock.now(),
        )
        .expect("lock accepted");
    node.state_machine_mut()
        .process_event(
            StateMachineEvent::Unlock,
            Authority::Operator,
            clock.now(),
        )
        .expect("unlock accepted");

    for message_type in 0x00..0x08u8 {
        producer.on_frame_received(encode(3, OPERATOR, NODE, message_type), &[], clock.now());
    }
    assert_eq!(queue.dropped(), 4);

    let report = node.tick(&queue, &mut drivers, &mut outbox, clock.now());
    assert_eq!(report.frames, 4);
    assert_eq!(drivers.control, vec![0x04, 0x05, 0x06, 0x07]);
}
