//! Per-frame routing from the receive queue to the node's handlers.
//!
//! For each drained frame the dispatcher:
//! 1. decodes the identifier,
//! 2. applies the admission filter (broadcast or this node's id),
//! 3. classifies the message type,
//! 4. routes it to the state machine, the status responder, or the
//!    node-supplied [`HatHandlers`].
//!
//! Nothing on this path returns an error to the loop driver: a foreign,
//! unknown, denied or rejected frame only shows up in [`DispatchStats`] and in
//! the returned [`Disposition`], and never prevents the next frame from being
//! processed. The dispatcher holds no state beyond its counters.
use embassy_time::Instant;

use crate::config::HatConfig;
use crate::error::TransitionError;
use crate::protocol::messages::{
    classify, is_emergency_type, msg_type, state_event_for, MessageCategory,
};
use crate::protocol::safety::{
    Authority, OperatingState, StateChange, StateHooks, StateMachine, StateMachineEvent,
};
use crate::protocol::transport::{can_frame::CanFrame, traits::frame_sink::FrameSink};

/// Capabilities supplied by a concrete HAT: component drivers, configuration
/// store, and error indication. Every method defaults to a no-op.
pub trait HatHandlers {
    /// A control command the current state permits.
    fn on_control(&mut self, _frame: &CanFrame, _state: OperatingState) {}

    /// A configuration command the current state permits.
    fn on_config(&mut self, _frame: &CanFrame, _state: OperatingState) {}

    /// An accepted state transition, after the state response was emitted.
    fn on_state_change(&mut self, _change: &StateChange) {}

    /// The sink refused an outbound frame (error indication, e.g. an LED).
    fn on_send_failure(&mut self, _message_type: u8) {}
}

impl HatHandlers for () {}

/// Dispatcher counters. All wrap on overflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DispatchStats {
    /// Frames handed to `dispatch`.
    pub frames_seen: u32,
    /// Frames that passed admission and reached a known category.
    pub dispatched: u32,
    /// Frames addressed to another node.
    pub foreign: u32,
    /// Frames with an unassigned message type.
    pub unknown: u32,
    /// Control/config commands the current state does not permit.
    pub denied: u32,
    /// State events refused by the state machine.
    pub rejected_events: u32,
    /// Outbound frames accepted by the sink.
    pub sent: u32,
    /// Outbound frames refused by the sink.
    pub send_errors: u32,
}

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Disposition {
    /// Addressed to another node; discarded silently.
    Foreign,
    /// Unassigned message type; discarded and counted.
    Unknown,
    /// Accepted but nothing to do (telemetry, responses from other nodes).
    Ignored,
    /// Passed to [`HatHandlers::on_control`].
    Control,
    /// Passed to [`HatHandlers::on_config`].
    Config,
    /// Command refused by the state gate.
    Denied,
    /// Status response emitted.
    StatusResponded,
    /// State response emitted for a state query.
    StateReported,
    /// State event accepted.
    Transition(StateChange),
    /// State event refused by the state machine.
    Rejected(TransitionError),
}

//==================================================================================DISPATCHER
/// Routes received frames for one node.
#[derive(Debug, Default)]
pub struct Dispatcher {
    stats: DispatchStats,
}

impl Dispatcher {
    pub const fn new() -> Self {
        Self {
            stats: DispatchStats {
                frames_seen: 0,
                dispatched: 0,
                foreign: 0,
                unknown: 0,
                denied: 0,
                rejected_events: 0,
                sent: 0,
                send_errors: 0,
            },
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Process one received frame.
    pub fn dispatch<H, T, S>(
        &mut self,
        config: &HatConfig,
        sm: &mut StateMachine<H>,
        frame: &CanFrame,
        handlers: &mut T,
        sink: &mut S,
        now: Instant,
    ) -> Disposition
    where
        H: StateHooks,
        T: HatHandlers + ?Sized,
        S: FrameSink + ?Sized,
    {
        self.stats.frames_seen = self.stats.frames_seen.wrapping_add(1);
        let id = frame.id.fields();

        if !config.accepts_target(id.target_node) {
            self.stats.foreign = self.stats.foreign.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::trace!("Frame for node {} ignored", id.target_node);
            return Disposition::Foreign;
        }

        let category = classify(id.message_type);
        if category == MessageCategory::Unknown {
            self.stats.unknown = self.stats.unknown.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::debug!("Unknown message type {=u8:#x}", id.message_type);
            return Disposition::Unknown;
        }
        self.stats.dispatched = self.stats.dispatched.wrapping_add(1);

        if is_emergency_type(id.message_type) {
            return self.apply_event(
                config,
                sm,
                StateMachineEvent::Emergency,
                Authority::Emergency,
                handlers,
                sink,
                now,
            );
        }

        match category {
            MessageCategory::Control => {
                if !sm.is_command_allowed(id.message_type) {
                    return self.deny(id.message_type, sm.current_state());
                }
                sm.record_activity(now);
                handlers.on_control(frame, sm.current_state());
                Disposition::Control
            }
            MessageCategory::Config => {
                if !sm.is_command_allowed(id.message_type) {
                    return self.deny(id.message_type, sm.current_state());
                }
                sm.record_activity(now);
                handlers.on_config(frame, sm.current_state());
                Disposition::Config
            }
            MessageCategory::StatusQuery => match id.message_type {
                msg_type::STATUS_REQUEST | msg_type::PARAM_REQUEST | msg_type::DIAGNOSTIC_REQUEST => {
                    let response = config.responder().status_response(
                        self.stats.frames_seen,
                        self.stats.send_errors,
                        now,
                    );
                    self.emit(&response, handlers, sink);
                    Disposition::StatusResponded
                }
                _ => Disposition::Ignored,
            },
            MessageCategory::StateCommand => match state_event_for(id.message_type) {
                Some(event) => self.apply_event(
                    config,
                    sm,
                    event,
                    config.authority_of(id.source_node),
                    handlers,
                    sink,
                    now,
                ),
                None if id.message_type == msg_type::STATE_QUERY => {
                    let response = config.responder().state_response(sm.current_state(), now);
                    self.emit(&response, handlers, sink);
                    Disposition::StateReported
                }
                None => Disposition::Ignored,
            },
            // Outbound only; the emergency range was routed above.
            MessageCategory::Telemetry | MessageCategory::Emergency | MessageCategory::Unknown => {
                Disposition::Ignored
            }
        }
    }

    /// Announce an accepted transition: state response, plus the emergency-stop
    /// broadcast when `EmergencyStop` was just entered.
    pub fn report_change<T, S>(
        &mut self,
        config: &HatConfig,
        change: &StateChange,
        handlers: &mut T,
        sink: &mut S,
        now: Instant,
    ) where
        T: HatHandlers + ?Sized,
        S: FrameSink + ?Sized,
    {
        if !change.entered_new_state() {
            return;
        }
        let responder = config.responder();
        if change.entered_emergency_stop() {
            self.emit(&responder.emergency_stop(now), handlers, sink);
        }
        self.emit(&responder.state_response(change.to, now), handlers, sink);
        handlers.on_state_change(change);
    }

    /// Hand a frame to the sink, counting the outcome. Failures are reported,
    /// never retried.
    pub fn emit<T, S>(&mut self, frame: &CanFrame, handlers: &mut T, sink: &mut S) -> bool
    where
        T: HatHandlers + ?Sized,
        S: FrameSink + ?Sized,
    {
        match sink.send_frame(frame) {
            Ok(()) => {
                self.stats.sent = self.stats.sent.wrapping_add(1);
                true
            }
            Err(_err) => {
                self.stats.send_errors = self.stats.send_errors.wrapping_add(1);
                #[cfg(feature = "defmt")]
                defmt::error!("Send failed for message type {=u8:#x}", frame.id.message_type());
                handlers.on_send_failure(frame.id.message_type());
                false
            }
        }
    }

    /// Record a send failure that happened outside [`emit`](Self::emit),
    /// e.g. on the asynchronous bus.
    pub fn record_send_failure(&mut self) {
        self.stats.send_errors = self.stats.send_errors.wrapping_add(1);
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_event<H, T, S>(
        &mut self,
        config: &HatConfig,
        sm: &mut StateMachine<H>,
        event: StateMachineEvent,
        authority: Authority,
        handlers: &mut T,
        sink: &mut S,
        now: Instant,
    ) -> Disposition
    where
        H: StateHooks,
        T: HatHandlers + ?Sized,
        S: FrameSink + ?Sized,
    {
        match sm.process_event(event, authority, now) {
            Ok(change) => {
                self.report_change(config, &change, handlers, sink, now);
                Disposition::Transition(change)
            }
            Err(err) => {
                self.stats.rejected_events = self.stats.rejected_events.wrapping_add(1);
                Disposition::Rejected(err)
            }
        }
    }

    fn deny(&mut self, _message_type: u8, _state: OperatingState) -> Disposition {
        self.stats.denied = self.stats.denied.wrapping_add(1);
        #[cfg(feature = "defmt")]
        defmt::warn!("Command {=u8:#x} not allowed in {}", _message_type, _state);
        Disposition::Denied
    }
}
