//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (rejected state transition,
//! malformed frame, invalid configuration, telemetry decoding, runner I/O).
use crate::protocol::safety::{Authority, OperatingState, StateMachineEvent};
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Reasons for which the safety state machine refuses an event.
/// A rejection never mutates the machine.
pub enum TransitionError {
    /// The node sits in `EmergencyStop`; only an authorized `Reset` leaves it.
    #[error("Emergency stop latched: only an authorized reset is accepted")]
    EmergencyLatched,
    /// The transition table has no row for this `(state, event)` pair.
    #[error("No transition for {event:?} from {state:?}")]
    NoTransition {
        state: OperatingState,
        event: StateMachineEvent,
    },
    /// The caller's authority is below the minimum for this transition.
    #[error("Insufficient authority: required {required:?}, provided {provided:?}")]
    InsufficientAuthority {
        required: Authority,
        provided: Authority,
    },
    /// The node-specific hooks refused the transition.
    #[error("Transition {from:?} -> {to:?} vetoed by node hooks")]
    Vetoed {
        from: OperatingState,
        to: OperatingState,
    },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors raised while building a CAN frame.
pub enum FrameError {
    /// Classic CAN carries at most eight payload bytes.
    #[error("Payload too long for a classic CAN frame: {len} bytes")]
    PayloadTooLong { len: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Errors detected while validating a node configuration.
pub enum ConfigError {
    /// The broadcast address cannot be used as a node identifier.
    #[error("Node id 0xFF is reserved for broadcast")]
    BroadcastNodeId,
    /// A deployment may tighten the minimum authority of an event, never loosen it.
    #[error("Minimum authority for {event:?} cannot be loosened")]
    LoosenedAuthority { event: StateMachineEvent },
    /// Emergency and timeout authority are fixed by the core.
    #[error("Minimum authority for {event:?} is fixed")]
    FixedAuthority { event: StateMachineEvent },
    /// A timeout was configured for a state without a `Timeout` transition.
    #[error("State {state:?} has no timeout transition")]
    TimeoutWithoutTransition { state: OperatingState },
    /// Periodic intervals must be strictly positive.
    #[error("Interval must be greater than zero")]
    ZeroInterval,
    /// The source-node authority map is full.
    #[error("Authority map is full")]
    AuthorityMapFull,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Failures while decoding or encoding a telemetry payload.
pub enum TelemetryError {
    /// Telemetry frames always carry eight bytes.
    #[error("Invalid telemetry payload length: {len}")]
    InvalidLength { len: usize },
    /// Discriminant byte does not name a known value kind.
    #[error("Unknown telemetry value kind: {tag}")]
    UnknownKind { tag: u8 },
    /// Text values are limited to the four-byte value slot.
    #[error("Telemetry text does not fit the value slot")]
    TextTooLong,
    /// Text slot does not hold valid UTF-8.
    #[error("Telemetry text is not valid UTF-8")]
    InvalidText,
}

//==================================================================================RUNNER_ERROR
#[derive(Debug, Error)]
/// Errors terminating the asynchronous node runner.
pub enum RunnerError<E: core::fmt::Debug> {
    /// The CAN bus failed while waiting for a frame.
    #[error("CAN bus receive error: {0:?}")]
    Receive(E),
}
