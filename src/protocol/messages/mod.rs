//! HAT message catalogue: message-type constants, range classification into
//! handler categories, reserved logical addresses, outbound frame builders, and
//! the telemetry value variant.
use crate::protocol::safety::StateMachineEvent;

pub mod responses;
pub mod telemetry;

/// Message-type bytes (bits 7..0 of the identifier).
pub mod msg_type {
    // Control commands (0x00-0x0F)
    pub const CONTROL_START: u8 = 0x00;
    pub const CONTROL_STOP: u8 = 0x01;
    pub const CONTROL_RESET: u8 = 0x02;
    pub const CONTROL_ENABLE: u8 = 0x03;
    pub const CONTROL_DISABLE: u8 = 0x04;
    pub const CONTROL_SET_PARAM: u8 = 0x05;

    // Status, parameter, and diagnostic exchange (0x10-0x1F)
    pub const STATUS_REQUEST: u8 = 0x10;
    pub const STATUS_RESPONSE: u8 = 0x11;
    pub const PARAM_REQUEST: u8 = 0x12;
    pub const PARAM_RESPONSE: u8 = 0x13;
    pub const DIAGNOSTIC_REQUEST: u8 = 0x14;
    pub const DIAGNOSTIC_RESPONSE: u8 = 0x15;

    // Telemetry, outbound only (0x20-0x2F)
    pub const TELEMETRY_SENSOR: u8 = 0x20;
    pub const TELEMETRY_STATUS: u8 = 0x21;
    pub const TELEMETRY_ERROR: u8 = 0x22;
    pub const HEARTBEAT: u8 = 0x23;

    // State machine commands (0x30-0x3F)
    pub const STATE_UNLOCK: u8 = 0x30;
    pub const STATE_DISARM: u8 = 0x31;
    pub const STATE_ARM: u8 = 0x32;
    pub const STATE_LOCK: u8 = 0x33;
    pub const STATE_EMERGENCY: u8 = 0x34;
    pub const STATE_RESET: u8 = 0x35;
    pub const STATE_QUERY: u8 = 0x36;
    pub const STATE_RESPONSE: u8 = 0x37;
    pub const STATE_POWER_ON: u8 = 0x38;
    pub const STATE_POWER_OFF: u8 = 0x39;

    // Configuration (0x40-0x4F)
    pub const CONFIG_SET: u8 = 0x40;
    pub const CONFIG_GET: u8 = 0x41;
    pub const CONFIG_SAVE: u8 = 0x42;
    pub const CONFIG_LOAD: u8 = 0x43;

    // Emergency and system messages (0xF0-0xFF)
    pub const EMERGENCY_STOP: u8 = 0xF0;
    pub const EMERGENCY_BATTERY: u8 = 0xF1;
    pub const EMERGENCY_THERMAL: u8 = 0xF2;
    pub const EMERGENCY_COMM: u8 = 0xF3;
    pub const SYSTEM_SHUTDOWN: u8 = 0xFF;
}

//==================================================================================CATEGORY
/// Handler bucket selected by the message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageCategory {
    Control,
    StatusQuery,
    Telemetry,
    StateCommand,
    Config,
    Emergency,
    /// Dropped and counted.
    Unknown,
}

impl MessageCategory {
    /// Every category, `Unknown` last.
    pub const ALL: [MessageCategory; 7] = [
        MessageCategory::Control,
        MessageCategory::StatusQuery,
        MessageCategory::Telemetry,
        MessageCategory::StateCommand,
        MessageCategory::Config,
        MessageCategory::Emergency,
        MessageCategory::Unknown,
    ];
}

/// Classify a message-type byte. Total: every byte maps to exactly one category.
#[inline]
pub const fn classify(message_type: u8) -> MessageCategory {
    match message_type {
        0x00..=0x0F => MessageCategory::Control,
        0x10..=0x1F => MessageCategory::StatusQuery,
        0x20..=0x2F => MessageCategory::Telemetry,
        0x30..=0x3F => MessageCategory::StateCommand,
        0x40..=0x4F => MessageCategory::Config,
        0xF0..=0xFF => MessageCategory::Emergency,
        _ => MessageCategory::Unknown,
    }
}

/// True for message types that must reach the state machine as the
/// unconditional `Emergency` event: the whole emergency range plus the
/// state-emergency command.
#[inline]
pub const fn is_emergency_type(message_type: u8) -> bool {
    matches!(classify(message_type), MessageCategory::Emergency)
        || message_type == msg_type::STATE_EMERGENCY
}

/// State-machine event carried by a state-command message type.
///
/// Returns `None` for the query/response types and unassigned codes.
pub const fn state_event_for(message_type: u8) -> Option<StateMachineEvent> {
    match message_type {
        msg_type::STATE_UNLOCK => Some(StateMachineEvent::Unlock),
        msg_type::STATE_DISARM => Some(StateMachineEvent::Disarm),
        msg_type::STATE_ARM => Some(StateMachineEvent::Arm),
        msg_type::STATE_LOCK => Some(StateMachineEvent::Lock),
        msg_type::STATE_EMERGENCY => Some(StateMachineEvent::Emergency),
        msg_type::STATE_RESET => Some(StateMachineEvent::Reset),
        msg_type::STATE_POWER_ON => Some(StateMachineEvent::PowerOn),
        msg_type::STATE_POWER_OFF => Some(StateMachineEvent::PowerOff),
        _ => None,
    }
}

//==================================================================================RESERVED_ADDRESS
/// Logical addresses layered on top of a node's base address.
///
/// They do not replace the message-type byte; they name per-node endpoints
/// for tooling that addresses HATs by base address.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReservedAddress {
    StateQuery = 0xF0,
    StateResponse = 0xF1,
    StateTransition = 0xF2,
    EmergencyStop = 0xF3,
    AuthorityCheck = 0xF4,
    TimeoutConfig = 0xF5,
}

impl ReservedAddress {
    pub const ALL: [ReservedAddress; 6] = [
        ReservedAddress::StateQuery,
        ReservedAddress::StateResponse,
        ReservedAddress::StateTransition,
        ReservedAddress::EmergencyStop,
        ReservedAddress::AuthorityCheck,
        ReservedAddress::TimeoutConfig,
    ];

    /// Offset from the base address.
    #[inline]
    pub const fn offset(self) -> u16 {
        self as u16
    }

    /// Absolute address for a node with the given base.
    #[inline]
    pub const fn address(self, base_address: u16) -> u16 {
        base_address.wrapping_add(self.offset())
    }

    /// Reverse lookup of an absolute address.
    pub fn from_address(base_address: u16, address: u16) -> Option<Self> {
        let offset = address.wrapping_sub(base_address);
        Self::ALL.iter().copied().find(|r| r.offset() == offset)
    }
}
