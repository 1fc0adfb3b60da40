//! Safety layer: operating states, authority levels, state-machine events,
//! the authority-gated transition table, and the state machine itself.
pub mod hooks;
pub mod state_machine;
pub mod transitions;

pub use hooks::{NoHooks, StateHooks};
pub use state_machine::{StateChange, StateMachine};
pub use transitions::{TransitionRule, TransitionTable};

//==================================================================================OPERATING_STATE
/// Operational state of a HAT node.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingState {
    PowerOff = 0,
    /// Entered immediately after boot.
    Disarmed = 1,
    /// Default operational state.
    Locked = 2,
    Unlocked = 3,
    PowerArmed = 4,
    /// Latched safe state; only an authorized `Reset` leaves it.
    EmergencyStop = 5,
}

impl OperatingState {
    /// Number of states.
    pub const COUNT: usize = 6;

    /// Every state, in wire order.
    pub const ALL: [OperatingState; Self::COUNT] = [
        OperatingState::PowerOff,
        OperatingState::Disarmed,
        OperatingState::Locked,
        OperatingState::Unlocked,
        OperatingState::PowerArmed,
        OperatingState::EmergencyStop,
    ];

    /// Position in [`OperatingState::ALL`], also the wire value.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Diagnostic name.
    pub const fn name(self) -> &'static str {
        match self {
            OperatingState::PowerOff => "POWER_OFF",
            OperatingState::Disarmed => "DISARMED",
            OperatingState::Locked => "LOCKED",
            OperatingState::Unlocked => "UNLOCKED",
            OperatingState::PowerArmed => "POWER_ARMED",
            OperatingState::EmergencyStop => "EMERGENCY_STOP",
        }
    }
}

impl TryFrom<u8> for OperatingState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        OperatingState::ALL
            .get(value as usize)
            .copied()
            .ok_or(value)
    }
}

//==================================================================================AUTHORITY
/// Privilege level attached to an event. Ordered from least to most privileged.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Authority {
    System = 0,
    BaseStation = 1,
    Operator = 2,
    BatteryProtectionSystem = 3,
    /// Can force `EmergencyStop` from anywhere.
    Emergency = 4,
}

impl TryFrom<u8> for Authority {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Authority::System),
            1 => Ok(Authority::BaseStation),
            2 => Ok(Authority::Operator),
            3 => Ok(Authority::BatteryProtectionSystem),
            4 => Ok(Authority::Emergency),
            other => Err(other),
        }
    }
}

//==================================================================================EVENT
/// Events accepted by [`StateMachine::process_event`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateMachineEvent {
    PowerOn = 0,
    PowerOff = 1,
    Unlock = 2,
    Disarm = 3,
    Arm = 4,
    Lock = 5,
    Emergency = 6,
    Reset = 7,
    /// Injected by the timeout monitor only, never by a bus frame.
    Timeout = 8,
}

impl StateMachineEvent {
    /// Number of events.
    pub const COUNT: usize = 9;

    /// Every event, in wire order.
    pub const ALL: [StateMachineEvent; Self::COUNT] = [
        StateMachineEvent::PowerOn,
        StateMachineEvent::PowerOff,
        StateMachineEvent::Unlock,
        StateMachineEvent::Disarm,
        StateMachineEvent::Arm,
        StateMachineEvent::Lock,
        StateMachineEvent::Emergency,
        StateMachineEvent::Reset,
        StateMachineEvent::Timeout,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}
