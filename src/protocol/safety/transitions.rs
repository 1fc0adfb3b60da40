//! Transition table: `(from, event, minimum authority) -> to`.
//!
//! `Emergency` is not listed: it is unconditional and handled before any
//! table lookup. The minimum authorities below are the platform defaults; a
//! deployment may raise them with [`TransitionTable::tighten`] but never lower
//! them.
use super::{Authority, OperatingState, StateMachineEvent};
use crate::error::ConfigError;

use Authority::{BaseStation, Operator, System};
use OperatingState::*;
use StateMachineEvent as Ev;

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransitionRule {
    pub from: OperatingState,
    pub event: StateMachineEvent,
    pub min_authority: Authority,
    pub to: OperatingState,
}

const fn rule(
    from: OperatingState,
    event: StateMachineEvent,
    min_authority: Authority,
    to: OperatingState,
) -> TransitionRule {
    TransitionRule {
        from,
        event,
        min_authority,
        to,
    }
}

/// Platform transition rows.
pub const TRANSITIONS: &[TransitionRule] = &[
    rule(PowerOff, Ev::PowerOn, System, Disarmed),
    rule(Disarmed, Ev::Lock, Operator, Locked),
    rule(Disarmed, Ev::PowerOff, BaseStation, PowerOff),
    rule(Locked, Ev::Unlock, Operator, Unlocked),
    rule(Locked, Ev::Disarm, Operator, Disarmed),
    rule(Locked, Ev::PowerOff, BaseStation, PowerOff),
    rule(Unlocked, Ev::Lock, Operator, Locked),
    rule(Unlocked, Ev::Arm, BaseStation, PowerArmed),
    rule(Unlocked, Ev::Disarm, Operator, Disarmed),
    rule(Unlocked, Ev::Timeout, System, Locked),
    rule(PowerArmed, Ev::Disarm, Operator, Disarmed),
    rule(PowerArmed, Ev::Lock, Operator, Locked),
    rule(PowerArmed, Ev::Timeout, System, Disarmed),
    rule(EmergencyStop, Ev::Reset, BaseStation, Disarmed),
];

/// Built-in minimum authority for an event.
pub const fn default_min_authority(event: StateMachineEvent) -> Authority {
    match event {
        Ev::PowerOn | Ev::Emergency | Ev::Timeout => System,
        Ev::PowerOff | Ev::Arm | Ev::Reset => BaseStation,
        Ev::Unlock | Ev::Disarm | Ev::Lock => Operator,
    }
}

//==================================================================================TABLE
/// Transition rows plus the per-event authority floor of this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionTable {
    floors: [Authority; StateMachineEvent::COUNT],
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionTable {
    /// Table with the platform defaults.
    pub const fn new() -> Self {
        let mut floors = [System; StateMachineEvent::COUNT];
        let mut i = 0;
        while i < StateMachineEvent::COUNT {
            floors[i] = default_min_authority(StateMachineEvent::ALL[i]);
            i += 1;
        }
        Self { floors }
    }

    /// Row for `(state, event)`, if any.
    pub fn lookup(&self, state: OperatingState, event: StateMachineEvent) -> Option<TransitionRule> {
        TRANSITIONS
            .iter()
            .find(|r| r.from == state && r.event == event)
            .copied()
    }

    /// True when some row leaves `state` on `event`.
    pub fn has_transition(&self, state: OperatingState, event: StateMachineEvent) -> bool {
        self.lookup(state, event).is_some()
    }

    /// Authority a caller needs for `rule` in this deployment.
    pub fn required_authority(&self, rule: &TransitionRule) -> Authority {
        rule.min_authority.max(self.floors[rule.event.index()])
    }

    /// Current floor for `event`.
    pub fn floor(&self, event: StateMachineEvent) -> Authority {
        self.floors[event.index()]
    }

    /// Raise the minimum authority of `event`.
    ///
    /// `Emergency` and `Timeout` are fixed; lowering any floor is refused.
    pub fn tighten(
        &mut self,
        event: StateMachineEvent,
        authority: Authority,
    ) -> Result<(), ConfigError> {
        if matches!(event, Ev::Emergency | Ev::Timeout) {
            return Err(ConfigError::FixedAuthority { event });
        }
        if authority < self.floors[event.index()] {
            return Err(ConfigError::LoosenedAuthority { event });
        }
        self.floors[event.index()] = authority;
        Ok(())
    }
}
