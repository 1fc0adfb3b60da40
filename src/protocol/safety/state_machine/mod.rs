//! Authority-gated safety state machine of a HAT node.
//!
//! The machine is the sole owner and mutator of the node's operating state.
//! Every mutation happens synchronously inside [`StateMachine::process_event`]
//! (plus activity bookkeeping in [`StateMachine::record_activity`]), both
//! called only from the cooperative main loop.
//!
//! Decision order in `process_event`:
//! 1. `Emergency` always moves to `EmergencyStop` and latches the flag.
//! 2. In `EmergencyStop` only `Reset` with sufficient authority is accepted.
//! 3. Otherwise the `(state, event)` row must exist, the caller's authority
//!    must reach the row's minimum, and the hooks must not veto.
use embassy_time::{Duration, Instant};

use super::{
    hooks::{NoHooks, StateHooks},
    transitions::TransitionTable,
    Authority, OperatingState, StateMachineEvent,
};
use crate::error::TransitionError;
use crate::protocol::messages::{classify, msg_type, state_event_for, MessageCategory};

/// Accepted transition, returned by [`StateMachine::process_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateChange {
    pub from: OperatingState,
    pub to: OperatingState,
    pub event: StateMachineEvent,
}

impl StateChange {
    /// False for an emergency re-asserted while already stopped.
    pub fn entered_new_state(&self) -> bool {
        self.from != self.to
    }

    /// True when this change put the node into `EmergencyStop`.
    pub fn entered_emergency_stop(&self) -> bool {
        self.to == OperatingState::EmergencyStop && self.entered_new_state()
    }
}

/// Node operating state with its timestamps and transition policy.
pub struct StateMachine<H: StateHooks = NoHooks> {
    current: OperatingState,
    previous: OperatingState,
    state_entered_at: Instant,
    last_activity_at: Instant,
    emergency_flag: bool,
    /// Incremented on every state entry; lets the timeout monitor fire once per stay.
    epoch: u32,
    table: TransitionTable,
    hooks: H,
}

impl StateMachine<NoHooks> {
    /// Machine in `Disarmed`, with default policy and no hooks.
    pub fn new(now: Instant) -> Self {
        Self::with_hooks(TransitionTable::new(), NoHooks, now)
    }
}

impl<H: StateHooks> StateMachine<H> {
    /// Machine in `Disarmed` with a deployment table and node hooks.
    pub fn with_hooks(table: TransitionTable, hooks: H, now: Instant) -> Self {
        Self {
            current: OperatingState::Disarmed,
            previous: OperatingState::Disarmed,
            state_entered_at: now,
            last_activity_at: now,
            emergency_flag: false,
            epoch: 0,
            table,
            hooks,
        }
    }

    //==================================================================================ACCESSORS
    pub fn current_state(&self) -> OperatingState {
        self.current
    }

    pub fn current_state_name(&self) -> &'static str {
        self.current.name()
    }

    /// State left by the last accepted transition (diagnostics).
    pub fn previous_state(&self) -> OperatingState {
        self.previous
    }

    /// Time spent in the current state.
    pub fn state_uptime(&self, now: Instant) -> Duration {
        now.checked_duration_since(self.state_entered_at)
            .unwrap_or(Duration::from_ticks(0))
    }

    pub fn state_entered_at(&self) -> Instant {
        self.state_entered_at
    }

    pub fn last_activity_at(&self) -> Instant {
        self.last_activity_at
    }

    pub fn emergency_flag(&self) -> bool {
        self.emergency_flag
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    //==================================================================================ACTIVITY
    /// Note qualifying activity, postponing the state timeout.
    pub fn record_activity(&mut self, now: Instant) {
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }

    //==================================================================================EVENTS
    /// Dry run of [`process_event`](Self::process_event): target state, or the rejection.
    pub fn check_event(
        &self,
        event: StateMachineEvent,
        authority: Authority,
    ) -> Result<OperatingState, TransitionError> {
        if event == StateMachineEvent::Emergency {
            return Ok(OperatingState::EmergencyStop);
        }
        if self.current == OperatingState::EmergencyStop && event != StateMachineEvent::Reset {
            return Err(TransitionError::EmergencyLatched);
        }

        let rule = self
            .table
            .lookup(self.current, event)
            .ok_or(TransitionError::NoTransition {
                state: self.current,
                event,
            })?;

        let required = self.table.required_authority(&rule);
        if authority < required {
            return Err(TransitionError::InsufficientAuthority {
                required,
                provided: authority,
            });
        }

        if !self.hooks.validate_transition(self.current, rule.to) {
            return Err(TransitionError::Vetoed {
                from: self.current,
                to: rule.to,
            });
        }

        Ok(rule.to)
    }

    /// Validate and apply an event. Rejections leave the machine untouched.
    pub fn process_event(
        &mut self,
        event: StateMachineEvent,
        authority: Authority,
        now: Instant,
    ) -> Result<StateChange, TransitionError> {
        if event == StateMachineEvent::Emergency {
            return Ok(self.enter_emergency(now));
        }

        let target = match self.check_event(event, authority) {
            Ok(target) => target,
            Err(err) => {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "Event {} rejected in {}: {}",
                    event,
                    self.current,
                    err
                );
                return Err(err);
            }
        };

        let from = self.current;
        self.enter(target, now);
        if event == StateMachineEvent::Reset {
            self.emergency_flag = false;
        }

        Ok(StateChange {
            from,
            to: target,
            event,
        })
    }

    /// Emergency path: unconditional, never consults the table or the hooks' veto.
    fn enter_emergency(&mut self, now: Instant) -> StateChange {
        let from = self.current;
        self.emergency_flag = true;
        self.record_activity(now);

        if from != OperatingState::EmergencyStop {
            #[cfg(feature = "defmt")]
            defmt::error!("EMERGENCY: {} -> EMERGENCY_STOP", from.name());
            self.enter(OperatingState::EmergencyStop, now);
        }

        StateChange {
            from,
            to: OperatingState::EmergencyStop,
            event: StateMachineEvent::Emergency,
        }
    }

    fn enter(&mut self, target: OperatingState, now: Instant) {
        let from = self.current;
        self.previous = from;
        self.current = target;
        self.state_entered_at = now;
        self.last_activity_at = now;
        self.epoch = self.epoch.wrapping_add(1);

        #[cfg(feature = "defmt")]
        defmt::info!("State {} -> {}", from.name(), target.name());

        self.hooks.on_exit_state(from);
        self.hooks.on_enter_state(target);
    }

    //==================================================================================COMMAND_GATE
    /// Whether the current state permits acting on a message of `command_type`.
    ///
    /// Dry-run predicate for collaborators (component drivers, config handler)
    /// about to commit side effects. For state commands it only checks that the
    /// current state has a transition for the mapped event; authority is
    /// checked by `process_event`.
    pub fn is_command_allowed(&self, command_type: u8) -> bool {
        use OperatingState::*;

        match classify(command_type) {
            MessageCategory::Control => match command_type {
                msg_type::CONTROL_STOP | msg_type::CONTROL_DISABLE => true,
                _ => matches!(self.current, Unlocked | PowerArmed),
            },
            MessageCategory::StatusQuery
            | MessageCategory::Telemetry
            | MessageCategory::Emergency => true,
            MessageCategory::StateCommand => match state_event_for(command_type) {
                Some(StateMachineEvent::Emergency) => true,
                Some(event) => self.table.has_transition(self.current, event),
                None => matches!(
                    command_type,
                    msg_type::STATE_QUERY | msg_type::STATE_RESPONSE
                ),
            },
            MessageCategory::Config => match command_type {
                msg_type::CONFIG_GET => true,
                _ => matches!(self.current, PowerOff | Disarmed | Locked),
            },
            MessageCategory::Unknown => false,
        }
    }
}
