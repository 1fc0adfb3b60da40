//! Node-specific extension points of the state machine.
//!
//! A concrete HAT supplies a value implementing the hooks it cares about
//! (for example re-homing actuators when leaving `Locked`); every method
//! defaults to a no-op. Hooks are injected at construction.
use super::OperatingState;

/// Callbacks invoked around accepted transitions.
pub trait StateHooks {
    /// Called with the state being left, before `on_enter_state`.
    fn on_exit_state(&mut self, _state: OperatingState) {}

    /// Called with the state just entered.
    fn on_enter_state(&mut self, _state: OperatingState) {}

    /// Last word on a table transition that passed the authority check.
    /// Never consulted for `Emergency`.
    fn validate_transition(&self, _from: OperatingState, _to: OperatingState) -> bool {
        true
    }
}

/// Hooks that do nothing and allow every transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl StateHooks for NoHooks {}

impl<H: StateHooks + ?Sized> StateHooks for &mut H {
    fn on_exit_state(&mut self, state: OperatingState) {
        (**self).on_exit_state(state)
    }

    fn on_enter_state(&mut self, state: OperatingState) {
        (**self).on_enter_state(state)
    }

    fn validate_transition(&self, from: OperatingState, to: OperatingState) -> bool {
        (**self).validate_transition(from, to)
    }
}
