//! Liveness side of the main loop: the inactivity timeout monitor and the
//! periodic heartbeat scheduler. Both are polled once per tick with the
//! current time; neither is interrupt-driven.
use embassy_time::{Duration, Instant};

use crate::config::TimeoutPolicy;
use crate::error::TransitionError;
use crate::protocol::safety::{
    Authority, StateChange, StateHooks, StateMachine, StateMachineEvent,
};

//==================================================================================TIMEOUT_MONITOR
/// Injects `Timeout` into the state machine after a stay without qualifying activity.
///
/// The monitor remembers the state epoch it last fired for, so a given stay
/// produces at most one `Timeout`, and the state reached by it only times out
/// on its own policy.
#[derive(Debug, Clone)]
pub struct TimeoutMonitor {
    policy: TimeoutPolicy,
    delivered_epoch: Option<u32>,
}

impl TimeoutMonitor {
    pub fn new(policy: TimeoutPolicy) -> Self {
        Self {
            policy,
            delivered_epoch: None,
        }
    }

    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    /// Time left before the current state expires, `None` when exempt or already delivered.
    pub fn remaining<H: StateHooks>(&self, sm: &StateMachine<H>, now: Instant) -> Option<Duration> {
        let timeout = self.armed_timeout(sm)?;
        let idle = idle_time(sm, now);
        Some(
            timeout
                .checked_sub(idle)
                .unwrap_or(Duration::from_ticks(0)),
        )
    }

    /// Check for expiry and deliver `Timeout` with `System` authority.
    ///
    /// Returns `None` when nothing fired this tick, otherwise the outcome of
    /// the injected event.
    pub fn poll<H: StateHooks>(
        &mut self,
        sm: &mut StateMachine<H>,
        now: Instant,
    ) -> Option<Result<StateChange, TransitionError>> {
        let timeout = self.armed_timeout(sm)?;
        if idle_time(sm, now) <= timeout {
            return None;
        }

        self.delivered_epoch = Some(sm.epoch());
        #[cfg(feature = "defmt")]
        defmt::warn!(
            "State {} timed out after {} ms",
            sm.current_state_name(),
            timeout.as_millis()
        );
        Some(sm.process_event(StateMachineEvent::Timeout, Authority::System, now))
    }

    fn armed_timeout<H: StateHooks>(&self, sm: &StateMachine<H>) -> Option<Duration> {
        if self.delivered_epoch == Some(sm.epoch()) {
            return None;
        }
        self.policy.timeout_for(sm.current_state())
    }
}

/// Time since the later of state entry and last qualifying activity.
fn idle_time<H: StateHooks>(sm: &StateMachine<H>, now: Instant) -> Duration {
    let since = sm.last_activity_at().max(sm.state_entered_at());
    now.checked_duration_since(since)
        .unwrap_or(Duration::from_ticks(0))
}

//==================================================================================HEARTBEAT
/// Paces the periodic heartbeat frame.
#[derive(Debug, Clone, Copy)]
pub struct HeartbeatScheduler {
    interval: Duration,
    last: Option<Instant>,
}

impl HeartbeatScheduler {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True when a heartbeat should go out now; the first call always fires.
    /// Marks the heartbeat as sent.
    pub fn due(&mut self, now: Instant) -> bool {
        let fire = match self.last {
            None => true,
            Some(last) => now
                .checked_duration_since(last)
                .is_some_and(|elapsed| elapsed >= self.interval),
        };
        if fire {
            self.last = Some(now);
        }
        fire
    }
}
