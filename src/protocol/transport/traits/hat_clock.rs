//! Monotonic time source read by the runner at each tick and on reception.
use embassy_time::Instant;

/// Monotonic clock. Never goes backwards.
pub trait HatClock {
    fn now(&self) -> Instant;
}
