//! Sleep primitive used by [`NodeRunner`] to wait for the next tick deadline.
//!
//! [`NodeRunner`]: crate::protocol::node::runner::NodeRunner

/// Asynchronous delay.
pub trait HatTimer {
    /// Resolve after roughly `millis` milliseconds. The runner races this
    /// against `CanBus::recv` and drops it when a frame wins, so it must be
    /// cancel-safe. Waking early is harmless: the deadline is re-checked
    /// against the clock.
    fn delay_ms<'a>(&'a mut self, millis: u32) -> impl core::future::Future<Output = ()> + 'a;
}
