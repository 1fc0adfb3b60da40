//! CAN controller as seen by [`NodeRunner`]: the receive side stands in for
//! the transceiver interrupt, the send side flushes the node's outbox.
//!
//! Only extended frames travel on the HAT bus; a driver may drop standard
//! frames before returning them from `recv`.
//!
//! [`NodeRunner`]: crate::protocol::node::runner::NodeRunner
use crate::protocol::transport::can_frame::CanFrame;
use futures_util::Future;

/// Asynchronous access to a CAN controller.
pub trait CanBus {
    type Error: core::fmt::Debug;

    /// Put one frame on the bus. A failure is counted by the runner and
    /// reported to the node's handlers; it is never retried here.
    fn send<'a>(
        &'a mut self,
        frame: &'a CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;

    /// Wait for the next received frame.
    ///
    /// Must be cancel-safe: the runner drops this future whenever a tick is
    /// due and calls `recv` again afterwards. An error stops the runner.
    fn recv<'a>(&'a mut self) -> impl Future<Output = Result<CanFrame, Self::Error>> + 'a;
}
