//! Synchronous send path used by the dispatcher and the node loop.
//!
//! Sending never blocks the tick: a sink either accepts the frame (driver
//! mailbox, outbox buffer) or reports a failure. The core counts failures and
//! raises the error indication, but never retries; retry policy belongs to the
//! transport behind the sink.
use crate::protocol::transport::{can_frame::CanFrame, priority};
use heapless::Deque;

/// Outbound frame path.
pub trait FrameSink {
    type Error: core::fmt::Debug;
    /// Hand one frame to the transport.
    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), Self::Error>;
}

/// The outbox is full; the frame was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutboxFull;

/// Fixed-capacity buffer of outbound frames, flushed by the async runner.
///
/// Frames at [`priority::EMERGENCY`] are flushed before everything else. When
/// the buffer is full, an emergency frame displaces the newest ordinary frame;
/// it is refused only when every slot already holds an emergency frame.
pub struct Outbox<const N: usize> {
    urgent: Deque<CanFrame, N>,
    frames: Deque<CanFrame, N>,
    displaced: u32,
}

impl<const N: usize> Default for Outbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Outbox<N> {
    pub const fn new() -> Self {
        Self {
            urgent: Deque::new(),
            frames: Deque::new(),
            displaced: 0,
        }
    }

    /// Next frame to put on the bus.
    pub fn pop(&mut self) -> Option<CanFrame> {
        self.urgent.pop_front().or_else(|| self.frames.pop_front())
    }

    pub fn len(&self) -> usize {
        self.urgent.len() + self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urgent.is_empty() && self.frames.is_empty()
    }

    /// Ordinary frames dropped to make room for emergency frames.
    pub fn displaced(&self) -> u32 {
        self.displaced
    }
}

impl<const N: usize> FrameSink for Outbox<N> {
    type Error = OutboxFull;

    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), Self::Error> {
        let full = self.len() >= N;

        if frame.id.priority() != priority::EMERGENCY {
            if full {
                return Err(OutboxFull);
            }
            return self.frames.push_back(frame.clone()).map_err(|_| OutboxFull);
        }

        if full {
            if self.frames.pop_back().is_none() {
                return Err(OutboxFull);
            }
            self.displaced = self.displaced.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!("Outbox full, ordinary frame displaced by emergency frame");
        }
        self.urgent.push_back(frame.clone()).map_err(|_| OutboxFull)
    }
}
