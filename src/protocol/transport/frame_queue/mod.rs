//! Bounded receive queue decoupling the CAN receive interrupt from the
//! cooperative main loop.
//!
//! The interrupt context only ever calls [`FrameProducer::on_frame_received`]
//! (or [`FrameQueue::enqueue`]); the main loop drains the queue once per tick
//! with [`FrameQueue::dequeue_all`]. Both sides run inside a short critical
//! section over fixed-size storage, so no allocation happens on either path.
//!
//! Backpressure is bounded loss: when the queue is full the oldest frame is
//! discarded and a drop counter increments. The producer never blocks.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::Instant;
use heapless::Deque;

use crate::protocol::transport::{can_frame::CanFrame, can_id::CanId};

/// Outcome of a single enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Enqueued {
    /// Stored without loss.
    Stored,
    /// Stored after evicting the oldest pending frame.
    DisplacedOldest,
}

/// Counters maintained by the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct QueueStats {
    /// Frames accepted by `enqueue` since startup.
    pub received: u32,
    /// Frames lost to overflow.
    pub dropped: u32,
    /// Raw frames refused by the producer (payload longer than eight bytes).
    pub malformed: u32,
}

struct QueueState<const N: usize> {
    frames: Deque<CanFrame, N>,
    stats: QueueStats,
}

/// Fixed-capacity FIFO of received frames.
///
/// `FrameQueue::new` is `const`, so the queue can live in a `static` shared
/// between the receive interrupt and the main loop.
pub struct FrameQueue<const N: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<QueueState<N>>>,
}

impl<const N: usize> Default for FrameQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameQueue<N> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(QueueState {
                frames: Deque::new(),
                stats: QueueStats {
                    received: 0,
                    dropped: 0,
                    malformed: 0,
                },
            })),
        }
    }

    /// Maximum number of pending frames.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Append a frame, evicting the oldest one when full. Never blocks.
    pub fn enqueue(&self, frame: CanFrame) -> Enqueued {
        let outcome = self.inner.lock(|cell| {
            let mut state = cell.borrow_mut();
            state.stats.received = state.stats.received.wrapping_add(1);

            let mut outcome = Enqueued::Stored;
            if state.frames.is_full() && state.frames.pop_front().is_some() {
                state.stats.dropped = state.stats.dropped.wrapping_add(1);
                outcome = Enqueued::DisplacedOldest;
            }
            if state.frames.push_back(frame).is_err() {
                // Only reachable with a zero-capacity queue.
                state.stats.dropped = state.stats.dropped.wrapping_add(1);
                outcome = Enqueued::DisplacedOldest;
            }
            outcome
        });

        #[cfg(feature = "defmt")]
        {
            if outcome == Enqueued::DisplacedOldest {
                defmt::warn!("Frame queue full, oldest frame dropped");
            }
        }

        outcome
    }

    /// Take every pending frame, in arrival order.
    ///
    /// Must only be called from the main loop, never concurrently with itself.
    pub fn dequeue_all(&self) -> Drain<N> {
        let frames = self
            .inner
            .lock(|cell| core::mem::replace(&mut cell.borrow_mut().frames, Deque::new()));
        Drain { frames }
    }

    /// Number of pending frames.
    pub fn len(&self) -> usize {
        self.inner.lock(|cell| cell.borrow().frames.len())
    }

    /// Checks whether no frame is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the queue counters.
    pub fn stats(&self) -> QueueStats {
        self.inner.lock(|cell| cell.borrow().stats)
    }

    /// Frames lost to overflow since startup.
    pub fn dropped(&self) -> u32 {
        self.stats().dropped
    }

    /// Capability handed to the receive path.
    pub fn producer(&self) -> FrameProducer<'_, N> {
        FrameProducer { queue: self }
    }

    fn record_malformed(&self) {
        self.inner.lock(|cell| {
            let mut state = cell.borrow_mut();
            state.stats.malformed = state.stats.malformed.wrapping_add(1);
        });
    }
}

//==================================================================================PRODUCER
/// Receive-path handle: the only object the interrupt context touches.
#[derive(Clone, Copy)]
pub struct FrameProducer<'a, const N: usize> {
    queue: &'a FrameQueue<N>,
}

impl<'a, const N: usize> FrameProducer<'a, N> {
    /// Entry point for the transceiver interrupt.
    ///
    /// Never blocks and never fails: overflow evicts the oldest frame and an
    /// oversized payload is counted as malformed and discarded.
    pub fn on_frame_received(&self, raw_id: u32, payload: &[u8], received_at: Instant) {
        match CanFrame::new(CanId::from_raw(raw_id), payload, received_at) {
            Ok(frame) => {
                self.queue.enqueue(frame);
            }
            Err(_) => self.queue.record_malformed(),
        }
    }

    /// Forward an already-built frame.
    pub fn push(&self, frame: CanFrame) -> Enqueued {
        self.queue.enqueue(frame)
    }
}

//==================================================================================DRAIN
/// Frames taken by [`FrameQueue::dequeue_all`], yielded oldest first.
pub struct Drain<const N: usize> {
    frames: Deque<CanFrame, N>,
}

impl<const N: usize> Iterator for Drain<N> {
    type Item = CanFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.pop_front()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.frames.len();
        (len, Some(len))
    }
}

impl<const N: usize> ExactSizeIterator for Drain<N> {}
