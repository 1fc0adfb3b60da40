//! Asynchronous driver for [`HatNode`].
//!
//! The runner keeps one tick deadline, read through the [`HatClock`]. Until
//! the deadline it races the next frame from the [`CanBus`] against a
//! [`HatTimer`] delay ending at the deadline; once it is reached the node
//! ticks, whatever the bus is doing. Received frames only enter the
//! [`FrameQueue`] through its producer handle, exactly what a receive
//! interrupt would do, so sustained traffic can never hold back dispatch,
//! the timeout monitor or the heartbeat.
//!
//! Frames produced by a tick land in an [`Outbox`] and are flushed to the bus
//! right after it, emergency stops first. A failed send is counted and
//! reported to [`HatHandlers::on_send_failure`], never retried.
use core::fmt::Debug;

use embassy_time::{Duration, Instant};
use futures_util::{future::select, future::Either, pin_mut};

use super::{HatNode, TickReport};
use crate::error::RunnerError;
use crate::protocol::dispatch::HatHandlers;
use crate::protocol::safety::StateHooks;
use crate::protocol::transport::frame_queue::FrameQueue;
use crate::protocol::transport::traits::{
    can_bus::CanBus,
    frame_sink::Outbox,
    hat_clock::HatClock,
    hat_timer::HatTimer,
};

/// Default loop period (milliseconds).
pub const DEFAULT_TICK_MS: u32 = 10;

/// Result of one [`NodeRunner::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A frame was received and queued.
    Received,
    /// The timer woke before the deadline; nothing happened.
    Idle,
    /// The period elapsed and the node ticked.
    Ticked(TickReport),
}

/// Drives a [`HatNode`] from an async CAN bus and timer.
pub struct NodeRunner<'q, C, T, K, H, const N: usize, const OUT: usize>
where
    C: CanBus,
    C::Error: Debug,
    T: HatTimer,
    K: HatClock,
    H: StateHooks,
{
    bus: C,
    timer: T,
    clock: K,
    queue: &'q FrameQueue<N>,
    node: HatNode<H>,
    outbox: Outbox<OUT>,
    tick_ms: u32,
    /// Next tick deadline, set on the first step.
    next_tick: Option<Instant>,
}

impl<'q, C, T, K, H, const N: usize, const OUT: usize> NodeRunner<'q, C, T, K, H, N, OUT>
where
    C: CanBus,
    C::Error: Debug,
    T: HatTimer,
    K: HatClock,
    H: StateHooks,
{
    pub fn new(bus: C, timer: T, clock: K, queue: &'q FrameQueue<N>, node: HatNode<H>) -> Self {
        Self {
            bus,
            timer,
            clock,
            queue,
            node,
            outbox: Outbox::new(),
            tick_ms: DEFAULT_TICK_MS,
            next_tick: None,
        }
    }

    /// Override the loop period.
    pub fn with_tick_ms(mut self, tick_ms: u32) -> Self {
        self.tick_ms = tick_ms.max(1);
        self
    }

    pub fn node(&self) -> &HatNode<H> {
        &self.node
    }

    pub fn node_mut(&mut self) -> &mut HatNode<H> {
        &mut self.node
    }

    /// Give back the bus, timer, clock, and node.
    pub fn into_parts(self) -> (C, T, K, HatNode<H>) {
        (self.bus, self.timer, self.clock, self.node)
    }

    /// Run forever; only a bus receive error stops the loop.
    pub async fn drive<X>(&mut self, handlers: &mut X) -> Result<(), RunnerError<C::Error>>
    where
        X: HatHandlers + ?Sized,
    {
        loop {
            self.step(handlers).await?;
        }
    }

    /// Tick if the deadline has passed, otherwise wait for a frame or the deadline.
    pub async fn step<X>(&mut self, handlers: &mut X) -> Result<Step, RunnerError<C::Error>>
    where
        X: HatHandlers + ?Sized,
    {
        let period = Duration::from_millis(self.tick_ms as u64);
        let now = self.clock.now();
        let deadline = *self.next_tick.get_or_insert(now + period);

        if now >= deadline {
            // Skip missed periods instead of ticking in a burst.
            let next = deadline + period;
            self.next_tick = Some(if next > now { next } else { now + period });
            return Ok(Step::Ticked(self.tick(handlers).await));
        }

        let wait_ms = deadline
            .checked_duration_since(now)
            .map(|left| left.as_micros().div_ceil(1000))
            .unwrap_or(0)
            .min(u32::MAX as u64) as u32;

        let received = {
            let recv_future = self.bus.recv();
            let tick_future = self.timer.delay_ms(wait_ms);
            pin_mut!(recv_future);
            pin_mut!(tick_future);

            match select(recv_future, tick_future).await {
                Either::Left((result, pending_tick)) => {
                    drop(pending_tick);
                    Some(result)
                }
                Either::Right(((), pending_recv)) => {
                    drop(pending_recv);
                    None
                }
            }
        };

        match received {
            Some(Ok(frame)) => {
                self.queue.producer().on_frame_received(
                    frame.id.raw(),
                    frame.payload(),
                    self.clock.now(),
                );
                Ok(Step::Received)
            }
            Some(Err(err)) => Err(RunnerError::Receive(err)),
            // The deadline is checked again at the start of the next step.
            None => Ok(Step::Idle),
        }
    }

    /// Tick the node and flush its outbox to the bus.
    pub async fn tick<X>(&mut self, handlers: &mut X) -> TickReport
    where
        X: HatHandlers + ?Sized,
    {
        let now = self.clock.now();
        let report = self.node.tick(self.queue, handlers, &mut self.outbox, now);

        while let Some(frame) = self.outbox.pop() {
            if let Err(_err) = self.bus.send(&frame).await {
                #[cfg(feature = "defmt")]
                defmt::error!(
                    "CAN send failed for message type {=u8:#x}",
                    frame.id.message_type()
                );
                self.node.record_send_failure();
                handlers.on_send_failure(frame.id.message_type());
            }
        }

        report
    }
}
