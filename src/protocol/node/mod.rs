//! Cooperative main loop of a HAT node.
//!
//! [`HatNode`] owns everything the main loop mutates: configuration, state
//! machine, dispatcher counters, timeout monitor and heartbeat scheduler. The
//! receive interrupt only touches the [`FrameQueue`]; the main loop calls
//! [`HatNode::tick`] at a fixed period, which
//! 1. drains the queue and dispatches every frame in arrival order,
//! 2. polls the inactivity timeout,
//! 3. emits a heartbeat when one is due.
//!
//! Firmware without an async executor calls `tick` from its own loop; the
//! [`runner`] module drives it on top of the async [`CanBus`] and
//! [`HatTimer`] traits.
//!
//! [`CanBus`]: crate::protocol::transport::traits::can_bus::CanBus
//! [`HatTimer`]: crate::protocol::transport::traits::hat_timer::HatTimer
use embassy_time::Instant;

use crate::config::HatConfig;
use crate::error::TransitionError;
use crate::protocol::dispatch::{DispatchStats, Dispatcher, HatHandlers};
use crate::protocol::heartbeat::{HeartbeatScheduler, TimeoutMonitor};
use crate::protocol::safety::{NoHooks, StateChange, StateHooks, StateMachine};
use crate::protocol::transport::{frame_queue::FrameQueue, traits::frame_sink::FrameSink};

pub mod runner;

/// Summary of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    /// Frames drained from the queue and dispatched.
    pub frames: usize,
    /// Outcome of a timeout delivered this tick.
    pub timeout: Option<Result<StateChange, TransitionError>>,
    /// A heartbeat was handed to the sink.
    pub heartbeat_sent: bool,
}

/// Main-loop state of one HAT node.
pub struct HatNode<H: StateHooks = NoHooks> {
    config: HatConfig,
    state_machine: StateMachine<H>,
    dispatcher: Dispatcher,
    monitor: TimeoutMonitor,
    heartbeat: HeartbeatScheduler,
}

impl HatNode<NoHooks> {
    pub fn new(config: HatConfig, now: Instant) -> Self {
        Self::with_hooks(config, NoHooks, now)
    }
}

impl<H: StateHooks> HatNode<H> {
    /// Node booting in `Disarmed` with the given state hooks.
    pub fn with_hooks(config: HatConfig, hooks: H, now: Instant) -> Self {
        let state_machine = StateMachine::with_hooks(*config.table(), hooks, now);
        let monitor = TimeoutMonitor::new(*config.timeouts());
        let heartbeat = HeartbeatScheduler::new(config.heartbeat_interval());

        #[cfg(feature = "defmt")]
        defmt::info!("HAT node {=u8:#x} booted", config.node_id());

        Self {
            config,
            state_machine,
            dispatcher: Dispatcher::new(),
            monitor,
            heartbeat,
        }
    }

    pub fn config(&self) -> &HatConfig {
        &self.config
    }

    /// Read access for component and telemetry collaborators.
    pub fn state_machine(&self) -> &StateMachine<H> {
        &self.state_machine
    }

    /// Direct event injection for local sources (e.g. a hardware emergency input).
    pub fn state_machine_mut(&mut self) -> &mut StateMachine<H> {
        &mut self.state_machine
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Counts a frame the asynchronous bus failed to send.
    pub fn record_send_failure(&mut self) {
        self.dispatcher.record_send_failure();
    }

    /// Run one cooperative-loop iteration.
    pub fn tick<const N: usize, T, S>(
        &mut self,
        queue: &FrameQueue<N>,
        handlers: &mut T,
        sink: &mut S,
        now: Instant,
    ) -> TickReport
    where
        T: HatHandlers + ?Sized,
        S: FrameSink + ?Sized,
    {
        let mut report = TickReport::default();

        for frame in queue.dequeue_all() {
            self.dispatcher.dispatch(
                &self.config,
                &mut self.state_machine,
                &frame,
                handlers,
                sink,
                now,
            );
            report.frames += 1;
        }

        if let Some(outcome) = self.monitor.poll(&mut self.state_machine, now) {
            if let Ok(change) = &outcome {
                self.dispatcher
                    .report_change(&self.config, change, handlers, sink, now);
            }
            report.timeout = Some(outcome);
        }

        if self.heartbeat.due(now) {
            let frame = self.config.responder().heartbeat(now);
            report.heartbeat_sent = self.dispatcher.emit(&frame, handlers, sink);
        }

        report
    }
}
