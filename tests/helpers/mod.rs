/// Test doubles to simulate the CAN bus, timer and clock during integration tests.
use hat_can_core::protocol::transport::{
    can_frame::CanFrame,
    traits::{can_bus::CanBus, hat_clock::HatClock, hat_timer::HatTimer},
};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};

#[derive(Clone)]
#[allow(dead_code)]
/// In-memory CAN bus reproducing the `CanBus` trait behavior.
pub struct MockCanBus {
    tx: mpsc::UnboundedSender<CanFrame>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<CanFrame>>>,
}

#[allow(dead_code)]
impl MockCanBus {
    /// Construct a pair of interconnected buses (DUT ↔ host).
    pub fn create_pair() -> (Self, Self) {
        let (dut_tx, host_rx) = mpsc::unbounded_channel();
        let (host_tx, dut_rx) = mpsc::unbounded_channel();

        let dut_bus = Self {
            tx: dut_tx,
            rx: Arc::new(Mutex::new(dut_rx)),
        };

        let host_bus = Self {
            tx: host_tx,
            rx: Arc::new(Mutex::new(host_rx)),
        };

        (dut_bus, host_bus)
    }

    /// Frame already waiting on this endpoint, if any.
    pub async fn try_recv(&self) -> Option<CanFrame> {
        self.rx.lock().await.try_recv().ok()
    }
}

impl CanBus for MockCanBus {
    type Error = ();

    async fn send<'a>(&'a mut self, frame: &'a CanFrame) -> Result<(), Self::Error> {
        self.tx.send(frame.clone()).map_err(|_| ())?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<CanFrame, Self::Error> {
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(())
    }
}

#[allow(dead_code)]
/// Timer based on `tokio::time::sleep` to drive the loop period in tests.
pub struct MockTimer;

impl HatTimer for MockTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis(millis as u64)).await;
    }
}

#[allow(dead_code)]
/// Clock counting from its creation, backed by `tokio::time::Instant`.
pub struct TokioClock {
    start: tokio::time::Instant,
}

#[allow(dead_code)]
impl TokioClock {
    pub fn new() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl HatClock for TokioClock {
    fn now(&self) -> embassy_time::Instant {
        embassy_time::Instant::from_micros(self.start.elapsed().as_micros() as u64)
    }
}

#[derive(Clone, Default)]
#[allow(dead_code)]
/// Hand-driven clock; clones share the same time.
pub struct ManualClock {
    ms: Rc<Cell<u64>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ms(&self, ms: u64) {
        self.ms.set(ms);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.ms.set(self.ms.get() + ms);
    }
}

impl HatClock for ManualClock {
    fn now(&self) -> embassy_time::Instant {
        embassy_time::Instant::from_millis(self.ms.get())
    }
}

#[allow(dead_code)]
/// Collect every frame currently waiting on `bus`.
pub async fn drain_bus(bus: &MockCanBus) -> Vec<CanFrame> {
    let mut frames = Vec::new();
    while let Some(frame) = bus.try_recv().await {
        frames.push(frame);
    }
    frames
}
