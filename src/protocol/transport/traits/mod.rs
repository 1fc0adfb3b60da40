//! Abstraction traits at the edges of the core: asynchronous CAN bus,
//! timer and clock for the runner, and the synchronous outbound frame sink.
pub mod can_bus;
pub mod frame_sink;
pub mod hat_clock;
pub mod hat_timer;
