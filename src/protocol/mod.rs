//! High-level components of the HAT protocol: CAN transport, message
//! catalogue, safety state machine, heartbeat/timeout monitoring, dispatch,
//! and the cooperative node loop.
pub mod dispatch;
pub mod heartbeat;
pub mod messages;
pub mod node;
pub mod safety;
pub mod transport;
