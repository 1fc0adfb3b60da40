//! `hat-can-core` library: the control-plane core of one HAT node on a
//! multi-node CAN bus. It exposes the 29-bit identifier codec, the receive
//! queue and dispatcher, and the authority-gated safety state machine that
//! decides which commands the node honors.
#![no_std]
//==================================================================================
/// Node configuration: identity, outbound priority, timing, and authority policy.
pub mod config;
/// Domain errors (state transitions, frames, configuration, telemetry, runner).
pub mod error;
/// HAT protocol implementation: transport, message catalogue, safety state
/// machine, heartbeat/timeout monitoring, dispatch, and the node loop.
pub mod protocol;
//==================================================================================
