//! Outbound frames emitted by the node itself: state response, status
//! response, heartbeat, and emergency-stop broadcast.
//!
//! Payload layouts (byte 0 is always the emitting node id):
//!
//! ```text
//! state response  0x37  [node, state, ms & 0xFF]
//! status response 0x11  [node, 0x01, frames_seen & 0xFF, send_errors & 0xFF]
//! heartbeat       0x23  [node, 0x01, (ms >> 8) & 0xFF, ms & 0xFF]
//! emergency stop  0xF0  [node, 0xFF]
//! ```
use embassy_time::Instant;

use super::msg_type;
use crate::protocol::safety::OperatingState;
use crate::protocol::transport::{
    can_frame::CanFrame, can_id::CanId, priority, MAX_DATA_LENGTH,
};

/// Status byte meaning "alive and healthy".
pub const STATUS_OK: u8 = 0x01;
/// Code carried by the emergency-stop broadcast.
pub const EMERGENCY_CODE: u8 = 0xFF;

/// Builds broadcast frames on behalf of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseBuilder {
    node_id: u8,
    priority: u8,
}

impl ResponseBuilder {
    pub const fn new(node_id: u8, priority: u8) -> Self {
        Self { node_id, priority }
    }

    pub const fn node_id(&self) -> u8 {
        self.node_id
    }

    /// Current state report, sent after transitions and on state queries.
    pub fn state_response(&self, state: OperatingState, now: Instant) -> CanFrame {
        let ms = now.as_millis();
        self.frame(
            msg_type::STATE_RESPONSE,
            self.priority,
            &[self.node_id, state as u8, (ms & 0xFF) as u8],
            now,
        )
    }

    /// Answer to status, parameter, and diagnostic requests.
    pub fn status_response(&self, frames_seen: u32, send_errors: u32, now: Instant) -> CanFrame {
        self.frame(
            msg_type::STATUS_RESPONSE,
            self.priority,
            &[
                self.node_id,
                STATUS_OK,
                (frames_seen & 0xFF) as u8,
                (send_errors & 0xFF) as u8,
            ],
            now,
        )
    }

    /// Periodic liveness beacon.
    pub fn heartbeat(&self, now: Instant) -> CanFrame {
        let ms = now.as_millis();
        self.frame(
            msg_type::HEARTBEAT,
            self.priority,
            &[
                self.node_id,
                STATUS_OK,
                ((ms >> 8) & 0xFF) as u8,
                (ms & 0xFF) as u8,
            ],
            now,
        )
    }

    /// Broadcast once when the node enters `EmergencyStop`. Always sent at the
    /// highest arbitration priority.
    pub fn emergency_stop(&self, now: Instant) -> CanFrame {
        self.frame(
            msg_type::EMERGENCY_STOP,
            priority::EMERGENCY,
            &[self.node_id, EMERGENCY_CODE],
            now,
        )
    }

    fn frame(&self, message_type: u8, priority: u8, payload: &[u8], now: Instant) -> CanFrame {
        let mut data = [0u8; MAX_DATA_LENGTH];
        let len = payload.len().min(MAX_DATA_LENGTH);
        data[..len].copy_from_slice(&payload[..len]);
        CanFrame {
            id: CanId::builder(self.node_id, message_type)
                .with_priority(priority)
                .build(),
            data,
            len,
            received_at: now,
        }
    }
}
