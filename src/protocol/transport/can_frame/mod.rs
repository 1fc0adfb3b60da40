//! In-memory representation of a HAT CAN frame.
use crate::error::FrameError;
use crate::protocol::transport::can_id::CanId;
use crate::protocol::transport::MAX_DATA_LENGTH;
use embassy_time::Instant;
use embedded_can::{ExtendedId, Id};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Frame as read from (or written to) the CAN bus.
pub struct CanFrame {
    /// Full 29-bit CAN identifier stored inside a `u32`.
    pub id: CanId,
    /// Payload buffer. Classic CAN frames carry at most eight bytes.
    pub data: [u8; MAX_DATA_LENGTH],
    /// Number of valid payload bytes (Data Length Code, 0 to 8).
    pub len: usize,
    /// Monotonic reception time; for outbound frames, the build time.
    pub received_at: Instant,
}

impl CanFrame {
    /// Build a frame from a payload slice.
    pub fn new(id: CanId, payload: &[u8], received_at: Instant) -> Result<Self, FrameError> {
        if payload.len() > MAX_DATA_LENGTH {
            return Err(FrameError::PayloadTooLong { len: payload.len() });
        }
        let mut data = [0u8; MAX_DATA_LENGTH];
        data[..payload.len()].copy_from_slice(payload);
        Ok(Self {
            id,
            data,
            len: payload.len(),
            received_at,
        })
    }

    /// Valid payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len.min(MAX_DATA_LENGTH)]
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        match id.into() {
            Id::Extended(ext) => {
                CanFrame::new(CanId::from(ext), data, Instant::from_ticks(0)).ok()
            }
            // The HAT protocol only uses extended identifiers.
            Id::Standard(_) => None,
        }
    }

    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        true
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        Id::Extended(ExtendedId::from(self.id))
    }

    fn dlc(&self) -> usize {
        self.len
    }

    fn data(&self) -> &[u8] {
        self.payload()
    }
}
