//! Telemetry samples as a tagged variant.
//!
//! A sample travels in one eight-byte frame:
//!
//! ```text
//! [0..2] sensor id (little endian)
//! [2]    value kind (0 = int, 1 = float, 2 = bool, 3 = text)
//! [3..7] value slot
//! [7]    timestamp, low byte of the millisecond counter
//! ```
//!
//! The value slot is decoded only after matching on the kind byte; bytes are
//! never reinterpreted across kinds.
use embassy_time::Instant;
use heapless::String;

use super::msg_type;
use crate::error::TelemetryError;
use crate::protocol::transport::{can_frame::CanFrame, can_id::CanId, MAX_DATA_LENGTH};

/// Capacity of a text value.
pub const TEXT_CAPACITY: usize = 4;

/// Short text fitting the value slot.
pub type TelemetryText = String<TEXT_CAPACITY>;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Discriminant stored in byte 2.
pub enum TelemetryKind {
    Int = 0,
    Float = 1,
    Bool = 2,
    Text = 3,
}

impl TryFrom<u8> for TelemetryKind {
    type Error = TelemetryError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(TelemetryKind::Int),
            1 => Ok(TelemetryKind::Float),
            2 => Ok(TelemetryKind::Bool),
            3 => Ok(TelemetryKind::Text),
            _ => Err(TelemetryError::UnknownKind { tag }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Value carried by a telemetry sample.
pub enum TelemetryValue {
    Int(i32),
    Float(f32),
    Bool(bool),
    Text(TelemetryText),
}

impl TelemetryValue {
    /// Build a text value, refusing strings longer than the slot.
    pub fn text(value: &str) -> Result<Self, TelemetryError> {
        TelemetryText::try_from(value)
            .map(TelemetryValue::Text)
            .map_err(|_| TelemetryError::TextTooLong)
    }

    pub fn kind(&self) -> TelemetryKind {
        match self {
            TelemetryValue::Int(_) => TelemetryKind::Int,
            TelemetryValue::Float(_) => TelemetryKind::Float,
            TelemetryValue::Bool(_) => TelemetryKind::Bool,
            TelemetryValue::Text(_) => TelemetryKind::Text,
        }
    }

    fn to_slot(&self) -> [u8; 4] {
        match self {
            TelemetryValue::Int(v) => v.to_le_bytes(),
            TelemetryValue::Float(v) => v.to_le_bytes(),
            TelemetryValue::Bool(v) => [*v as u8, 0, 0, 0],
            TelemetryValue::Text(s) => {
                let mut slot = [0u8; 4];
                slot[..s.len()].copy_from_slice(s.as_bytes());
                slot
            }
        }
    }

    fn from_slot(kind: TelemetryKind, slot: [u8; 4]) -> Result<Self, TelemetryError> {
        Ok(match kind {
            TelemetryKind::Int => TelemetryValue::Int(i32::from_le_bytes(slot)),
            TelemetryKind::Float => TelemetryValue::Float(f32::from_le_bytes(slot)),
            TelemetryKind::Bool => TelemetryValue::Bool(slot[0] != 0),
            TelemetryKind::Text => {
                let len = slot.iter().position(|b| *b == 0).unwrap_or(slot.len());
                let text =
                    core::str::from_utf8(&slot[..len]).map_err(|_| TelemetryError::InvalidText)?;
                TelemetryValue::text(text)?
            }
        })
    }
}

//==================================================================================SAMPLE
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// One sensor reading.
pub struct TelemetrySample {
    pub sensor_id: u16,
    pub value: TelemetryValue,
    /// Millisecond counter; only the low byte travels on the wire.
    pub timestamp: u32,
}

impl TelemetrySample {
    /// Serialize into the eight-byte frame layout.
    pub fn to_payload(&self) -> [u8; MAX_DATA_LENGTH] {
        let mut payload = [0u8; MAX_DATA_LENGTH];
        payload[0..2].copy_from_slice(&self.sensor_id.to_le_bytes());
        payload[2] = self.value.kind() as u8;
        payload[3..7].copy_from_slice(&self.value.to_slot());
        payload[7] = (self.timestamp & 0xFF) as u8;
        payload
    }

    /// Decode a telemetry payload. The timestamp comes back truncated to its low byte.
    pub fn from_payload(payload: &[u8]) -> Result<Self, TelemetryError> {
        if payload.len() != MAX_DATA_LENGTH {
            return Err(TelemetryError::InvalidLength { len: payload.len() });
        }
        let kind = TelemetryKind::try_from(payload[2])?;
        let slot = [payload[3], payload[4], payload[5], payload[6]];
        Ok(Self {
            sensor_id: u16::from_le_bytes([payload[0], payload[1]]),
            value: TelemetryValue::from_slot(kind, slot)?,
            timestamp: payload[7] as u32,
        })
    }

    /// Broadcast frame carrying this sample.
    pub fn to_frame(&self, node_id: u8, priority: u8, now: Instant) -> CanFrame {
        CanFrame {
            id: CanId::builder(node_id, msg_type::TELEMETRY_SENSOR)
                .with_priority(priority)
                .build(),
            data: self.to_payload(),
            len: MAX_DATA_LENGTH,
            received_at: now,
        }
    }
}
