//! Creation and extraction of the 29-bit extended CAN identifiers used on the
//! HAT bus.
//!
//! Bit layout, most- to least-significant:
//!
//! ```text
//! [28:24] priority      (5 bits, lower value wins arbitration)
//! [23:16] source node   (8 bits)
//! [15:8]  target node   (8 bits, 0xFF = broadcast)
//! [7:0]   message type  (8 bits)
//! ```
//!
//! Encoding is total: out-of-range inputs are masked to their field width,
//! never rejected. Bits 31..29 of the raw `u32` are ignored on decode.
use crate::protocol::transport::{BROADCAST_ADDR, EXTENDED_ID_MASK};
use embedded_can::ExtendedId;

const PRIORITY_SHIFT: u32 = 24;
const SOURCE_SHIFT: u32 = 16;
const TARGET_SHIFT: u32 = 8;
const PRIORITY_MASK: u32 = 0x1F;
const BYTE_MASK: u32 = 0xFF;

/// Pack the four logical fields into a raw 29-bit identifier.
#[inline]
pub const fn encode(priority: u8, source_node: u8, target_node: u8, message_type: u8) -> u32 {
    ((priority as u32 & PRIORITY_MASK) << PRIORITY_SHIFT)
        | ((source_node as u32 & BYTE_MASK) << SOURCE_SHIFT)
        | ((target_node as u32 & BYTE_MASK) << TARGET_SHIFT)
        | (message_type as u32 & BYTE_MASK)
}

/// Unpack a raw identifier into its logical fields.
#[inline]
pub const fn decode(raw: u32) -> CanIdentifier {
    CanIdentifier {
        priority: ((raw >> PRIORITY_SHIFT) & PRIORITY_MASK) as u8,
        source_node: ((raw >> SOURCE_SHIFT) & BYTE_MASK) as u8,
        target_node: ((raw >> TARGET_SHIFT) & BYTE_MASK) as u8,
        message_type: (raw & BYTE_MASK) as u8,
    }
}

//==================================================================================CAN_IDENTIFIER
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Logical view of an extended identifier.
pub struct CanIdentifier {
    /// Arbitration priority (0-31).
    pub priority: u8,
    /// Sender node id.
    pub source_node: u8,
    /// Addressed node id, or [`BROADCAST_ADDR`].
    pub target_node: u8,
    /// Message semantics selector.
    pub message_type: u8,
}

impl CanIdentifier {
    /// Raw 29-bit value for these fields (priority masked to five bits).
    #[inline]
    pub const fn encode(&self) -> u32 {
        encode(
            self.priority,
            self.source_node,
            self.target_node,
            self.message_type,
        )
    }

    /// True when the frame targets every node.
    #[inline]
    pub const fn is_broadcast(&self) -> bool {
        self.target_node == BROADCAST_ADDR
    }

    /// True when a node with id `node_id` must accept the frame.
    #[inline]
    pub const fn is_for(&self, node_id: u8) -> bool {
        self.is_broadcast() || self.target_node == node_id
    }
}

impl From<CanIdentifier> for CanId {
    fn from(fields: CanIdentifier) -> Self {
        CanId(fields.encode())
    }
}

//==================================================================================CAN_ID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Encapsulates an extended CAN identifier (29 bits) and exposes accessors
/// for priority, source, target, and message type.
pub struct CanId(pub u32);

impl CanId {
    /// Creates a `CanIdBuilder` for a message emitted by `source_node`.
    pub fn builder(source_node: u8, message_type: u8) -> CanIdBuilder {
        CanIdBuilder::new(source_node, message_type)
    }

    /// Wrap a raw value received from the controller, clearing the reserved bits.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & EXTENDED_ID_MASK)
    }

    /// Raw 29-bit value.
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0 & EXTENDED_ID_MASK
    }

    /// Decoded logical fields.
    #[inline]
    pub const fn fields(&self) -> CanIdentifier {
        decode(self.0)
    }

    /// Priority (5 bits, value 0-31).
    pub const fn priority(&self) -> u8 {
        ((self.0 >> PRIORITY_SHIFT) & PRIORITY_MASK) as u8
    }

    /// Sender node id.
    pub const fn source_node(&self) -> u8 {
        ((self.0 >> SOURCE_SHIFT) & BYTE_MASK) as u8
    }

    /// Addressed node id (0xFF for broadcast).
    pub const fn target_node(&self) -> u8 {
        ((self.0 >> TARGET_SHIFT) & BYTE_MASK) as u8
    }

    /// Message type byte.
    pub const fn message_type(&self) -> u8 {
        (self.0 & BYTE_MASK) as u8
    }
}

impl From<CanId> for ExtendedId {
    fn from(id: CanId) -> Self {
        // `raw()` is already limited to 29 bits.
        ExtendedId::new(id.raw()).unwrap_or(ExtendedId::ZERO)
    }
}

impl From<ExtendedId> for CanId {
    fn from(id: ExtendedId) -> Self {
        CanId::from_raw(id.as_raw())
    }
}

//==================================================================================CAN_ID_BUILDER
#[derive(Debug)]
/// Fluent builder for outbound identifiers. Defaults to broadcast at the
/// lowest template priority.
pub struct CanIdBuilder {
    priority: u8,
    source_node: u8,
    target_node: u8,
    message_type: u8,
}

impl CanIdBuilder {
    /// Initializes the builder for a sender and message type.
    pub fn new(source_node: u8, message_type: u8) -> Self {
        Self {
            priority: crate::protocol::transport::priority::TEMPLATE_HAT,
            source_node,
            target_node: BROADCAST_ADDR,
            message_type,
        }
    }

    /// Sets the priority (5 bits) to use during construction.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority & PRIORITY_MASK as u8;
        self
    }

    /// Addresses a single node instead of broadcasting.
    pub fn to_target(mut self, target_node: u8) -> Self {
        self.target_node = target_node;
        self
    }

    /// Builds the identifier. Never fails: every field is masked to its width.
    pub fn build(self) -> CanId {
        CanId(encode(
            self.priority,
            self.source_node,
            self.target_node,
            self.message_type,
        ))
    }
}
