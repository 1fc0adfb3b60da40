//! HAT transport layer: CAN frame representation, 29-bit identifier
//! management, the interrupt-safe receive queue, and bus abstraction traits.
//!
//! ## Addressing constants
//!
//! These constants are part of the wire contract shared by every node on the
//! bus and must not change between independently built firmwares.

pub mod can_frame;
pub mod can_id;
pub mod frame_queue;
pub mod traits;

/// Target address meaning "every node on the bus".
pub const BROADCAST_ADDR: u8 = 0xFF;

/// Maximum payload carried by a classic CAN frame (bytes).
pub const MAX_DATA_LENGTH: usize = 8;

/// Mask of the 29 bits used by an extended CAN identifier.
///
/// Bits 31..29 of the `u32` holding the identifier are reserved: ignored on
/// decode and cleared on encode.
pub const EXTENDED_ID_MASK: u32 = 0x1FFF_FFFF;

/// Arbitration priorities assigned to the platform's nodes.
///
/// Lower numeric values win arbitration. The emergency priority is used for
/// the emergency-stop broadcast regardless of the node's own priority.
pub mod priority {
    pub const EMERGENCY: u8 = 0;
    pub const JETSON: u8 = 1;
    pub const DRIVE_HAT: u8 = 2;
    pub const BPS: u8 = 3;
    pub const ARM_HAT: u8 = 4;
    pub const SCIENCE_HAT: u8 = 5;
    pub const SENSE_HAT: u8 = 6;
    pub const TEMPLATE_HAT: u8 = 7;
}
