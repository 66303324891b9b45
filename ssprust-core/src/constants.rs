//! Protocol constants

use std::time::Duration;

/// Frame start byte; doubled when it appears inside a frame
pub const STX: u8 = 0x7F;

/// Marker byte in front of an encrypted payload
pub const STEX: u8 = 0x7E;

/// Sequence flag values, alternated on every frame
pub const SEQUENCE_SET: u8 = 0x80;
pub const SEQUENCE_CLEAR: u8 = 0x00;

/// Mask for the device address carried in the sequence byte
pub const ADDRESS_MASK: u8 = 0x7F;

/// Bytes around the payload: STX, SEQ, LEN, CRC_LO, CRC_HI
pub const FRAME_OVERHEAD: usize = 5;

/// Time allowed to assemble one reply frame
pub const FRAME_TIMEOUT: Duration = Duration::from_millis(1500);

/// Attempts per command on transport failure
pub const MAX_RETRIES: usize = 3;

/// Interval between poll commands while listening
pub const POLL_INTERVAL: Duration = Duration::from_millis(400);

/// Host protocol version announced after sync
pub const HOST_PROTOCOL_VERSION: u8 = 0x06;

/// Serial line settings
pub mod serial {
    use std::time::Duration;

    pub const BAUD_RATE: u32 = 9600;

    /// Per-operation I/O timeout at the transport level
    pub const IO_TIMEOUT: Duration = Duration::from_millis(500);
}

/// Option byte closing a payout request
pub mod payout_option {
    /// Check the payout can be made without moving any notes
    pub const TEST: u8 = 0x19;

    /// Perform the payout
    pub const PAYOUT: u8 = 0x58;
}

/// Route byte for the set-denomination-route command
pub mod route {
    pub const PAYOUT_STORE: u8 = 0x00;
    pub const CASHBOX: u8 = 0x01;
}
