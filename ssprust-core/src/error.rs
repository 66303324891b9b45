//! Error types for ssprust-core

use crate::command::Command;

/// Result type alias for ssprust-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame is too short to be valid
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },

    /// First byte of a frame is not STX
    #[error("Frame does not start with STX (got 0x{0:02X})")]
    MissingStx(u8),

    /// Declared length does not match the bytes received
    #[error("Frame length mismatch: header declares {declared} bytes, frame carries {actual}")]
    LengthMismatch {
        declared: usize,
        actual: usize,
    },

    /// Payload does not fit in the single-byte length field
    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge {
        size: usize,
        max: usize,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Unknown command code
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Unknown reply status byte
    #[error("Unknown response code: 0x{0:02X}")]
    UnknownResponseCode(u8),

    /// Encryption requested before key negotiation completed
    #[error("Encryption key not negotiated")]
    KeyNotNegotiated,

    /// Encrypted payload could not be decoded
    #[error("Decryption failed: {0}")]
    Decrypt(String),

    /// Encrypted reply carried an unexpected counter
    #[error("Encryption counter mismatch: expected {expected}, received {received}")]
    CounterMismatch {
        expected: u32,
        received: u32,
    },

    /// Reply body does not have the layout the command defines
    #[error("Malformed reply to {command}: {reason}")]
    MalformedReply {
        command: Command,
        reason: String,
    },

    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Reply body could not be parsed
    #[error(transparent)]
    Parse(#[from] ssprust_types::Error),
}

impl Error {
    /// Errors after which the key must be negotiated again
    pub fn requires_renegotiation(&self) -> bool {
        matches!(
            self,
            Self::KeyNotNegotiated | Self::Decrypt(_) | Self::CounterMismatch { .. }
        )
    }
}
