//! SSP frame structure and encoding/decoding

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use tracing::trace;

use crate::{
    checksum,
    constants::{ADDRESS_MASK, FRAME_OVERHEAD, SEQUENCE_SET, STX},
    error::{Error, Result},
};

/// SSP packet
///
/// # Frame Structure
///
/// ```text
/// ┌──────┬──────────┬────────┬─────────────┬────────┬────────┐
/// │ STX  │ SEQ/ADDR │  LEN   │    DATA     │ CRC_LO │ CRC_HI │
/// │ 0x7F │  1 byte  │ 1 byte │  LEN bytes  │ 1 byte │ 1 byte │
/// └──────┴──────────┴────────┴─────────────┴────────┴────────┘
/// ```
///
/// The CRC covers `SEQ | LEN | DATA`. After the CRC is appended every byte
/// after the leading STX that equals STX is sent twice.
///
/// # Examples
///
/// ```
/// use ssprust_core::Packet;
///
/// let packet = Packet::new(0x80, vec![0x11]);
/// let encoded = packet.encode().unwrap();
/// assert_eq!(&encoded[..], &[0x7F, 0x80, 0x01, 0x11, 0x65, 0x82]);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    /// Sequence flag (bit 7) and device address (bits 0-6)
    pub sequence: u8,

    /// Frame data: command and parameters, a reply, or an encrypted record
    pub payload: Bytes,
}

impl Packet {
    /// Largest payload the length byte can describe
    pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

    pub fn new(sequence: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
        }
    }

    /// Device address carried in the sequence byte
    pub fn address(&self) -> u8 {
        self.sequence & ADDRESS_MASK
    }

    /// State of the sequence flag
    pub fn sequence_flag(&self) -> bool {
        self.sequence & SEQUENCE_SET != 0
    }

    /// CRC over `SEQ | LEN | DATA`
    pub fn checksum(&self) -> u16 {
        let mut buf = Vec::with_capacity(2 + self.payload.len());
        buf.push(self.sequence);
        buf.push(self.payload.len() as u8);
        buf.extend_from_slice(&self.payload);
        checksum::calculate(&buf)
    }

    /// Encode to wire bytes, STX-stuffed
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLarge`] if the payload exceeds 255 bytes.
    pub fn encode(&self) -> Result<BytesMut> {
        if self.payload.len() > Self::MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: self.payload.len(),
                max: Self::MAX_PAYLOAD_SIZE,
            });
        }

        let mut raw = BytesMut::with_capacity(self.payload.len() + 4);
        raw.put_u8(self.sequence);
        raw.put_u8(self.payload.len() as u8);
        raw.put_slice(&self.payload);
        let crc = checksum::calculate(&raw);
        raw.put_u16_le(crc);

        let mut out = BytesMut::with_capacity(raw.len() * 2 + 1);
        out.put_u8(STX);
        for &b in raw.iter() {
            if b == STX {
                out.put_u8(STX);
            }
            out.put_u8(b);
        }

        Ok(out)
    }

    /// Decode a complete, already de-stuffed frame (as produced by [`Deframer`])
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The frame is shorter than the fixed overhead
    /// - The first byte is not STX
    /// - The length byte disagrees with the frame size
    /// - Checksum verification fails
    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() < FRAME_OVERHEAD {
            return Err(Error::FrameTooShort {
                expected: FRAME_OVERHEAD,
                actual: frame.len(),
            });
        }

        if frame[0] != STX {
            return Err(Error::MissingStx(frame[0]));
        }

        let declared = frame[2] as usize;
        if frame.len() != declared + FRAME_OVERHEAD {
            return Err(Error::LengthMismatch {
                declared,
                actual: frame.len() - FRAME_OVERHEAD,
            });
        }

        let body = &frame[1..3 + declared];
        let received = u16::from_le_bytes([frame[3 + declared], frame[4 + declared]]);
        let expected = checksum::calculate(body);
        if expected != received {
            return Err(Error::ChecksumMismatch { expected, received });
        }

        Ok(Self {
            sequence: frame[1],
            payload: Bytes::copy_from_slice(&frame[3..3 + declared]),
        })
    }

    /// Total size on the wire before stuffing
    pub fn size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("sequence", &format!("0x{:02X}", self.sequence))
            .field("checksum", &format!("0x{:04X}", self.checksum()))
            .field("payload", &hex::encode_upper(&self.payload))
            .finish()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet(seq=0x{:02X}, len={})",
            self.sequence,
            self.payload.len()
        )
    }
}

/// Incremental frame assembler
///
/// Bytes are pushed one at a time as they arrive. The first STX seen while
/// idle starts a frame; inside a frame a doubled STX collapses to one byte.
/// Once three bytes are buffered the length field fixes the frame size and
/// the completed (de-stuffed) frame is handed back.
#[derive(Debug, Default)]
pub struct Deframer {
    buffer: BytesMut,
    saw_stx: bool,
    expected: Option<usize>,
}

impl Deframer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns the frame once it is complete
    pub fn push(&mut self, byte: u8) -> Option<BytesMut> {
        if self.buffer.is_empty() {
            if byte == STX {
                self.buffer.put_u8(byte);
            } else {
                trace!(byte = format!("0x{:02X}", byte), "Skipping byte outside frame");
            }
            return None;
        }

        if self.saw_stx {
            self.saw_stx = false;
            if byte != STX {
                // A lone STX is the start of a new frame
                trace!("Resynchronising on unpaired STX");
                self.reset();
                self.buffer.put_u8(STX);
            }
            self.accept(byte)
        } else if byte == STX {
            self.saw_stx = true;
            None
        } else {
            self.accept(byte)
        }
    }

    /// Feed a chunk; returns the first frame completed by it
    ///
    /// Bytes following a completed frame are discarded.
    pub fn push_slice(&mut self, bytes: &[u8]) -> Option<BytesMut> {
        bytes.iter().find_map(|&b| self.push(b))
    }

    /// Number of bytes buffered for the frame in progress
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.saw_stx = false;
        self.expected = None;
    }

    fn accept(&mut self, byte: u8) -> Option<BytesMut> {
        self.buffer.put_u8(byte);

        if self.buffer.len() == 3 {
            self.expected = Some(self.buffer[2] as usize + FRAME_OVERHEAD);
        }

        match self.expected {
            Some(len) if self.buffer.len() == len => {
                let frame = self.buffer.split();
                self.reset();
                Some(frame)
            }
            _ => None,
        }
    }
}
