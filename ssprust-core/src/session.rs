//! Session management for the SSP link
//!
//! A session tracks per-connection protocol state:
//! - Sequence flag (toggles on every new command)
//! - Device address carried in the sequence byte
//! - Encryption flag and packet counter
//! - Connection state

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use crate::constants::{ADDRESS_MASK, SEQUENCE_CLEAR, SEQUENCE_SET};
use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Port closed
    Disconnected,

    /// Port open, commands go out in plain text
    Connected,

    /// Key negotiated, commands are encrypted
    Secured,
}

/// Session manager
///
/// Thread-safe and can be cloned cheaply (Arc internally).
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    address: u8,

    /// Last sequence flag sent (0x00 or 0x80)
    sequence: AtomicU8,

    /// Encrypted packet counter
    counter: AtomicU32,

    debug: AtomicBool,

    state: parking_lot::RwLock<SessionState>,
}

impl Session {
    /// Create a new disconnected session for the device at `address`
    pub fn new(address: u8) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                address: address & ADDRESS_MASK,
                sequence: AtomicU8::new(SEQUENCE_CLEAR),
                counter: AtomicU32::new(0),
                debug: AtomicBool::new(false),
                state: parking_lot::RwLock::new(SessionState::Disconnected),
            }),
        }
    }

    pub fn address(&self) -> u8 {
        self.inner.address
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Check if the port is open
    pub fn is_connected(&self) -> bool {
        !matches!(self.state(), SessionState::Disconnected)
    }

    /// Check if commands are encrypted
    pub fn encryption_enabled(&self) -> bool {
        matches!(self.state(), SessionState::Secured)
    }

    /// Mark the port open; sequence and counter start over
    pub fn open(&self) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Disconnected {
            return Err(Error::InvalidSessionState(format!(
                "Cannot open from state: {:?}",
                *state
            )));
        }

        self.inner.sequence.store(SEQUENCE_CLEAR, Ordering::Release);
        self.inner.counter.store(0, Ordering::Release);
        *state = SessionState::Connected;

        Ok(())
    }

    /// Switch to encrypted mode with a fresh counter
    pub fn secure(&self) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state == SessionState::Disconnected {
            return Err(Error::InvalidSessionState(
                "Cannot enable encryption while disconnected".to_string(),
            ));
        }

        self.inner.counter.store(0, Ordering::Release);
        *state = SessionState::Secured;
        Ok(())
    }

    /// Drop back to plain text, e.g. before renegotiating
    pub fn insecure(&self) {
        let mut state = self.inner.state.write();
        if *state == SessionState::Secured {
            *state = SessionState::Connected;
        }
    }

    /// Close session
    pub fn close(&self) {
        self.inner.sequence.store(SEQUENCE_CLEAR, Ordering::Release);
        self.inner.counter.store(0, Ordering::Release);
        *self.inner.state.write() = SessionState::Disconnected;
    }

    /// Toggle the sequence flag and return the byte for the next command
    ///
    /// The first command of a session carries 0x80. Retries of the same
    /// command must reuse the returned byte.
    pub fn next_sequence(&self) -> u8 {
        let flag = self.inner.sequence.fetch_xor(SEQUENCE_SET, Ordering::AcqRel) ^ SEQUENCE_SET;
        flag | self.inner.address
    }

    /// Counter for the next encrypted command
    pub fn counter(&self) -> u32 {
        self.inner.counter.load(Ordering::Acquire)
    }

    /// Advance the counter after a completed encrypted exchange
    pub fn advance_counter(&self) -> u32 {
        self.inner.counter.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    pub fn debug(&self) -> bool {
        self.inner.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, enabled: bool) {
        self.inner.debug.store(enabled, Ordering::Relaxed);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(0)
    }
}
