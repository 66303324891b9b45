//! Transport layer for the SSP protocol
//!
//! Provides the byte channel the protocol engine talks through and its
//! serial-port implementation.

pub mod error;
pub mod serial;

pub use error::{Error, Result};
pub use serial::SerialTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;

/// Duplex byte channel to a device
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the channel
    async fn open(&mut self) -> Result<()>;

    /// Close the channel
    async fn close(&mut self) -> Result<()>;

    /// Check if open
    fn is_open(&self) -> bool;

    /// Discard bytes pending in either direction
    fn clear(&mut self) -> Result<()>;

    /// Send raw bytes
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive whatever bytes arrive within `timeout`
    async fn receive(&mut self, timeout: Duration) -> Result<BytesMut>;

    /// Port or endpoint name for logging
    fn port_name(&self) -> String;
}
