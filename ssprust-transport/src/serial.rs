//! Serial port transport

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::{debug, trace, warn};

use ssprust_core::constants::serial::{BAUD_RATE, IO_TIMEOUT};

use crate::{error::*, Transport};

/// Serial transport for SSP devices
///
/// The line runs 8 data bits, no parity, two stop bits and no flow control.
pub struct SerialTransport {
    port: String,
    baud_rate: u32,
    io_timeout: Duration,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Create new serial transport, e.g. `SerialTransport::new("/dev/ttyUSB0")`
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: BAUD_RATE,
            io_timeout: IO_TIMEOUT,
            stream: None,
        }
    }

    /// Set baud rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set per-operation I/O timeout
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn io_timeout(&self) -> Duration {
        self.io_timeout
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        debug!(port = %self.port, baud = self.baud_rate, "Opening serial port");

        let stream = tokio_serial::new(&self.port, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::Two)
            .flow_control(FlowControl::None)
            .timeout(self.io_timeout)
            .open_native_async()?;

        debug!(port = %self.port, "Serial port open");

        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!(port = %self.port, "Closing serial port");

            let _ = stream.flush().await;
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn clear(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;
        stream.clear(ClearBuffer::All)?;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let io_timeout = self.io_timeout;
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;

        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        timeout(io_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Io(std::io::ErrorKind::TimedOut.into()))??;

        Ok(())
    }

    async fn receive(&mut self, read_timeout: Duration) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotOpen)?;

        let mut buf = BytesMut::with_capacity(256);

        let n = timeout(read_timeout, stream.read_buf(&mut buf))
            .await
            .map_err(|_| Error::ReadTimeout)?
            .map_err(Error::Io)?;

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        trace!("Received {} bytes: {:02X?}", n, &buf[..n.min(16)]);

        Ok(buf)
    }

    fn port_name(&self) -> String {
        self.port.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!(port = %self.port, "Serial transport dropped while still open");
        }
    }
}
