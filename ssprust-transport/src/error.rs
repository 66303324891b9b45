//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Port not open")]
    NotOpen,

    #[error("Port already open")]
    AlreadyOpen,

    #[error("Read timeout")]
    ReadTimeout,

    #[error("Port closed by device")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
}

impl Error {
    /// The link is gone, as opposed to a single slow read
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::NotOpen | Self::ConnectionClosed)
    }
}
