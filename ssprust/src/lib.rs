//! # ssprust
//!
//! Rust driver for SSP banknote validators and smart payout units.
//!
//! ## Features
//!
//! - Async/await API using Tokio
//! - Encrypted command link with Diffie-Hellman key negotiation
//! - Background polling with note and payout notifications
//! - Exact-change payout planning from stored note levels
//!
//! ## Quick Start
//!
//! ```no_run
//! use ssprust::Device;
//!
//! #[tokio::main]
//! async fn main() -> ssprust::Result<()> {
//!     // Open the port and bring the unit into service
//!     let device = Device::serial("/dev/ttyUSB0");
//!     device.connect().await?;
//!     device.initialize().await?;
//!
//!     let serial = device.get_serial_number().await?;
//!     println!("Serial number: {}", serial);
//!
//!     device.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;

mod exchange;
mod key_exchange;
mod listener;

// Re-exports
pub use config::DeviceConfig;
pub use device::Device;
pub use error::{Error, ResponseExt, Result};

// Re-export protocol and data types
pub use ssprust_core::{
    Command, DenominationPlan, PollEvent, RejectReason, Response, ResponseStatus, SessionState,
};
pub use ssprust_transport::{SerialTransport, Transport};
pub use ssprust_types::{
    CashboxPayout, ChannelInfo, Counters, Currency, Notification, NotificationKind,
    PayoutRequest, SetupInfo, UnitData, UnitType,
};
