//! # ssprust-core
//!
//! Core protocol implementation for SSP banknote validators and smart
//! payout units.
//!
//! This crate provides the protocol primitives, free of any I/O:
//! - Frame encoding/decoding and incremental deframing
//! - CRC-16 checksum
//! - Command and reply codes, reply classification
//! - Key exchange arithmetic and the encrypted payload layer
//! - Poll event decoding
//! - Payout denomination planning

pub mod checksum;
pub mod command;
pub mod constants;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod math;
pub mod packet;
pub mod payout;
pub mod poll;
pub mod response;
pub mod session;

pub use command::{Command, ResponseCode};
pub use error::{Error, Result};
pub use keys::KeyMaterial;
pub use packet::{Deframer, Packet};
pub use payout::DenominationPlan;
pub use poll::{EventTracker, PollEvent, Reaction};
pub use response::{RejectReason, Response, ResponseStatus};
pub use session::{Session, SessionState};
