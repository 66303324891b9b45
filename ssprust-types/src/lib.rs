//! Type definitions for ssprust
//!
//! Plain data carried between the protocol engine and its callers, plus the
//! parsers for the fixed-layout reply bodies the device sends back.

pub mod channel;
pub mod counters;
pub mod currency;
pub mod error;
pub mod notification;
pub mod unit;

pub use channel::{ChannelInfo, ChannelTable, PayoutRequest};
pub use counters::{CashboxPayout, Counters};
pub use currency::Currency;
pub use error::{Error, Result};
pub use notification::{Notification, NotificationKind};
pub use unit::{SetupInfo, UnitData, UnitType};
