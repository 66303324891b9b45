//! Channel (denomination slot) bookkeeping

use std::fmt;

use crate::currency::Currency;

/// One recognised note denomination
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelInfo {
    /// 1-based channel index as reported by the device
    pub channel: u8,

    /// Value in minor units (already scaled by the real value multiplier)
    pub value: u32,

    /// Currency of this channel
    pub currency: Currency,

    /// Notes of this denomination currently stored for payout
    pub level: u32,

    /// `true` when accepted notes are kept for payout, `false` when they are
    /// routed to the cashbox
    pub recycling: bool,
}

impl ChannelInfo {
    pub fn new(channel: u8, value: u32, currency: Currency) -> Self {
        Self {
            channel,
            value,
            currency,
            level: 0,
            recycling: false,
        }
    }
}

impl fmt::Display for ChannelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Channel[{}: {} {}, level={}, {}]",
            self.channel,
            self.value,
            self.currency,
            self.level,
            if self.recycling { "recycled" } else { "cashbox" }
        )
    }
}

/// Channel table for one session
///
/// Replaced wholesale when the setup request is parsed and updated in place
/// by level/route queries. Every mutation bumps `version` so readers holding
/// a snapshot can tell it has gone stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelTable {
    channels: Vec<ChannelInfo>,
    version: u64,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every channel
    pub fn replace(&mut self, channels: Vec<ChannelInfo>) {
        self.channels = channels;
        self.version += 1;
    }

    pub fn clear(&mut self) {
        self.replace(Vec::new());
    }

    /// Look up a channel by its 1-based index
    pub fn get(&self, channel: u8) -> Option<&ChannelInfo> {
        self.channels.iter().find(|c| c.channel == channel)
    }

    /// Update the cached level of a channel; returns `false` if it is unknown
    pub fn set_level(&mut self, channel: u8, level: u32) -> bool {
        self.update(channel, |c| c.level = level)
    }

    /// Update the cached route of a channel; returns `false` if it is unknown
    pub fn set_recycling(&mut self, channel: u8, recycling: bool) -> bool {
        self.update(channel, |c| c.recycling = recycling)
    }

    fn update(&mut self, channel: u8, f: impl FnOnce(&mut ChannelInfo)) -> bool {
        match self.channels.iter_mut().find(|c| c.channel == channel) {
            Some(entry) => {
                f(entry);
                self.version += 1;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelInfo> {
        self.channels.iter()
    }

    pub fn as_slice(&self) -> &[ChannelInfo] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// One line of a payout-by-denomination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutRequest {
    /// Number of notes to pay
    pub count: u16,

    /// Note value in minor units
    pub value: u32,

    pub currency: Currency,
}
