//! Poll reply decoding
//!
//! A poll reply is a status byte followed by a run of event codes. Most
//! events are a single byte; some carry a channel index, a fixed 7-byte
//! value/currency block, or a count byte followed by `count` fixed-size
//! entries. [`decode`] turns the run into [`PollEvent`]s and
//! [`EventTracker`] turns each event into the work the driver has to do.

use std::fmt;
use tracing::{debug, warn};

use ssprust_types::{ChannelInfo, ChannelTable, Currency, Notification, NotificationKind};

/// Poll event codes
pub mod code {
    pub const SLAVE_RESET: u8 = 0xF1;
    pub const READ_NOTE: u8 = 0xEF;
    pub const CREDIT_NOTE: u8 = 0xEE;
    pub const NOTE_REJECTING: u8 = 0xED;
    pub const NOTE_REJECTED: u8 = 0xEC;
    pub const NOTE_STACKING: u8 = 0xCC;
    pub const NOTE_STACKED: u8 = 0xEB;
    pub const SAFE_NOTE_JAM: u8 = 0xEA;
    pub const UNSAFE_NOTE_JAM: u8 = 0xE9;
    pub const DISABLED: u8 = 0xE8;
    pub const FRAUD_ATTEMPT: u8 = 0xE6;
    pub const STACKER_FULL: u8 = 0xE7;
    pub const NOTE_CLEARED_FROM_FRONT: u8 = 0xE1;
    pub const NOTE_CLEARED_TO_CASHBOX: u8 = 0xE2;
    pub const CASHBOX_REMOVED: u8 = 0xE3;
    pub const CASHBOX_REPLACED: u8 = 0xE4;
    pub const DISPENSING: u8 = 0xDA;
    pub const DISPENSED: u8 = 0xD2;
    pub const JAMMED: u8 = 0xD5;
    pub const HALTED: u8 = 0xD6;
    pub const FLOATING: u8 = 0xD7;
    pub const FLOATED: u8 = 0xD8;
    pub const TIME_OUT: u8 = 0xD9;
    pub const INCOMPLETE_PAYOUT: u8 = 0xDC;
    pub const INCOMPLETE_FLOAT: u8 = 0xDD;
    pub const EMPTYING: u8 = 0xC2;
    pub const EMPTIED: u8 = 0xC3;
    pub const SMART_EMPTYING: u8 = 0xB3;
    pub const SMART_EMPTIED: u8 = 0xB4;
    pub const NOTE_STORED_IN_PAYOUT: u8 = 0xDB;
    pub const PAYOUT_OUT_OF_SERVICE: u8 = 0xC6;
    pub const ERROR_DURING_PAYOUT: u8 = 0xB1;
    pub const NOTE_TRANSFERRED_TO_STACKER: u8 = 0xC9;
    pub const NOTE_HELD_IN_BEZEL: u8 = 0xCE;
    pub const NOTE_PAID_INTO_STORE_AT_POWER_UP: u8 = 0xCB;
    pub const NOTE_PAID_INTO_STACKER_AT_POWER_UP: u8 = 0xCA;
}

/// Value/currency pair reported inside an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Amount {
    pub value: u32,
    pub currency: Currency,
}

impl Amount {
    const SIZE: usize = 7;

    fn parse(entry: &[u8]) -> Self {
        Self {
            value: u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]),
            currency: Currency::from_slice(&entry[4..]).unwrap_or_default(),
        }
    }
}

/// Entry of an incomplete payout/float event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortAmount {
    pub paid: u32,
    pub requested: u32,
    pub currency: Currency,
}

impl ShortAmount {
    const SIZE: usize = 11;

    fn parse(entry: &[u8]) -> Self {
        Self {
            paid: u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]),
            requested: u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]),
            currency: Currency::from_slice(&entry[8..]).unwrap_or_default(),
        }
    }
}

/// One decoded poll event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    SlaveReset,
    /// Channel 0 while the note is still being identified
    ReadNote { channel: u8 },
    CreditNote { channel: u8 },
    NoteRejecting,
    NoteRejected,
    NoteStacking,
    NoteStacked,
    SafeNoteJam,
    UnsafeNoteJam,
    Disabled,
    FraudAttempt(Vec<Amount>),
    StackerFull,
    NoteClearedFromFront { channel: u8 },
    NoteClearedToCashbox { channel: u8 },
    CashboxRemoved,
    CashboxReplaced,
    Dispensing(Vec<Amount>),
    Dispensed(Vec<Amount>),
    Jammed(Vec<Amount>),
    Halted(Vec<Amount>),
    Floating(Vec<Amount>),
    Floated(Vec<Amount>),
    TimeOut(Vec<Amount>),
    IncompletePayout(Vec<ShortAmount>),
    IncompleteFloat(Vec<ShortAmount>),
    Emptying,
    Emptied,
    SmartEmptying(Vec<Amount>),
    SmartEmptied(Vec<Amount>),
    NoteStoredInPayout,
    PayoutOutOfService,
    ErrorDuringPayout(Vec<Amount>),
    NoteTransferredToStacker(Amount),
    NoteHeldInBezel(Amount),
    NotePaidIntoStoreAtPowerUp(Amount),
    NotePaidIntoStackerAtPowerUp(Amount),
}

impl PollEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SlaveReset => "POLL_SLAVE_RESET",
            Self::ReadNote { .. } => "POLL_READ_NOTE",
            Self::CreditNote { .. } => "POLL_CREDIT_NOTE",
            Self::NoteRejecting => "POLL_NOTE_REJECTING",
            Self::NoteRejected => "POLL_NOTE_REJECTED",
            Self::NoteStacking => "POLL_NOTE_STACKING",
            Self::NoteStacked => "POLL_NOTE_STACKED",
            Self::SafeNoteJam => "POLL_SAFE_NOTE_JAM",
            Self::UnsafeNoteJam => "POLL_UNSAFE_NOTE_JAM",
            Self::Disabled => "POLL_DISABLED",
            Self::FraudAttempt(_) => "POLL_FRAUD_ATTEMPT",
            Self::StackerFull => "POLL_STACKER_FULL",
            Self::NoteClearedFromFront { .. } => "POLL_NOTE_CLEARED_FROM_FRONT",
            Self::NoteClearedToCashbox { .. } => "POLL_NOTE_CLEARED_TO_CASHBOX",
            Self::CashboxRemoved => "POLL_CASHBOX_REMOVED",
            Self::CashboxReplaced => "POLL_CASHBOX_REPLACED",
            Self::Dispensing(_) => "POLL_DISPENSING",
            Self::Dispensed(_) => "POLL_DISPENSED",
            Self::Jammed(_) => "POLL_JAMMED",
            Self::Halted(_) => "POLL_HALTED",
            Self::Floating(_) => "POLL_FLOATING",
            Self::Floated(_) => "POLL_FLOATED",
            Self::TimeOut(_) => "POLL_TIME_OUT",
            Self::IncompletePayout(_) => "POLL_INCOMPLETE_PAYOUT",
            Self::IncompleteFloat(_) => "POLL_INCOMPLETE_FLOAT",
            Self::Emptying => "POLL_EMPTYING",
            Self::Emptied => "POLL_EMPTIED",
            Self::SmartEmptying(_) => "POLL_SMART_EMPTYING",
            Self::SmartEmptied(_) => "POLL_SMART_EMPTIED",
            Self::NoteStoredInPayout => "POLL_NOTE_STORED_IN_PAYOUT",
            Self::PayoutOutOfService => "POLL_PAYOUT_OUT_OF_SERVICE",
            Self::ErrorDuringPayout(_) => "POLL_ERROR_DURING_PAYOUT",
            Self::NoteTransferredToStacker(_) => "POLL_NOTE_TRANSFERRED_TO_STACKER",
            Self::NoteHeldInBezel(_) => "POLL_NOTE_HELD_IN_BEZEL",
            Self::NotePaidIntoStoreAtPowerUp(_) => "POLL_NOTE_PAID_INTO_STORE_AT_POWER_UP",
            Self::NotePaidIntoStackerAtPowerUp(_) => "POLL_NOTE_PAID_INTO_STACKER_AT_POWER_UP",
        }
    }
}

impl fmt::Display for PollEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read-only cursor over the event run
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn byte(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied();
        self.pos += 1;
        b
    }

    /// Take up to `len` bytes; fewer when the run ends early
    fn take(&mut self, len: usize) -> &'a [u8] {
        let start = self.pos.min(self.data.len());
        let end = self.pos.saturating_add(len).min(self.data.len());
        self.pos = self.pos.saturating_add(len);
        &self.data[start..end]
    }

    fn channel(&mut self) -> u8 {
        self.take(1).first().copied().unwrap_or(0)
    }

    /// Count byte followed by `count * stride` bytes
    fn block(&mut self, stride: usize) -> &'a [u8] {
        let count = self.take(1).first().copied().unwrap_or(0) as usize;
        self.take(count * stride)
    }

    fn amounts(&mut self) -> Vec<Amount> {
        self.block(Amount::SIZE)
            .chunks_exact(Amount::SIZE)
            .map(Amount::parse)
            .collect()
    }

    fn short_amounts(&mut self) -> Vec<ShortAmount> {
        self.block(ShortAmount::SIZE)
            .chunks_exact(ShortAmount::SIZE)
            .map(ShortAmount::parse)
            .collect()
    }

    fn amount(&mut self) -> Amount {
        let entry = self.take(Amount::SIZE);
        if entry.len() == Amount::SIZE {
            Amount::parse(entry)
        } else {
            Amount::default()
        }
    }
}

/// Decode the event run of a poll reply (the bytes after the status marker)
///
/// Unknown codes are skipped one byte at a time.
///
/// # Examples
///
/// ```
/// use ssprust_core::poll::{decode, PollEvent};
///
/// let events = decode(&[0xEE, 0x02, 0xEB]);
/// assert_eq!(events, vec![PollEvent::CreditNote { channel: 2 }, PollEvent::NoteStacked]);
/// ```
pub fn decode(events: &[u8]) -> Vec<PollEvent> {
    use code::*;

    let mut cursor = Cursor { data: events, pos: 0 };
    let mut decoded = Vec::new();

    while let Some(byte) = cursor.byte() {
        let event = match byte {
            SLAVE_RESET => PollEvent::SlaveReset,
            READ_NOTE => PollEvent::ReadNote { channel: cursor.channel() },
            CREDIT_NOTE => PollEvent::CreditNote { channel: cursor.channel() },
            NOTE_REJECTING => PollEvent::NoteRejecting,
            NOTE_REJECTED => PollEvent::NoteRejected,
            NOTE_STACKING => PollEvent::NoteStacking,
            NOTE_STACKED => PollEvent::NoteStacked,
            SAFE_NOTE_JAM => PollEvent::SafeNoteJam,
            UNSAFE_NOTE_JAM => PollEvent::UnsafeNoteJam,
            DISABLED => PollEvent::Disabled,
            FRAUD_ATTEMPT => PollEvent::FraudAttempt(cursor.amounts()),
            STACKER_FULL => PollEvent::StackerFull,
            NOTE_CLEARED_FROM_FRONT => PollEvent::NoteClearedFromFront {
                channel: cursor.channel(),
            },
            NOTE_CLEARED_TO_CASHBOX => PollEvent::NoteClearedToCashbox {
                channel: cursor.channel(),
            },
            CASHBOX_REMOVED => PollEvent::CashboxRemoved,
            CASHBOX_REPLACED => PollEvent::CashboxReplaced,
            DISPENSING => PollEvent::Dispensing(cursor.amounts()),
            DISPENSED => PollEvent::Dispensed(cursor.amounts()),
            JAMMED => PollEvent::Jammed(cursor.amounts()),
            HALTED => PollEvent::Halted(cursor.amounts()),
            FLOATING => PollEvent::Floating(cursor.amounts()),
            FLOATED => PollEvent::Floated(cursor.amounts()),
            TIME_OUT => PollEvent::TimeOut(cursor.amounts()),
            INCOMPLETE_PAYOUT => PollEvent::IncompletePayout(cursor.short_amounts()),
            INCOMPLETE_FLOAT => PollEvent::IncompleteFloat(cursor.short_amounts()),
            EMPTYING => PollEvent::Emptying,
            EMPTIED => PollEvent::Emptied,
            SMART_EMPTYING => PollEvent::SmartEmptying(cursor.amounts()),
            SMART_EMPTIED => PollEvent::SmartEmptied(cursor.amounts()),
            NOTE_STORED_IN_PAYOUT => PollEvent::NoteStoredInPayout,
            PAYOUT_OUT_OF_SERVICE => PollEvent::PayoutOutOfService,
            ERROR_DURING_PAYOUT => PollEvent::ErrorDuringPayout(cursor.amounts()),
            NOTE_TRANSFERRED_TO_STACKER => PollEvent::NoteTransferredToStacker(cursor.amount()),
            NOTE_HELD_IN_BEZEL => PollEvent::NoteHeldInBezel(cursor.amount()),
            NOTE_PAID_INTO_STORE_AT_POWER_UP => {
                PollEvent::NotePaidIntoStoreAtPowerUp(cursor.amount())
            }
            NOTE_PAID_INTO_STACKER_AT_POWER_UP => {
                PollEvent::NotePaidIntoStackerAtPowerUp(cursor.amount())
            }
            other => {
                debug!(code = format!("0x{:02X}", other), "Ignoring unknown poll code");
                continue;
            }
        };

        decoded.push(event);
    }

    decoded
}

/// Work the driver performs in response to an event, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// Publish to subscribers
    Notify(Notification),

    /// Re-read channel levels and routes from the device
    RefreshChannels,

    /// Send the enable command so the validator accepts notes again
    EnableValidator,
}

/// Cross-event state: which note is in flight
#[derive(Debug, Clone, Default)]
pub struct EventTracker {
    last_accepted: Option<ChannelInfo>,
    refresh_on_credit: bool,
}

impl EventTracker {
    /// `refresh_on_credit` is set for smart payout units, whose levels
    /// change with every accepted note
    pub fn new(refresh_on_credit: bool) -> Self {
        Self {
            last_accepted: None,
            refresh_on_credit,
        }
    }

    pub fn set_refresh_on_credit(&mut self, enabled: bool) {
        self.refresh_on_credit = enabled;
    }

    pub fn last_accepted(&self) -> Option<&ChannelInfo> {
        self.last_accepted.as_ref()
    }

    /// Forget the note in flight, e.g. after a reconnect
    pub fn reset(&mut self) {
        self.last_accepted = None;
    }

    /// Reactions to one event, given the current channel table
    pub fn apply(&mut self, event: &PollEvent, channels: &ChannelTable) -> Vec<Reaction> {
        use NotificationKind::*;

        match event {
            PollEvent::SlaveReset => vec![Reaction::RefreshChannels],

            PollEvent::ReadNote { channel: 0 } => {
                vec![Reaction::Notify(Notification::bare(NoteRead))]
            }
            PollEvent::ReadNote { channel } => {
                let info = lookup(channels, *channel);
                vec![Reaction::Notify(note(NoteEscrowed, &info))]
            }

            PollEvent::CreditNote { channel } => {
                let info = lookup(channels, *channel);
                let mut reactions = vec![Reaction::Notify(note(NoteCredited, &info))];
                if self.refresh_on_credit {
                    reactions.push(Reaction::RefreshChannels);
                }
                self.last_accepted = Some(info);
                reactions
            }

            PollEvent::NoteStacked => {
                let info = self.last_accepted.take().unwrap_or_default();
                vec![Reaction::Notify(note(NoteStacked, &info))]
            }

            PollEvent::Floated(amounts) => completed(Floated, amounts),
            PollEvent::Dispensed(amounts) => completed(Dispensed, amounts),
            PollEvent::SmartEmptied(amounts) => completed(PayoutSmartEmptied, amounts),
            PollEvent::Emptied => completed(PayoutEmptied, &[]),

            PollEvent::NoteStoredInPayout => vec![
                Reaction::RefreshChannels,
                Reaction::Notify(Notification::bare(NoteStoredInPayout)),
            ],

            _ => Vec::new(),
        }
    }
}

fn lookup(channels: &ChannelTable, channel: u8) -> ChannelInfo {
    match channels.get(channel) {
        Some(info) => info.clone(),
        None => {
            warn!(channel, "Poll event references an unknown channel");
            ChannelInfo {
                channel,
                ..ChannelInfo::default()
            }
        }
    }
}

fn note(kind: NotificationKind, info: &ChannelInfo) -> Notification {
    Notification::new(kind, info.value, info.level, info.currency)
}

/// Payout-side operation finished: refresh, re-enable, then report
fn completed(kind: NotificationKind, amounts: &[Amount]) -> Vec<Reaction> {
    let first = amounts.first().copied().unwrap_or_default();
    vec![
        Reaction::RefreshChannels,
        Reaction::EnableValidator,
        Reaction::Notify(Notification::new(kind, first.value, 0, first.currency)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eur() -> Currency {
        Currency(*b"EUR")
    }

    fn channels() -> ChannelTable {
        let mut table = ChannelTable::new();
        table.replace(vec![
            ChannelInfo::new(1, 500, eur()),
            ChannelInfo::new(2, 1000, eur()),
            ChannelInfo::new(3, 2000, eur()),
        ]);
        table.set_level(2, 4);
        table
    }

    fn amount_block(entries: &[(u32, &[u8; 3])]) -> Vec<u8> {
        let mut block = vec![entries.len() as u8];
        for (value, currency) in entries {
            block.extend_from_slice(&value.to_le_bytes());
            block.extend_from_slice(*currency);
        }
        block
    }

    fn notifications(reactions: &[Reaction]) -> Vec<Notification> {
        reactions
            .iter()
            .filter_map(|r| match r {
                Reaction::Notify(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_credit_then_stacked() {
        let table = channels();
        let mut tracker = EventTracker::new(false);

        let reactions: Vec<Reaction> = decode(&[code::CREDIT_NOTE, 0x02, code::NOTE_STACKED])
            .iter()
            .flat_map(|e| tracker.apply(e, &table))
            .collect();

        assert_eq!(
            notifications(&reactions),
            vec![
                Notification::new(NotificationKind::NoteCredited, 1000, 4, eur()),
                Notification::new(NotificationKind::NoteStacked, 1000, 4, eur()),
            ]
        );
        assert!(tracker.last_accepted().is_none());
    }

    #[test]
    fn test_credit_refreshes_on_smart_payout() {
        let mut tracker = EventTracker::new(true);
        let reactions = tracker.apply(&PollEvent::CreditNote { channel: 1 }, &channels());

        assert_eq!(reactions.len(), 2);
        assert_eq!(reactions[1], Reaction::RefreshChannels);
        assert_eq!(tracker.last_accepted().map(|c| c.value), Some(500));
    }

    #[test]
    fn test_variable_block_is_skipped() {
        // Two entries of 7 bytes; the 0xEE inside must not be read as a code
        let mut data = vec![code::DISPENSING];
        data.extend(amount_block(&[(0xEE, b"EUR"), (2000, b"EUR")]));
        data.push(code::NOTE_STACKING);

        let events = decode(&data);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], PollEvent::NoteStacking);
        match &events[0] {
            PollEvent::Dispensing(amounts) => {
                assert_eq!(amounts.len(), 2);
                assert_eq!(amounts[1].value, 2000);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_incomplete_payout_stride() {
        let mut data = vec![code::INCOMPLETE_PAYOUT, 1];
        data.extend_from_slice(&500u32.to_le_bytes());
        data.extend_from_slice(&1000u32.to_le_bytes());
        data.extend_from_slice(b"EUR");
        data.push(code::DISABLED);

        assert_eq!(
            decode(&data),
            vec![
                PollEvent::IncompletePayout(vec![ShortAmount {
                    paid: 500,
                    requested: 1000,
                    currency: eur(),
                }]),
                PollEvent::Disabled,
            ]
        );
    }

    #[test]
    fn test_fixed_block_events() {
        let mut data = vec![code::NOTE_HELD_IN_BEZEL];
        data.extend_from_slice(&1000u32.to_le_bytes());
        data.extend_from_slice(b"EUR");
        data.push(code::NOTE_CLEARED_TO_CASHBOX);
        data.push(3);

        assert_eq!(
            decode(&data),
            vec![
                PollEvent::NoteHeldInBezel(Amount { value: 1000, currency: eur() }),
                PollEvent::NoteClearedToCashbox { channel: 3 },
            ]
        );
    }

    #[test]
    fn test_large_count_is_not_truncated() {
        // 40 entries * 7 + 1 = 281 bytes, more than a byte can count
        let entries: Vec<(u32, &[u8; 3])> = (0..40).map(|i| (i, b"EUR")).collect();
        let mut data = vec![code::FLOATING];
        data.extend(amount_block(&entries));
        data.push(code::SLAVE_RESET);

        let events = decode(&data);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], PollEvent::SlaveReset);
    }

    #[test]
    fn test_truncated_block_stops_cleanly() {
        let events = decode(&[code::DISPENSED, 3, 0x10, 0x00]);
        assert_eq!(events, vec![PollEvent::Dispensed(Vec::new())]);
    }

    #[test]
    fn test_unknown_codes_ignored() {
        assert_eq!(
            decode(&[0x00, 0x42, code::DISABLED]),
            vec![PollEvent::Disabled]
        );
        assert!(decode(&[]).is_empty());
    }

    #[test]
    fn test_read_note() {
        let mut tracker = EventTracker::default();
        let table = channels();

        let raw = tracker.apply(&PollEvent::ReadNote { channel: 0 }, &table);
        assert_eq!(
            notifications(&raw),
            vec![Notification::bare(NotificationKind::NoteRead)]
        );

        let escrow = tracker.apply(&PollEvent::ReadNote { channel: 3 }, &table);
        assert_eq!(
            notifications(&escrow),
            vec![Notification::new(NotificationKind::NoteEscrowed, 2000, 0, eur())]
        );
    }

    #[test]
    fn test_unknown_channel_defaults() {
        let mut tracker = EventTracker::default();
        let reactions = tracker.apply(&PollEvent::CreditNote { channel: 9 }, &channels());

        assert_eq!(
            notifications(&reactions),
            vec![Notification::bare(NotificationKind::NoteCredited)]
        );
        assert_eq!(tracker.last_accepted().map(|c| c.channel), Some(9));
    }

    #[test]
    fn test_dispensed_reactions() {
        let mut tracker = EventTracker::default();
        let event = PollEvent::Dispensed(vec![Amount { value: 1500, currency: eur() }]);

        assert_eq!(
            tracker.apply(&event, &channels()),
            vec![
                Reaction::RefreshChannels,
                Reaction::EnableValidator,
                Reaction::Notify(Notification::new(NotificationKind::Dispensed, 1500, 0, eur())),
            ]
        );
    }

    #[test]
    fn test_stored_in_payout() {
        let mut tracker = EventTracker::default();
        assert_eq!(
            tracker.apply(&PollEvent::NoteStoredInPayout, &channels()),
            vec![
                Reaction::RefreshChannels,
                Reaction::Notify(Notification::bare(NotificationKind::NoteStoredInPayout)),
            ]
        );
    }

    #[test]
    fn test_status_only_events() {
        let mut tracker = EventTracker::default();
        for event in [
            PollEvent::NoteRejected,
            PollEvent::SafeNoteJam,
            PollEvent::Halted(Vec::new()),
        ] {
            assert!(tracker.apply(&event, &channels()).is_empty());
        }
    }
}
