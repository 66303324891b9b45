//! Notifications published to subscribers while the validator is listening

use std::fmt;

use crate::currency::Currency;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// A note is being read and has not been identified yet
    NoteRead,

    /// A recognised note is held in escrow
    NoteEscrowed,

    /// A note has been accepted and credited
    NoteCredited,

    /// The credited note reached the stacker
    NoteStacked,

    /// A note was stored in the payout unit for later reuse
    NoteStoredInPayout,

    /// A payout finished
    Dispensed,

    /// A float operation finished
    Floated,

    /// The payout store was emptied into the cashbox
    PayoutEmptied,

    /// The payout store was smart-emptied (contents counted)
    PayoutSmartEmptied,
}

/// A domain event raised by the poll decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,

    /// Value in minor units (0 when the event does not reference a note)
    pub value: u32,

    /// Denomination level or note count associated with the event
    pub level: u32,

    pub currency: Currency,
}

impl Notification {
    pub fn new(kind: NotificationKind, value: u32, level: u32, currency: Currency) -> Self {
        Self {
            kind,
            value,
            level,
            currency,
        }
    }

    /// Notification without any note attached
    pub fn bare(kind: NotificationKind) -> Self {
        Self::new(kind, 0, 0, Currency::default())
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}({} {}, level={})",
            self.kind, self.value, self.currency, self.level
        )
    }
}
