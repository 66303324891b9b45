//! SSP command definitions

use std::fmt;

use crate::error::{Error, Result};

/// Protocol command codes
///
/// The code is always the first byte of the command payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // Link management
    Reset = 0x01,
    SetChannelInhibits = 0x02,
    DisplayOn = 0x03,
    DisplayOff = 0x04,
    SetupRequest = 0x05,
    HostProtocolVersion = 0x06,
    Poll = 0x07,
    RejectBanknote = 0x08,
    Disable = 0x09,
    Enable = 0x0A,
    GetSerialNumber = 0x0C,
    UnitData = 0x0D,
    ChannelValueRequest = 0x0E,
    Sync = 0x11,
    LastRejectCode = 0x17,
    Hold = 0x18,
    GetFirmwareVersion = 0x20,
    GetDatasetVersion = 0x21,
    GetAllLevels = 0x22,

    // Payout
    PayoutAmount = 0x33,
    SetDenominationLevel = 0x34,
    GetDenominationLevel = 0x35,
    HaltPayout = 0x38,
    SetDenominationRoute = 0x3B,
    GetDenominationRoute = 0x3C,
    FloatAmount = 0x3D,
    GetMinimumPayout = 0x3E,
    EmptyAll = 0x3F,
    GetNotePositions = 0x41,
    PayoutNote = 0x42,
    StackNote = 0x43,
    FloatByDenomination = 0x44,
    SetValueReportingType = 0x45,
    PayoutByDenomination = 0x46,

    // Key exchange
    SetGenerator = 0x4A,
    SetModulus = 0x4B,
    RequestKeyExchange = 0x4C,

    // Smart payout housekeeping
    SmartEmpty = 0x52,
    CashboxPayoutOperationData = 0x53,
    ConfigureBezel = 0x54,
    PollWithAck = 0x56,
    EventAck = 0x57,
    GetCounters = 0x58,
    ResetCounters = 0x59,
    DisablePayoutDevice = 0x5B,
    EnablePayoutDevice = 0x5C,
    SetFixedEncryptionKey = 0x60,
    ResetFixedEncryptionKey = 0x61,
}

impl Command {
    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::Reset => "RESET",
            Self::SetChannelInhibits => "SET_CHANNEL_INHIBITS",
            Self::DisplayOn => "DISPLAY_ON",
            Self::DisplayOff => "DISPLAY_OFF",
            Self::SetupRequest => "SETUP_REQUEST",
            Self::HostProtocolVersion => "HOST_PROTOCOL_VERSION",
            Self::Poll => "POLL",
            Self::RejectBanknote => "REJECT_BANKNOTE",
            Self::Disable => "DISABLE",
            Self::Enable => "ENABLE",
            Self::GetSerialNumber => "GET_SERIAL_NUMBER",
            Self::UnitData => "UNIT_DATA",
            Self::ChannelValueRequest => "CHANNEL_VALUE_REQUEST",
            Self::Sync => "SYNC",
            Self::LastRejectCode => "LAST_REJECT_CODE",
            Self::Hold => "HOLD",
            Self::GetFirmwareVersion => "GET_FIRMWARE_VERSION",
            Self::GetDatasetVersion => "GET_DATASET_VERSION",
            Self::GetAllLevels => "GET_ALL_LEVELS",
            Self::PayoutAmount => "PAYOUT_AMOUNT",
            Self::SetDenominationLevel => "SET_DENOMINATION_LEVEL",
            Self::GetDenominationLevel => "GET_DENOMINATION_LEVEL",
            Self::HaltPayout => "HALT_PAYOUT",
            Self::SetDenominationRoute => "SET_DENOMINATION_ROUTE",
            Self::GetDenominationRoute => "GET_DENOMINATION_ROUTE",
            Self::FloatAmount => "FLOAT_AMOUNT",
            Self::GetMinimumPayout => "GET_MINIMUM_PAYOUT",
            Self::EmptyAll => "EMPTY_ALL",
            Self::GetNotePositions => "GET_NOTE_POSITIONS",
            Self::PayoutNote => "PAYOUT_NOTE",
            Self::StackNote => "STACK_NOTE",
            Self::FloatByDenomination => "FLOAT_BY_DENOMINATION",
            Self::SetValueReportingType => "SET_VALUE_REPORTING_TYPE",
            Self::PayoutByDenomination => "PAYOUT_BY_DENOMINATION",
            Self::SetGenerator => "SET_GENERATOR",
            Self::SetModulus => "SET_MODULUS",
            Self::RequestKeyExchange => "REQUEST_KEY_EXCHANGE",
            Self::SmartEmpty => "SMART_EMPTY",
            Self::CashboxPayoutOperationData => "CASHBOX_PAYOUT_OPERATION_DATA",
            Self::ConfigureBezel => "CONFIGURE_BEZEL",
            Self::PollWithAck => "POLL_WITH_ACK",
            Self::EventAck => "EVENT_ACK",
            Self::GetCounters => "GET_COUNTERS",
            Self::ResetCounters => "RESET_COUNTERS",
            Self::DisablePayoutDevice => "DISABLE_PAYOUT_DEVICE",
            Self::EnablePayoutDevice => "ENABLE_PAYOUT_DEVICE",
            Self::SetFixedEncryptionKey => "SET_FIXED_ENCRYPTION_KEY",
            Self::ResetFixedEncryptionKey => "RESET_FIXED_ENCRYPTION_KEY",
        }
    }

    /// Key negotiation commands, always sent in plain text
    pub fn is_key_exchange(self) -> bool {
        matches!(
            self,
            Self::SetGenerator | Self::SetModulus | Self::RequestKeyExchange
        )
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Reset),
            0x02 => Ok(Self::SetChannelInhibits),
            0x03 => Ok(Self::DisplayOn),
            0x04 => Ok(Self::DisplayOff),
            0x05 => Ok(Self::SetupRequest),
            0x06 => Ok(Self::HostProtocolVersion),
            0x07 => Ok(Self::Poll),
            0x08 => Ok(Self::RejectBanknote),
            0x09 => Ok(Self::Disable),
            0x0A => Ok(Self::Enable),
            0x0C => Ok(Self::GetSerialNumber),
            0x0D => Ok(Self::UnitData),
            0x0E => Ok(Self::ChannelValueRequest),
            0x11 => Ok(Self::Sync),
            0x17 => Ok(Self::LastRejectCode),
            0x18 => Ok(Self::Hold),
            0x20 => Ok(Self::GetFirmwareVersion),
            0x21 => Ok(Self::GetDatasetVersion),
            0x22 => Ok(Self::GetAllLevels),
            0x33 => Ok(Self::PayoutAmount),
            0x34 => Ok(Self::SetDenominationLevel),
            0x35 => Ok(Self::GetDenominationLevel),
            0x38 => Ok(Self::HaltPayout),
            0x3B => Ok(Self::SetDenominationRoute),
            0x3C => Ok(Self::GetDenominationRoute),
            0x3D => Ok(Self::FloatAmount),
            0x3E => Ok(Self::GetMinimumPayout),
            0x3F => Ok(Self::EmptyAll),
            0x41 => Ok(Self::GetNotePositions),
            0x42 => Ok(Self::PayoutNote),
            0x43 => Ok(Self::StackNote),
            0x44 => Ok(Self::FloatByDenomination),
            0x45 => Ok(Self::SetValueReportingType),
            0x46 => Ok(Self::PayoutByDenomination),
            0x4A => Ok(Self::SetGenerator),
            0x4B => Ok(Self::SetModulus),
            0x4C => Ok(Self::RequestKeyExchange),
            0x52 => Ok(Self::SmartEmpty),
            0x53 => Ok(Self::CashboxPayoutOperationData),
            0x54 => Ok(Self::ConfigureBezel),
            0x56 => Ok(Self::PollWithAck),
            0x57 => Ok(Self::EventAck),
            0x58 => Ok(Self::GetCounters),
            0x59 => Ok(Self::ResetCounters),
            0x5B => Ok(Self::DisablePayoutDevice),
            0x5C => Ok(Self::EnablePayoutDevice),
            0x60 => Ok(Self::SetFixedEncryptionKey),
            0x61 => Ok(Self::ResetFixedEncryptionKey),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

/// First byte of every reply: the generic outcome of the command
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    Ok = 0xF0,
    CommandNotKnown = 0xF2,
    WrongParameterCount = 0xF3,
    ParameterOutOfRange = 0xF4,
    CannotBeProcessed = 0xF5,
    SoftwareError = 0xF6,
    Fail = 0xF8,
    KeyNotSet = 0xFA,
}

impl TryFrom<u8> for ResponseCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0xF0 => Ok(Self::Ok),
            0xF2 => Ok(Self::CommandNotKnown),
            0xF3 => Ok(Self::WrongParameterCount),
            0xF4 => Ok(Self::ParameterOutOfRange),
            0xF5 => Ok(Self::CannotBeProcessed),
            0xF6 => Ok(Self::SoftwareError),
            0xF8 => Ok(Self::Fail),
            0xFA => Ok(Self::KeyNotSet),
            _ => Err(Error::UnknownResponseCode(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_conversion() {
        assert_eq!(u8::from(Command::Poll), 0x07);
        assert_eq!(Command::try_from(0x07).unwrap(), Command::Poll);
        assert_eq!(
            Command::try_from(0x4C).unwrap(),
            Command::RequestKeyExchange
        );
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            Command::try_from(0xFF),
            Err(Error::UnknownCommand(0xFF))
        ));
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::Sync.to_string(), "SYNC(0x11)");
    }

    #[test]
    fn test_key_exchange_commands() {
        assert!(Command::SetModulus.is_key_exchange());
        assert!(!Command::Poll.is_key_exchange());
    }

    #[test]
    fn test_response_code() {
        assert_eq!(ResponseCode::try_from(0xF0).unwrap(), ResponseCode::Ok);
        assert_eq!(
            ResponseCode::try_from(0xFA).unwrap(),
            ResponseCode::KeyNotSet
        );
        assert!(ResponseCode::try_from(0x00).is_err());
    }
}
