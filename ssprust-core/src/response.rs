//! Reply classification
//!
//! The first byte of every reply is a generic status marker. A
//! "cannot be processed" marker is followed by a reason byte whose meaning
//! depends on the command; those meanings live in the tables below.

use bytes::Bytes;
use std::fmt;

use crate::command::{Command, ResponseCode};

/// Outcome of one command exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    /// Reply marker not recognised
    Unknown,
    Ok,
    CommandNotKnown,
    WrongParameterCount,
    ParameterOutOfRange,
    CannotBeProcessed,
    SoftwareError,
    Fail,
    KeyNotSet,
    PortClosed,
    PortError,
    PortTimeout,
    EncryptFail,
    DecryptFail,
    SystemError,
}

impl ResponseStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Failure of the link rather than a device decision
    pub fn is_transport_error(self) -> bool {
        matches!(self, Self::PortClosed | Self::PortError | Self::PortTimeout)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Ok => "OK",
            Self::CommandNotKnown => "COMMAND_NOT_KNOWN",
            Self::WrongParameterCount => "WRONG_PARAMETER_COUNT",
            Self::ParameterOutOfRange => "PARAMETER_OUT_OF_RANGE",
            Self::CannotBeProcessed => "CANNOT_BE_PROCESSED",
            Self::SoftwareError => "SOFTWARE_ERROR",
            Self::Fail => "FAIL",
            Self::KeyNotSet => "KEY_NOT_SET",
            Self::PortClosed => "PORT_CLOSED",
            Self::PortError => "PORT_ERROR",
            Self::PortTimeout => "PORT_TIMEOUT",
            Self::EncryptFail => "ENCRYPT_FAIL",
            Self::DecryptFail => "DECRYPT_FAIL",
            Self::SystemError => "SYSTEM_ERROR",
        }
    }
}

impl From<ResponseCode> for ResponseStatus {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::Ok => Self::Ok,
            ResponseCode::CommandNotKnown => Self::CommandNotKnown,
            ResponseCode::WrongParameterCount => Self::WrongParameterCount,
            ResponseCode::ParameterOutOfRange => Self::ParameterOutOfRange,
            ResponseCode::CannotBeProcessed => Self::CannotBeProcessed,
            ResponseCode::SoftwareError => Self::SoftwareError,
            ResponseCode::Fail => Self::Fail,
            ResponseCode::KeyNotSet => Self::KeyNotSet,
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Commands sharing one table of "cannot be processed" reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonCategory {
    EnablePayoutDevice,
    Payout,
    Float,
    Routing,
    NoteFloat,
    NotePositions,
}

impl ReasonCategory {
    pub fn for_command(command: Command) -> Option<Self> {
        match command {
            Command::EnablePayoutDevice => Some(Self::EnablePayoutDevice),
            Command::PayoutByDenomination | Command::FloatAmount | Command::PayoutAmount => {
                Some(Self::Payout)
            }
            Command::FloatByDenomination => Some(Self::Float),
            Command::SetValueReportingType
            | Command::GetDenominationRoute
            | Command::SetDenominationRoute => Some(Self::Routing),
            Command::StackNote | Command::PayoutNote => Some(Self::NoteFloat),
            Command::GetNotePositions => Some(Self::NotePositions),
            _ => None,
        }
    }

    fn table(self) -> &'static [(u8, RejectReason)] {
        use RejectReason::*;

        match self {
            Self::EnablePayoutDevice => &[
                (1, NoDeviceConnected),
                (2, InvalidCurrency),
                (3, DeviceBusy),
                (4, EmptyOnly),
                (5, DeviceError),
            ],
            Self::Payout | Self::Float => &[
                (1, NotEnoughValue),
                (2, CannotPayExactAmount),
                (3, DeviceBusy),
                (4, DeviceDisabled),
            ],
            Self::Routing => &[
                (1, NoPayoutConnected),
                (2, InvalidCurrency),
                (3, PayoutDeviceError),
            ],
            Self::NoteFloat => &[
                (1, NoteFloatNotConnected),
                (2, NoteFloatEmpty),
                (3, NoteFloatBusy),
                (4, NoteFloatDisabled),
            ],
            Self::NotePositions => &[(1, InvalidCurrency)],
        }
    }

    /// Look up the reason byte that follows a "cannot be processed" marker
    pub fn reason(self, code: u8) -> Option<RejectReason> {
        self.table()
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, r)| *r)
    }
}

/// Why the device could not process a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    NoDeviceConnected,
    InvalidCurrency,
    DeviceBusy,
    EmptyOnly,
    DeviceError,
    NotEnoughValue,
    CannotPayExactAmount,
    DeviceDisabled,
    NoPayoutConnected,
    PayoutDeviceError,
    NoteFloatNotConnected,
    NoteFloatEmpty,
    NoteFloatBusy,
    NoteFloatDisabled,
}

impl RejectReason {
    pub fn message(self) -> &'static str {
        match self {
            Self::NoDeviceConnected => "No device connected",
            Self::InvalidCurrency => "Invalid currency detected",
            Self::DeviceBusy => "Device busy",
            Self::EmptyOnly => "Empty only (note float only)",
            Self::DeviceError => "Device error",
            Self::NotEnoughValue => "Not enough value in smart payout",
            Self::CannotPayExactAmount => "Cannot pay exact amount",
            Self::DeviceDisabled => "Device disabled",
            Self::NoPayoutConnected => "No payout connected",
            Self::PayoutDeviceError => "Payout device error",
            Self::NoteFloatNotConnected => "Note float unit not connected",
            Self::NoteFloatEmpty => "Note float empty",
            Self::NoteFloatBusy => "Note float busy",
            Self::NoteFloatDisabled => "Note float disabled",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Status and reason derived from a reply payload
pub fn classify(command: Command, data: &[u8]) -> (ResponseStatus, Option<RejectReason>) {
    let Some(&marker) = data.first() else {
        return (ResponseStatus::Unknown, None);
    };

    let Ok(code) = ResponseCode::try_from(marker) else {
        return (ResponseStatus::Unknown, None);
    };

    let reason = match code {
        ResponseCode::CannotBeProcessed => ReasonCategory::for_command(command)
            .zip(data.get(1).copied())
            .and_then(|(category, byte)| category.reason(byte)),
        _ => None,
    };

    (ResponseStatus::from(code), reason)
}

/// Result of one command exchange
///
/// Always produced, even when the link failed; `status` says what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub command: Command,

    /// Reply payload (plain text), status marker first
    pub data: Bytes,

    /// Hex rendering of the command payload as sent
    pub request_hex: String,

    /// Hex rendering of the reply payload as received
    pub response_hex: String,

    pub status: ResponseStatus,

    /// Reason byte following a "cannot be processed" marker
    pub error_code: Option<u8>,

    pub reason: Option<RejectReason>,

    /// Free-form detail for local failures
    pub message: Option<String>,
}

impl Response {
    /// Build from a received reply payload
    pub fn from_reply(command: Command, request: &[u8], data: Bytes) -> Self {
        let (status, reason) = classify(command, &data);
        let error_code = match status {
            ResponseStatus::CannotBeProcessed => data.get(1).copied(),
            _ => None,
        };

        Self {
            command,
            request_hex: hex::encode_upper(request),
            response_hex: hex::encode_upper(&data),
            data,
            status,
            error_code,
            reason,
            message: None,
        }
    }

    /// Response for an exchange that never produced a usable reply
    pub fn failed(
        command: Command,
        request: &[u8],
        status: ResponseStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            command,
            data: Bytes::new(),
            request_hex: hex::encode_upper(request),
            response_hex: String::new(),
            status,
            error_code: None,
            reason: None,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Reply payload after the status marker
    pub fn body(&self) -> &[u8] {
        self.data.get(1..).unwrap_or_default()
    }

    /// Human-readable description of the outcome
    pub fn describe(&self) -> String {
        match (self.reason, &self.message) {
            (Some(reason), _) => format!("{}: {}", self.status, reason),
            (None, Some(message)) => format!("{}: {}", self.status, message),
            (None, None) => self.status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_ok() {
        assert_eq!(classify(Command::Sync, &[0xF0]), (ResponseStatus::Ok, None));
    }

    #[test]
    fn test_classify_markers() {
        let cases = [
            (0xF2, ResponseStatus::CommandNotKnown),
            (0xF3, ResponseStatus::WrongParameterCount),
            (0xF4, ResponseStatus::ParameterOutOfRange),
            (0xF6, ResponseStatus::SoftwareError),
            (0xF8, ResponseStatus::Fail),
            (0xFA, ResponseStatus::KeyNotSet),
            (0x42, ResponseStatus::Unknown),
        ];
        for (marker, status) in cases {
            assert_eq!(classify(Command::Poll, &[marker]).0, status);
        }
        assert_eq!(classify(Command::Poll, &[]).0, ResponseStatus::Unknown);
    }

    #[test]
    fn test_only_ok_marker_is_success() {
        let ok: Vec<u8> = (0..=u8::MAX)
            .filter(|&marker| classify(Command::Poll, &[marker]).0.is_ok())
            .collect();
        assert_eq!(ok, vec![0xF0]);
        assert!(!ResponseStatus::Unknown.is_ok());
        assert!(!ResponseStatus::SystemError.is_ok());
    }

    #[test]
    fn test_reason_depends_on_command() {
        assert_eq!(
            classify(Command::EnablePayoutDevice, &[0xF5, 4]),
            (ResponseStatus::CannotBeProcessed, Some(RejectReason::EmptyOnly))
        );
        assert_eq!(
            classify(Command::PayoutAmount, &[0xF5, 2]).1,
            Some(RejectReason::CannotPayExactAmount)
        );
        assert_eq!(
            classify(Command::SetDenominationRoute, &[0xF5, 1]).1,
            Some(RejectReason::NoPayoutConnected)
        );
        assert_eq!(
            classify(Command::StackNote, &[0xF5, 2]).1,
            Some(RejectReason::NoteFloatEmpty)
        );
        assert_eq!(
            classify(Command::GetNotePositions, &[0xF5, 1]).1,
            Some(RejectReason::InvalidCurrency)
        );
    }

    #[test]
    fn test_reason_unknown_or_missing() {
        assert_eq!(
            classify(Command::Sync, &[0xF5, 1]),
            (ResponseStatus::CannotBeProcessed, None)
        );
        assert_eq!(classify(Command::PayoutAmount, &[0xF5]).1, None);
        assert_eq!(classify(Command::PayoutAmount, &[0xF5, 9]).1, None);
    }

    #[test]
    fn test_response_from_reply() {
        let response = Response::from_reply(
            Command::PayoutAmount,
            &[0x33, 0x01],
            Bytes::from_static(&[0xF5, 0x03]),
        );

        assert_eq!(response.status, ResponseStatus::CannotBeProcessed);
        assert_eq!(response.error_code, Some(3));
        assert_eq!(response.reason, Some(RejectReason::DeviceBusy));
        assert_eq!(response.request_hex, "3301");
        assert_eq!(response.response_hex, "F503");
        assert_eq!(response.body(), &[0x03]);
        assert_eq!(response.describe(), "CANNOT_BE_PROCESSED: Device busy");
    }

    #[test]
    fn test_failed_response() {
        let response = Response::failed(
            Command::Sync,
            &[0x11],
            ResponseStatus::PortTimeout,
            "no reply",
        );
        assert!(!response.is_ok());
        assert!(response.status.is_transport_error());
        assert!(response.body().is_empty());
    }
}
