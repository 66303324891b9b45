//! High-level error types

use ssprust_core::{Command, RejectReason, Response, ResponseStatus};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] ssprust_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] ssprust_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] ssprust_types::Error),

    #[error("Device not connected")]
    NotConnected,

    #[error("{command} rejected: {status}{}", reason_suffix(reason))]
    Rejected {
        command: Command,
        status: ResponseStatus,
        reason: Option<RejectReason>,
    },

    #[error("Key exchange failed at {step}: {status}")]
    KeyExchange {
        step: Command,
        status: ResponseStatus,
    },
}

impl Error {
    /// Device asked for a new key
    pub fn requires_renegotiation(&self) -> bool {
        match self {
            Self::Rejected { status, .. } => {
                matches!(status, ResponseStatus::KeyNotSet | ResponseStatus::DecryptFail)
            }
            Self::Core(e) => e.requires_renegotiation(),
            _ => false,
        }
    }
}

/// Turn a non-OK response into [`Error::Rejected`]
pub trait ResponseExt: Sized {
    fn into_result(self) -> Result<Response>;
}

impl ResponseExt for Response {
    fn into_result(self) -> Result<Response> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(Error::Rejected {
                command: self.command,
                status: self.status,
                reason: self.reason,
            })
        }
    }
}

fn reason_suffix(reason: &Option<RejectReason>) -> String {
    reason.map(|r| format!(" ({})", r)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rejected_display() {
        let err = Error::Rejected {
            command: Command::PayoutAmount,
            status: ResponseStatus::CannotBeProcessed,
            reason: Some(RejectReason::NotEnoughValue),
        };
        let expected = format!(
            "{} rejected: {} ({})",
            Command::PayoutAmount,
            ResponseStatus::CannotBeProcessed,
            RejectReason::NotEnoughValue
        );
        assert_eq!(err.to_string(), expected);

        let err = Error::Rejected {
            command: Command::Sync,
            status: ResponseStatus::Fail,
            reason: None,
        };
        let expected = format!("{} rejected: {}", Command::Sync, ResponseStatus::Fail);
        assert_eq!(err.to_string(), expected);
        assert!(!err.requires_renegotiation());
    }
}
