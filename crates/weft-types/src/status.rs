//! Result status codes.

use serde::{Deserialize, Serialize};

/// Status carried by a command result.
///
/// `Ok` is zero on the wire; every other variant conveys a failure class.
/// The numeric values are part of the wire contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StatusCode {
    /// The command succeeded.
    Ok,
    /// Unclassified failure.
    Generic,
    /// The command carried an invalid argument.
    InvalidArgument,
    /// The referenced graph is malformed or unknown.
    InvalidGraph,
    /// The destination extension does not exist.
    ExtensionNotFound,
    /// The command's deadline elapsed before a final result arrived.
    Timeout,
    /// The command was cancelled, typically by `stop_graph`.
    Cancelled,
}

impl StatusCode {
    /// Returns `true` for [`Ok`](Self::Ok).
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// The wire value of this code.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::Generic => 1,
            Self::InvalidArgument => 2,
            Self::InvalidGraph => 3,
            Self::ExtensionNotFound => 4,
            Self::Timeout => 5,
            Self::Cancelled => 6,
        }
    }
}

impl From<StatusCode> for u8 {
    fn from(code: StatusCode) -> Self {
        code.as_u8()
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Ok,
            1 => Self::Generic,
            2 => Self::InvalidArgument,
            3 => Self::InvalidGraph,
            4 => Self::ExtensionNotFound,
            5 => Self::Timeout,
            6 => Self::Cancelled,
            other => return Err(format!("unknown status code: {other}")),
        })
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::Generic => "generic",
            Self::InvalidArgument => "invalid_argument",
            Self::InvalidGraph => "invalid_graph",
            Self::ExtensionNotFound => "extension_not_found",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_is_zero_on_the_wire() {
        assert_eq!(StatusCode::Ok.as_u8(), 0);
        assert!(StatusCode::Ok.is_ok());
        assert!(!StatusCode::Timeout.is_ok());
    }

    #[test]
    fn numeric_round_trip() {
        for code in [
            StatusCode::Ok,
            StatusCode::Generic,
            StatusCode::InvalidArgument,
            StatusCode::InvalidGraph,
            StatusCode::ExtensionNotFound,
            StatusCode::Timeout,
            StatusCode::Cancelled,
        ] {
            assert_eq!(StatusCode::try_from(code.as_u8()), Ok(code));
        }
        assert!(StatusCode::try_from(200).is_err());
    }

    #[test]
    fn serde_uses_numeric_form() {
        let json = serde_json::to_string(&StatusCode::Timeout).unwrap();
        assert_eq!(json, "5");
        let back: StatusCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StatusCode::Timeout);
    }
}
