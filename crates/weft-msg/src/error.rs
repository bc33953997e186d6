//! Message layer errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`MsgError::MissingEnvelope`] | `MSG_MISSING_ENVELOPE` | No |
//! | [`MsgError::MissingField`] | `MSG_MISSING_FIELD` | No |
//! | [`MsgError::Field`] | `MSG_FIELD` | No |
//! | [`MsgError::UnknownType`] | `MSG_UNKNOWN_TYPE` | No |
//! | [`MsgError::Parse`] | `MSG_PARSE` | No |

use weft_types::ErrorCode;

/// Error produced by message construction, field iteration or envelope
/// conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MsgError {
    /// Envelope JSON is missing the reserved header object.
    #[error("missing envelope header object")]
    MissingEnvelope,

    /// A header field required for this message type is absent.
    #[error("missing field '{0}'")]
    MissingField(String),

    /// A header field holds a value of the wrong shape.
    #[error("field '{name}': {reason}")]
    Field {
        /// Field name as visited by the iterator / envelope.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The envelope names a message type this runtime does not know.
    #[error("unknown message type '{0}'")]
    UnknownType(String),

    /// Envelope text is not valid JSON.
    #[error("parse error: {0}")]
    Parse(String),
}

impl MsgError {
    pub(crate) fn field(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Field {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for MsgError {
    fn code(&self) -> &'static str {
        match self {
            Self::MissingEnvelope => "MSG_MISSING_ENVELOPE",
            Self::MissingField(_) => "MSG_MISSING_FIELD",
            Self::Field { .. } => "MSG_FIELD",
            Self::UnknownType(_) => "MSG_UNKNOWN_TYPE",
            Self::Parse(_) => "MSG_PARSE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::assert_error_codes;

    #[test]
    fn all_error_codes_valid() {
        assert_error_codes(
            &[
                MsgError::MissingEnvelope,
                MsgError::MissingField("name".into()),
                MsgError::field("src", "not an object"),
                MsgError::UnknownType("blob".into()),
                MsgError::Parse("x".into()),
            ],
            "MSG_",
        );
    }
}
