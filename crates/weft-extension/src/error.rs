//! Env layer errors.
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`EnvError::LifecycleMisuse`] | `ENV_LIFECYCLE_MISUSE` | No |
//! | [`EnvError::Closed`] | `ENV_CLOSED` | No |
//! | [`EnvError::Property`] | `ENV_PROPERTY` | No |
//! | [`EnvError::NotACmd`] | `ENV_NOT_A_CMD` | No |

use weft_types::ErrorCode;
use weft_value::ValueError;

/// Error produced by [`Env`](crate::Env) operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnvError {
    /// An `xxx_done` acknowledgement was repeated, or an operation was
    /// attempted in a state that forbids it.
    #[error("lifecycle misuse: {0}")]
    LifecycleMisuse(String),

    /// The engine side of this env has gone away.
    #[error("env is closed: {0}")]
    Closed(String),

    /// A property path operation failed.
    #[error("property error: {0}")]
    Property(#[from] ValueError),

    /// A command-only operation was invoked with a non-command message.
    #[error("not a command: {0}")]
    NotACmd(String),
}

impl ErrorCode for EnvError {
    fn code(&self) -> &'static str {
        match self {
            Self::LifecycleMisuse(_) => "ENV_LIFECYCLE_MISUSE",
            Self::Closed(_) => "ENV_CLOSED",
            Self::Property(_) => "ENV_PROPERTY",
            Self::NotACmd(_) => "ENV_NOT_A_CMD",
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
                EnvError::LifecycleMisuse("x".into()),
                EnvError::Closed("x".into()),
                EnvError::Property(ValueError::Parse("x".into())),
                EnvError::NotACmd("x".into()),
            ],
            "ENV_",
        );
    }

    #[test]
    fn value_errors_convert() {
        let err: EnvError = ValueError::Parse("bad".into()).into();
        assert!(matches!(err, EnvError::Property(_)));
    }
}
