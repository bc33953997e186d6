//! Value layer errors.
//!
//! All variants implement [`ErrorCode`] with the `VALUE_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`ValueError::TypeMismatch`] | `VALUE_TYPE_MISMATCH` | No |
//! | [`ValueError::Path`] | `VALUE_PATH` | No |
//! | [`ValueError::Parse`] | `VALUE_PARSE` | No |

use crate::value::ValueType;
use weft_types::ErrorCode;

/// Error produced by [`Value`](crate::Value) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// A typed getter was called on a non-matching variant with no
    /// lossless widening available.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The variant the caller asked for.
        expected: ValueType,
        /// The variant actually stored.
        found: ValueType,
    },

    /// A dotted path could not be resolved or written.
    #[error("path error at '{path}': {reason}")]
    Path {
        /// The offending path (up to and including the failing segment).
        path: String,
        /// Why the segment failed.
        reason: String,
    },

    /// JSON text could not be parsed into a value tree.
    #[error("parse error: {0}")]
    Parse(String),
}

impl ValueError {
    pub(crate) fn path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for ValueError {
    fn code(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } => "VALUE_TYPE_MISMATCH",
            Self::Path { .. } => "VALUE_PATH",
            Self::Parse(_) => "VALUE_PARSE",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Retrying the same call on the same value cannot succeed.
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
                ValueError::TypeMismatch {
                    expected: ValueType::Int64,
                    found: ValueType::String,
                },
                ValueError::path("a.b", "not a container"),
                ValueError::Parse("x".into()),
            ],
            "VALUE_",
        );
    }

    #[test]
    fn display_mentions_the_path() {
        let err = ValueError::path("a.b.c", "index out of range");
        assert!(err.to_string().contains("a.b.c"));
        assert!(err.to_string().contains("index out of range"));
    }
}
