//! Unified error interface.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so that
//! callers can branch on stable machine-readable codes and decide whether
//! a retry is worthwhile, without matching on concrete error types from
//! other crates.
//!
//! # Example
//!
//! ```
//! use weft_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum RouteError {
//!     NoDestination,
//!     InboxFull,
//! }
//!
//! impl ErrorCode for RouteError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::NoDestination => "ROUTE_NO_DESTINATION",
//!             Self::InboxFull => "ROUTE_INBOX_FULL",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::InboxFull)
//!     }
//! }
//!
//! assert_eq!(RouteError::InboxFull.code(), "ROUTE_INBOX_FULL");
//! assert!(RouteError::InboxFull.is_recoverable());
//! ```

/// Stable machine-readable error codes.
///
/// # Code Format
///
/// - UPPER_SNAKE_CASE, prefixed with the owning domain (`VALUE_`,
///   `MSG_`, `ENGINE_`, …)
/// - Stable once published; renaming a code is a breaking change
///
/// # Recoverability
///
/// An error is recoverable when retrying the same operation may succeed
/// (timeouts, full queues). Malformed input, lifecycle misuse and missing
/// destinations are not recoverable: the caller has to change something
/// first.
pub trait ErrorCode {
    /// Returns the machine-readable code for this error.
    fn code(&self) -> &'static str;

    /// Returns whether retrying the operation may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error's code follows the workspace conventions.
///
/// Checks that the code is non-empty, UPPER_SNAKE_CASE, and carries the
/// expected domain prefix.
///
/// # Panics
///
/// Panics with a descriptive message if any check fails. Intended for use
/// inside tests.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "error code '{code}' must start with prefix '{expected_prefix}'"
    );
    assert!(
        is_upper_snake_case(code),
        "error code '{code}' must be UPPER_SNAKE_CASE"
    );
}

/// Asserts conventions for every variant of an error enum at once.
pub fn assert_error_codes<E: ErrorCode>(errors: &[E], expected_prefix: &str) {
    for err in errors {
        assert_error_code(err, expected_prefix);
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    if s.is_empty() || s.starts_with('_') || s.ends_with('_') || s.contains("__") {
        return false;
    }
    s.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl ErrorCode for TestError {
        fn code(&self) -> &'static str {
            match self {
                Self::Transient => "TEST_TRANSIENT",
                Self::Permanent => "TEST_PERMANENT",
            }
        }

        fn is_recoverable(&self) -> bool {
            matches!(self, Self::Transient)
        }
    }

    #[test]
    fn codes_and_recoverability() {
        assert_eq!(TestError::Transient.code(), "TEST_TRANSIENT");
        assert!(TestError::Transient.is_recoverable());
        assert!(!TestError::Permanent.is_recoverable());
    }

    #[test]
    fn assert_helpers_accept_valid_codes() {
        assert_error_codes(&[TestError::Transient, TestError::Permanent], "TEST_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn assert_helper_rejects_wrong_prefix() {
        assert_error_code(&TestError::Transient, "OTHER_");
    }

    #[test]
    fn upper_snake_case_rules() {
        assert!(is_upper_snake_case("ENGINE_TIMEOUT"));
        assert!(is_upper_snake_case("A_B_2"));
        assert!(!is_upper_snake_case(""));
        assert!(!is_upper_snake_case("engine_timeout"));
        assert!(!is_upper_snake_case("_ENGINE"));
        assert!(!is_upper_snake_case("ENGINE__TIMEOUT"));
    }
}
