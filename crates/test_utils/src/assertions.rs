//! Assertion Helpers

use core_kernel::{ErrorCode, ServiceError};

/// Asserts the error is a client-side rejection aimed at `target`.
pub fn assert_invalid(err: &ServiceError, target: &str) {
    assert_eq!(err.code, ErrorCode::InvalidRequest, "unexpected code: {err:?}");
    assert_eq!(err.target.as_deref(), Some(target), "unexpected target: {err:?}");
}

/// Asserts the error carries the given code.
pub fn assert_code(err: &ServiceError, code: ErrorCode) {
    assert_eq!(err.code, code, "unexpected code: {err:?}");
}
