//! Shared error types for the value/history/range primitives.
//!
//! Follows the no-external-crate convention used throughout this codebase:
//! a plain enum, a hand-written `Display`, and an `impl std::error::Error`.
//! No `thiserror`, no `anyhow` — see DESIGN.md for why.

use std::fmt;

/// Errors raised by the data-model primitives themselves (history resize,
/// range bookkeeping). Caller-visible sample/property errors live in
/// `mapper_runtime::error` since they also need mode/connection context.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// An array write's length did not match the expected vector length.
    LengthMismatch { expected: usize, actual: usize },
    /// A `history_size` or `sample_size` of zero was requested.
    ZeroSizedHistory,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::LengthMismatch { expected, actual } => {
                write!(f, "length mismatch: expected {expected}, got {actual}")
            }
            CoreError::ZeroSizedHistory => write!(f, "history size and sample size must be >= 1"),
        }
    }
}

impl std::error::Error for CoreError {}
