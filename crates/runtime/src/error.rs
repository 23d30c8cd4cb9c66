//! Caller-visible error types for the connection runtime.
//!
//! `mapper_compiler::CompileError` already covers everything that can go
//! wrong while parsing/lowering an expression; the types here cover the
//! other two boundaries described in the spec's error-handling section:
//! a caller writing a sample or property message that doesn't match the
//! connection's declared shape, and the top-level `Result` chain the CLI
//! walks when driving a scenario.

use std::fmt;

/// Raised against a caller at the signal-update or property-message
/// boundary. None of these ever reach a connection's history: the
/// offending update is discarded and the error is reported upward.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyError {
    /// A floating-point sample was written into an `i32`-typed signal.
    /// Narrowing integers into wider floats is always permitted; the
    /// reverse direction is not.
    Truncation { signal_type: mapper_core::DataType, written_type: mapper_core::DataType },
    /// An array write's length didn't match the signal's declared length.
    LengthMismatch { expected: usize, actual: usize },
    /// A `@srcMin`/`@srcMax`/`@destMin`/`@destMax` property carried a
    /// vector of the wrong length for its signal.
    RangeIllFormed { expected: usize, actual: usize },
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyError::Truncation { signal_type, written_type } => {
                write!(f, "cannot write {written_type} sample into {signal_type}-typed signal without truncation")
            }
            ApplyError::LengthMismatch { expected, actual } => {
                write!(f, "array write length mismatch: expected {expected}, got {actual}")
            }
            ApplyError::RangeIllFormed { expected, actual } => {
                write!(f, "range component length mismatch: expected {expected}, got {actual}")
            }
        }
    }
}

impl std::error::Error for ApplyError {}

impl From<mapper_core::CoreError> for ApplyError {
    fn from(e: mapper_core::CoreError) -> Self {
        match e {
            mapper_core::CoreError::LengthMismatch { expected, actual } => {
                ApplyError::LengthMismatch { expected, actual }
            }
            mapper_core::CoreError::ZeroSizedHistory => {
                ApplyError::LengthMismatch { expected: 1, actual: 0 }
            }
        }
    }
}

/// Top-level error for the `mapperd` CLI's scenario runner: wraps a
/// compile error or an apply error with the context of which connection
/// or sample it happened on.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleError {
    Compile(mapper_compiler::CompileError),
    Apply(ApplyError),
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::Compile(e) => write!(f, "expression compile error: {e}"),
            SampleError::Apply(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SampleError {}

impl From<mapper_compiler::CompileError> for SampleError {
    fn from(e: mapper_compiler::CompileError) -> Self {
        SampleError::Compile(e)
    }
}

impl From<ApplyError> for SampleError {
    fn from(e: ApplyError) -> Self {
        SampleError::Apply(e)
    }
}
