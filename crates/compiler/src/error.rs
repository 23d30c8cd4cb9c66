//! Expression compile error type.

use std::fmt;

/// Error produced by the lexer or parser. Compilation is all-or-nothing:
/// any of these aborts expression replacement and the connection keeps its
/// previously compiled expression, if it had one.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// An unrecognized character or malformed numeric literal.
    Lex { span: String },
    /// The token stream doesn't form a valid expression (unbalanced
    /// parens, missing operand, stray comma, ...).
    Syntax { detail: String },
    /// Reference to a name that isn't a variable, function, or
    /// vector-function.
    UnknownIdentifier { name: String },
    /// Two operands of an operator or function call couldn't be unified
    /// to a common element type and vector length.
    TypeMismatch { detail: String },
    /// A vector literal, vectorizer, or assignment used inconsistent
    /// lengths.
    LengthMismatch { expected: usize, actual: usize },
    /// A history index, vector-literal element count, or vector width was
    /// outside its allowed range.
    RangeViolation { detail: String },
    /// The expression's evaluation stack would exceed the fixed depth
    /// bound of 128 entries.
    StackOverflow,
    /// The assignment target isn't `y`, `y[i]`, `y[i:j]`, or `y{k}`.
    InvalidAssignmentTarget { detail: String },
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex { span } => write!(f, "lex error near '{span}'"),
            CompileError::Syntax { detail } => write!(f, "syntax error: {detail}"),
            CompileError::UnknownIdentifier { name } => {
                write!(f, "unknown identifier '{name}'")
            }
            CompileError::TypeMismatch { detail } => write!(f, "type mismatch: {detail}"),
            CompileError::LengthMismatch { expected, actual } => {
                write!(f, "vector length mismatch: expected {expected}, got {actual}")
            }
            CompileError::RangeViolation { detail } => write!(f, "range violation: {detail}"),
            CompileError::StackOverflow => {
                write!(f, "expression exceeds the maximum evaluation stack depth (128)")
            }
            CompileError::InvalidAssignmentTarget { detail } => {
                write!(f, "invalid assignment target: {detail}")
            }
        }
    }
}

impl std::error::Error for CompileError {}
