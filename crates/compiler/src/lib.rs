//! Expression compiler: lexer, precedence-climbing parser, and a
//! type/vector-length checker with constant folding, producing a
//! reverse-Polish token sequence the runtime evaluator walks.
//!
//! ```
//! use mapper_compiler::compile;
//! use mapper_core::DataType;
//!
//! let compiled = compile("y = x * 2", DataType::Float64, DataType::Float64, 1, 1).unwrap();
//! assert_eq!(compiled.output_history_size, 1);
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
mod lower;
pub mod parser;
pub mod token;

pub use error::CompileError;
use mapper_core::DataType;
pub use token::Token;

/// The result of a successful compile: a reverse-Polish token sequence
/// plus the history depths the connection must allocate before this
/// expression can be evaluated.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    pub tokens: Vec<Token>,
    pub source: String,
    pub input_type: DataType,
    pub output_type: DataType,
    pub input_vector_size: usize,
    pub output_vector_size: usize,
    pub max_vector_length: usize,
    pub input_history_size: usize,
    pub output_history_size: usize,
}

/// Compile `source` against a connection with the given endpoint types
/// and vector lengths. On success, `input_history_size`/
/// `output_history_size` tell the caller how deep to (re)allocate the
/// connection's histories before evaluating the result.
pub fn compile(
    source: &str,
    input_type: DataType,
    output_type: DataType,
    input_vector_size: usize,
    output_vector_size: usize,
) -> Result<CompiledExpression, CompileError> {
    let program = parser::parse(source)?;
    let lowered = lower::lower_program(&program, input_type, output_type, input_vector_size, output_vector_size)?;
    tracing::debug!(
        source,
        tokens = lowered.tokens.len(),
        input_history_size = lowered.input_history_size,
        output_history_size = lowered.output_history_size,
        "compiled expression"
    );
    Ok(CompiledExpression {
        tokens: lowered.tokens,
        source: source.to_string(),
        input_type,
        output_type,
        input_vector_size,
        output_vector_size,
        max_vector_length: lowered.max_vector_length,
        input_history_size: lowered.input_history_size,
        output_history_size: lowered.output_history_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_simple_scale() {
        let compiled = compile("y = x * 2.0", DataType::Float64, DataType::Float64, 1, 1).unwrap();
        assert_eq!(compiled.input_history_size, 1);
        assert_eq!(compiled.output_history_size, 1);
    }

    #[test]
    fn compile_failure_leaves_no_partial_result() {
        let err = compile("y = (", DataType::Float64, DataType::Float64, 1, 1).unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }

    #[test]
    fn history_depth_grows_with_deepest_reference() {
        let compiled = compile("y = x{-10} - x", DataType::Float64, DataType::Float64, 1, 1).unwrap();
        assert_eq!(compiled.input_history_size, 11);
    }
}
