//! Stack-machine evaluator: walks a compiled reverse-Polish token sequence
//! against an input (source) and output (destination) history.
//!
//! Per-operator and per-function arithmetic always goes through
//! `mapper_core::ops`, the same table the compiler's constant folder uses,
//! so a folded expression and an evaluated one can never disagree.

use mapper_compiler::token::{Token, TokenKind, Var};
use mapper_core::{ops, DataType, History, Scalar};

/// What happened after walking the token sequence once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalOutcome {
    /// The destination's "now" slot was written; the caller should emit it.
    Updated,
    /// A bare `cond ? then` (no else) found a falsy lane, or the program
    /// held nothing but one-shot initializers; nothing should be emitted
    /// and the destination's position is left exactly as it was before
    /// this call.
    Suppressed,
}

/// Evaluate `tokens[start..]` once.
///
/// `typestring`, if given, receives the destination type actually written
/// to each lane touched by the "now" assignment (lanes it doesn't cover are
/// left untouched by this call).
///
/// Returns the outcome and the `start` index to use on the *next* call: a
/// one-shot history initializer (an `Assignment` token with `history_index
/// != 0`, encountered before any normal assignment) advances it so later
/// calls skip straight to the first normal assignment.
pub fn evaluate(
    tokens: &[Token],
    start: usize,
    input: &History,
    output: &mut History,
    mut typestring: Option<&mut [DataType]>,
) -> (EvalOutcome, usize) {
    let mut stack: Vec<Vec<Scalar>> = Vec::new();
    let mut advanced = false;
    let mut seen_normal_assignment = false;
    let mut new_start = start;

    for (index, tok) in tokens.iter().enumerate().skip(start) {
        match &tok.kind {
            TokenKind::Const(value) => {
                stack.push(vec![*value; tok.vector_length]);
            }

            TokenKind::Variable { var, start: lane_start, history_index } => {
                let k = match var {
                    Var::X => -(*history_index) as i64,
                    Var::Y => (-(*history_index) - 1) as i64,
                };
                let sample = match var {
                    Var::X => input.read(k),
                    Var::Y => output.read(k),
                };
                let lane_start = *lane_start;
                stack.push(sample[lane_start..lane_start + tok.vector_length].to_vec());
            }

            TokenKind::Operator(op) if op.is_conditional() => {
                if op.arity() == 3 {
                    let third = stack.pop().expect("stack underflow: IFTHENELSE third operand");
                    let second = stack.pop().expect("stack underflow: IFTHENELSE second operand");
                    let cond = stack.pop().expect("stack underflow: IFTHENELSE condition");
                    let mut result = Vec::with_capacity(tok.vector_length);
                    for lane in 0..tok.vector_length {
                        let c = pick(&cond, lane);
                        let t = pick(&second, lane);
                        let e = pick(&third, lane);
                        match ops::apply_conditional(*op, c, t, Some(e)) {
                            ops::Conditional::Value(v) => result.push(v),
                            ops::Conditional::Suppressed => unreachable!("IFTHENELSE never suppresses"),
                        }
                    }
                    stack.push(result);
                } else {
                    let second = stack.pop().expect("stack underflow: conditional second operand");
                    let cond = stack.pop().expect("stack underflow: conditional condition");
                    let mut result = Vec::with_capacity(tok.vector_length);
                    let mut suppressed = false;
                    for lane in 0..tok.vector_length {
                        let c = pick(&cond, lane);
                        let s = pick(&second, lane);
                        match ops::apply_conditional(*op, c, s, None) {
                            ops::Conditional::Value(v) => result.push(v),
                            ops::Conditional::Suppressed => {
                                suppressed = true;
                                break;
                            }
                        }
                    }
                    if suppressed {
                        if advanced {
                            output.rollback();
                        }
                        return (EvalOutcome::Suppressed, new_start);
                    }
                    stack.push(result);
                }
            }

            TokenKind::Operator(op) if op.arity() == 1 => {
                let a = stack.pop().expect("stack underflow: unary operand");
                let result = a.iter().map(|v| ops::apply_not(tok.data_type, *v)).collect();
                stack.push(result);
            }

            TokenKind::Operator(op) => {
                let b = stack.pop().expect("stack underflow: binary rhs");
                let a = stack.pop().expect("stack underflow: binary lhs");
                let mut result = Vec::with_capacity(tok.vector_length);
                for lane in 0..tok.vector_length {
                    result.push(ops::apply_binary(*op, tok.data_type, pick(&a, lane), pick(&b, lane)));
                }
                stack.push(result);
            }

            TokenKind::Function(func) => {
                let arity = func.arity();
                let mut args: Vec<Vec<Scalar>> = (0..arity)
                    .map(|_| stack.pop().expect("stack underflow: function argument"))
                    .collect();
                args.reverse();
                let width = tok.vector_length.max(1);
                let mut result = Vec::with_capacity(width);
                for lane in 0..width {
                    let lane_args: Vec<Scalar> = args.iter().map(|a| pick(a, lane)).collect();
                    result.push(ops::call_function(*func, tok.data_type, &lane_args));
                }
                stack.push(result);
            }

            TokenKind::VectorFunction(vfunc) => {
                let a = stack.pop().expect("stack underflow: vector-function operand");
                let reduced = match vfunc {
                    mapper_core::VFuncId::All => a.iter().all(|v| v.is_truthy()),
                    mapper_core::VFuncId::Any => a.iter().any(|v| v.is_truthy()),
                };
                stack.push(vec![Scalar::Int32(i32::from(reduced)).cast_to(tok.data_type)]);
            }

            TokenKind::Vectorize { count } => {
                let mut parts: Vec<Vec<Scalar>> = (0..*count)
                    .map(|_| stack.pop().expect("stack underflow: vectorize element"))
                    .collect();
                parts.reverse();
                stack.push(parts.into_iter().flatten().collect());
            }

            TokenKind::Assignment { start: lane_start, history_index } => {
                let values = stack.pop().expect("stack underflow: assignment rhs");
                let lane_start = *lane_start;
                if *history_index == 0 {
                    if !advanced {
                        output.advance();
                        advanced = true;
                    }
                    for (i, v) in values.iter().enumerate() {
                        output.write_lane(lane_start + i, *v);
                        if let Some(ts) = typestring.as_deref_mut() {
                            ts[lane_start + i] = tok.data_type;
                        }
                    }
                    seen_normal_assignment = true;
                } else {
                    let k = (-(*history_index) - 1) as i64;
                    for (i, v) in values.iter().enumerate() {
                        output.write_lane_at(k, lane_start + i, *v);
                    }
                    if !seen_normal_assignment {
                        new_start = index + 1;
                    }
                }
            }
        }
    }

    if advanced {
        (EvalOutcome::Updated, new_start)
    } else {
        // The program consisted entirely of one-shot history initializers
        // (or was empty): nothing to emit on this call.
        (EvalOutcome::Suppressed, new_start)
    }
}

/// Broadcast a width-1 stack entry across every lane; index a wider one.
fn pick(entry: &[Scalar], lane: usize) -> Scalar {
    if entry.len() == 1 {
        entry[0]
    } else {
        entry[lane]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapper_core::Timestamp;

    fn compile(src: &str, ty: DataType, len: usize) -> mapper_compiler::CompiledExpression {
        mapper_compiler::compile(src, ty, ty, len, len).unwrap()
    }

    #[test]
    fn bypass_style_scale_updates_every_call() {
        let compiled = compile("y = x * 2", DataType::Float64, 1);
        let mut input = History::new(compiled.input_history_size, 1, DataType::Float64).unwrap();
        let mut output = History::new(compiled.output_history_size, 1, DataType::Float64).unwrap();
        let mut start = 0;

        for (i, x) in [1.0, 2.0, 3.0].into_iter().enumerate() {
            input.push(&[Scalar::Float64(x)], Timestamp(i as f64)).unwrap();
            let (outcome, next_start) = evaluate(&compiled.tokens, start, &input, &mut output, None);
            start = next_start;
            assert_eq!(outcome, EvalOutcome::Updated);
        }
        assert_eq!(output.read(0), &[Scalar::Float64(6.0)]);
        assert_eq!(output.read(1), &[Scalar::Float64(4.0)]);
    }

    #[test]
    fn history_initializer_runs_once_then_is_skipped() {
        let compiled = compile("y{-1} = 0, y = x + y{-1}", DataType::Float64, 1);
        let mut input = History::new(compiled.input_history_size, 1, DataType::Float64).unwrap();
        let mut output = History::new(compiled.output_history_size, 1, DataType::Float64).unwrap();
        let mut start = 0;

        let mut results = Vec::new();
        for (i, x) in [1.0, 2.0, 3.0].into_iter().enumerate() {
            input.push(&[Scalar::Float64(x)], Timestamp(i as f64)).unwrap();
            let (outcome, next_start) = evaluate(&compiled.tokens, start, &input, &mut output, None);
            assert_eq!(outcome, EvalOutcome::Updated);
            assert!(next_start > 0, "the initializer assignment must bump start past itself");
            start = next_start;
            results.push(output.read(0)[0]);
        }
        assert_eq!(results, vec![Scalar::Float64(1.0), Scalar::Float64(3.0), Scalar::Float64(6.0)]);
    }

    #[test]
    fn conditional_without_else_suppresses_and_rolls_back_position() {
        let compiled = compile("y = x > 0 ? x", DataType::Float64, 1);
        let mut input = History::new(compiled.input_history_size, 1, DataType::Float64).unwrap();
        let mut output = History::new(compiled.output_history_size, 1, DataType::Float64).unwrap();

        input.push(&[Scalar::Float64(-5.0)], Timestamp(0.0)).unwrap();
        let position_before = output.position();
        let (outcome, _) = evaluate(&compiled.tokens, 0, &input, &mut output, None);
        assert_eq!(outcome, EvalOutcome::Suppressed);
        assert_eq!(output.position(), position_before);
    }

    #[test]
    fn multiple_lane_assignments_land_in_the_same_sample() {
        let compiled = compile("y[0] = 1, y[1] = 2", DataType::Float64, 2);
        let mut input = History::new(compiled.input_history_size, 2, DataType::Float64).unwrap();
        let mut output = History::new(compiled.output_history_size, 2, DataType::Float64).unwrap();
        input.push(&[Scalar::Float64(0.0), Scalar::Float64(0.0)], Timestamp(0.0)).unwrap();

        let (outcome, _) = evaluate(&compiled.tokens, 0, &input, &mut output, None);
        assert_eq!(outcome, EvalOutcome::Updated);
        assert_eq!(output.read(0), &[Scalar::Float64(1.0), Scalar::Float64(2.0)]);
    }

    #[test]
    fn typestring_records_the_destination_type_of_written_lanes() {
        let compiled = compile("y = x", DataType::Int32, 1);
        let mut input = History::new(compiled.input_history_size, 1, DataType::Int32).unwrap();
        let mut output = History::new(compiled.output_history_size, 1, DataType::Int32).unwrap();
        input.push(&[Scalar::Int32(1)], Timestamp(0.0)).unwrap();

        let mut types = [DataType::Float64];
        let (outcome, _) = evaluate(&compiled.tokens, 0, &input, &mut output, Some(&mut types));
        assert_eq!(outcome, EvalOutcome::Updated);
        assert_eq!(types[0], DataType::Int32);
    }
}
