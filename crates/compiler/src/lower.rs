//! Lowers a parsed [`Program`] to a reverse-Polish [`Token`] sequence,
//! performing type/vector-length inference and constant folding along the
//! way. Folding happens by construction: any subtree whose value is known
//! at compile time is represented purely by its folded [`Scalar`] and never
//! emits a token for its internal structure, so a fully constant
//! expression collapses to a single `Const` token no matter how deeply it
//! was nested in source.

use crate::ast::{self, AssignTarget, Expr, LaneSel, Program};
use crate::error::CompileError;
use crate::token::{Token, TokenKind, Var as TokenVar};
use mapper_core::ops::{self, Conditional};
use mapper_core::{DataType, FuncId, OpCode, Scalar, VFuncId};

/// Expressions may not use more than this many simultaneous evaluation
/// stack slots.
pub const MAX_STACK_DEPTH: usize = 128;

struct LowerCtx {
    input_type: DataType,
    output_type: DataType,
    input_vector_size: usize,
    output_vector_size: usize,
    max_vector_length: usize,
    min_x_history: i32,
    min_y_history: i32,
}

#[derive(Debug, Clone)]
struct NodeInfo {
    data_type: DataType,
    vector_length: usize,
    constant: Option<Vec<Scalar>>,
    depth: usize,
}

pub struct Lowered {
    pub tokens: Vec<Token>,
    pub max_vector_length: usize,
    pub input_history_size: usize,
    pub output_history_size: usize,
}

pub fn lower_program(
    program: &Program,
    input_type: DataType,
    output_type: DataType,
    input_vector_size: usize,
    output_vector_size: usize,
) -> Result<Lowered, CompileError> {
    let mut ctx = LowerCtx {
        input_type,
        output_type,
        input_vector_size,
        output_vector_size,
        max_vector_length: 1,
        min_x_history: 0,
        min_y_history: 0,
    };

    let mut tokens = Vec::new();
    for assignment in &program.assignments {
        let (rhs_info, rhs_tokens) = lower(&assignment.rhs, &mut ctx)?;
        let (start, history) = validate_assign_target(&assignment.target, &rhs_info, output_vector_size)?;

        check_depth(rhs_info.depth)?;
        tokens.extend(rhs_tokens);
        tokens.push(Token::new(
            TokenKind::Assignment { start, history_index: history },
            output_type,
            rhs_info.vector_length,
        ));
    }

    Ok(Lowered {
        tokens,
        max_vector_length: ctx.max_vector_length,
        input_history_size: (1 - ctx.min_x_history) as usize,
        output_history_size: (1 - ctx.min_y_history) as usize,
    })
}

fn validate_assign_target(
    target: &AssignTarget,
    rhs_info: &NodeInfo,
    output_vector_size: usize,
) -> Result<(usize, i32), CompileError> {
    if target.history > -1 && target.history != 0 {
        // `0` is the normal case; any negative value is a one-shot
        // initializer. Positive history indices never parse (the lexer's
        // int literal is signed but the grammar only accepts `<= -1` for
        // `y`), this branch exists for defense in depth.
        return Err(CompileError::RangeViolation {
            detail: "assignment history index must be <= 0".into(),
        });
    }
    let Some((start, width)) = target.lane.resolve(output_vector_size) else {
        return Err(CompileError::RangeViolation {
            detail: format!("assignment lane out of bounds for length {output_vector_size}"),
        });
    };
    if rhs_info.vector_length != width && rhs_info.vector_length != 1 {
        return Err(CompileError::LengthMismatch { expected: width, actual: rhs_info.vector_length });
    }
    Ok((start, target.history))
}

fn check_depth(depth: usize) -> Result<(), CompileError> {
    if depth > MAX_STACK_DEPTH {
        Err(CompileError::StackOverflow)
    } else {
        Ok(())
    }
}

/// Sethi-Ullman-style peak stack usage for a node whose children are
/// evaluated left to right, each leaving exactly one value behind.
fn combine(children_depths: &[usize]) -> usize {
    let mut peak = 0;
    let mut base = 0;
    for &d in children_depths {
        peak = peak.max(base + d);
        base += 1;
    }
    peak.max(1)
}

fn unify_lengths(a: usize, b: usize) -> Result<usize, CompileError> {
    if a == b {
        Ok(a)
    } else if a == 1 {
        Ok(b)
    } else if b == 1 {
        Ok(a)
    } else {
        Err(CompileError::LengthMismatch { expected: a, actual: b })
    }
}

fn pick_lane(values: &[Scalar], lane: usize) -> Scalar {
    if values.len() == 1 { values[0] } else { values[lane] }
}

fn fold_leaf(data_type: DataType, vector_length: usize, values: Vec<Scalar>) -> (NodeInfo, Vec<Token>) {
    debug_assert_eq!(values.len(), vector_length);
    if vector_length != 1 {
        // A constant vector still needs `vector_length` Const pushes
        // followed by a Vectorize, so the evaluator sees a single token
        // shape whether the vector was constant or not.
        return emit_const_vector(data_type, values);
    }
    let token = Token::new(TokenKind::Const(values[0]), data_type, 1);
    (NodeInfo { data_type, vector_length, constant: Some(values), depth: 1 }, vec![token])
}

fn emit_const_vector(data_type: DataType, values: Vec<Scalar>) -> (NodeInfo, Vec<Token>) {
    let vector_length = values.len();
    let mut tokens: Vec<Token> = values
        .iter()
        .map(|v| Token::new(TokenKind::Const(*v), data_type, 1))
        .collect();
    tokens.push(Token::new(TokenKind::Vectorize { count: vector_length }, data_type, vector_length));
    (
        NodeInfo { data_type, vector_length, constant: Some(values), depth: vector_length },
        tokens,
    )
}

fn lower(expr: &Expr, ctx: &mut LowerCtx) -> Result<(NodeInfo, Vec<Token>), CompileError> {
    match expr {
        Expr::IntConst(v) => Ok(fold_leaf(DataType::Int32, 1, vec![Scalar::Int32(*v)])),
        Expr::FloatConst(v) => Ok(fold_leaf(DataType::Float32, 1, vec![Scalar::Float32(*v)])),

        Expr::Var { var, lane, history } => lower_var(*var, *lane, *history, ctx),

        Expr::Unary(op, inner) => lower_unary(*op, inner, ctx),

        Expr::Binary(op, lhs, rhs) => lower_binary(*op, lhs, rhs, ctx),

        Expr::Call(func, args) => lower_call(*func, args, ctx),

        Expr::VCall(vfunc, inner) => lower_vcall(*vfunc, inner, ctx),

        Expr::Vector(elems) => lower_vector(elems, ctx),

        Expr::Conditional { cond, then, els } => lower_conditional(cond, then, els.as_deref(), ctx),
    }
}

fn lower_var(
    var: ast::Var,
    lane: LaneSel,
    history: i32,
    ctx: &mut LowerCtx,
) -> Result<(NodeInfo, Vec<Token>), CompileError> {
    let (data_type, declared_len, token_var) = match var {
        ast::Var::X => {
            if history > 0 {
                return Err(CompileError::RangeViolation { detail: "x history index must be <= 0".into() });
            }
            if !(-100..=0).contains(&history) {
                return Err(CompileError::RangeViolation { detail: "x history index must be in [-100, 0]".into() });
            }
            ctx.min_x_history = ctx.min_x_history.min(history);
            (ctx.input_type, ctx.input_vector_size, TokenVar::X)
        }
        ast::Var::Y => {
            if history > -1 {
                return Err(CompileError::RangeViolation {
                    detail: "y history index must be <= -1 (the current output hasn't been written yet)".into(),
                });
            }
            if !(-100..=-1).contains(&history) {
                return Err(CompileError::RangeViolation { detail: "y history index must be in [-100, -1]".into() });
            }
            ctx.min_y_history = ctx.min_y_history.min(history);
            (ctx.output_type, ctx.output_vector_size, TokenVar::Y)
        }
    };

    let Some((start, vector_length)) = lane.resolve(declared_len) else {
        return Err(CompileError::RangeViolation {
            detail: format!("vector index out of bounds for length {declared_len}"),
        });
    };
    ctx.max_vector_length = ctx.max_vector_length.max(vector_length);

    let kind = TokenKind::Variable { var: token_var, start, history_index: history };
    Ok((
        NodeInfo { data_type, vector_length, constant: None, depth: 1 },
        vec![Token::new(kind, data_type, vector_length)],
    ))
}

fn lower_unary(op: OpCode, inner: &Expr, ctx: &mut LowerCtx) -> Result<(NodeInfo, Vec<Token>), CompileError> {
    let (inner_info, inner_tokens) = lower(inner, ctx)?;
    debug_assert_eq!(op, OpCode::Not);

    if let Some(c) = &inner_info.constant {
        let folded: Vec<Scalar> = c.iter().map(|&s| ops::apply_not(inner_info.data_type, s)).collect();
        return Ok(fold_leaf(inner_info.data_type, inner_info.vector_length, folded));
    }

    check_depth(inner_info.depth)?;
    let mut tokens = inner_tokens;
    tokens.push(Token::new(TokenKind::Operator(op), inner_info.data_type, inner_info.vector_length));
    Ok((
        NodeInfo { data_type: inner_info.data_type, vector_length: inner_info.vector_length, constant: None, depth: inner_info.depth },
        tokens,
    ))
}

fn lower_binary(op: OpCode, lhs: &Expr, rhs: &Expr, ctx: &mut LowerCtx) -> Result<(NodeInfo, Vec<Token>), CompileError> {
    let (lhs_info, lhs_tokens) = lower(lhs, ctx)?;
    let (rhs_info, rhs_tokens) = lower(rhs, ctx)?;

    let data_type = lhs_info.data_type.widen(rhs_info.data_type);
    if op.is_integer_only() && data_type != DataType::Int32 {
        return Err(CompileError::TypeMismatch {
            detail: format!("'{}' requires integer operands", op.symbol()),
        });
    }
    let vector_length = unify_lengths(lhs_info.vector_length, rhs_info.vector_length)?;
    ctx.max_vector_length = ctx.max_vector_length.max(vector_length);

    if let (Some(lc), Some(rc)) = (&lhs_info.constant, &rhs_info.constant) {
        let mut folded = Vec::with_capacity(vector_length);
        for lane in 0..vector_length {
            let a = pick_lane(lc, lane).cast_to(data_type);
            let b = pick_lane(rc, lane).cast_to(data_type);
            folded.push(ops::apply_binary(op, data_type, a, b));
        }
        return Ok(fold_leaf(data_type, vector_length, folded));
    }

    let depth = combine(&[lhs_info.depth, rhs_info.depth]);
    check_depth(depth)?;
    let mut tokens = lhs_tokens;
    tokens.extend(rhs_tokens);
    tokens.push(Token::new(TokenKind::Operator(op), data_type, vector_length));
    Ok((NodeInfo { data_type, vector_length, constant: None, depth }, tokens))
}

fn lower_call(func: FuncId, args: &[Expr], ctx: &mut LowerCtx) -> Result<(NodeInfo, Vec<Token>), CompileError> {
    let mut infos = Vec::with_capacity(args.len());
    let mut token_groups = Vec::with_capacity(args.len());
    for a in args {
        let (info, toks) = lower(a, ctx)?;
        infos.push(info);
        token_groups.push(toks);
    }

    let vector_length = infos
        .iter()
        .try_fold(1usize, |acc, i| unify_lengths(acc, i.vector_length))?;
    ctx.max_vector_length = ctx.max_vector_length.max(vector_length);

    let mut data_type = infos.iter().fold(DataType::Int32, |acc, i| acc.widen(i.data_type));
    if !func.has_int32_form() && data_type == DataType::Int32 {
        // Every transcendental function is float-only; a lone int32
        // constant argument is promoted rather than rejected.
        data_type = DataType::Float32;
    }

    if func.is_deterministic() && infos.iter().all(|i| i.constant.is_some()) {
        let mut folded = Vec::with_capacity(vector_length.max(1));
        for lane in 0..vector_length.max(1) {
            let lane_args: Vec<Scalar> = infos
                .iter()
                .map(|i| pick_lane(i.constant.as_ref().unwrap(), lane).cast_to(data_type))
                .collect();
            folded.push(ops::call_function(func, data_type, &lane_args));
        }
        return Ok(fold_leaf(data_type, vector_length.max(1), folded));
    }

    let depth = combine(&infos.iter().map(|i| i.depth).collect::<Vec<_>>());
    check_depth(depth)?;
    let mut tokens: Vec<Token> = token_groups.into_iter().flatten().collect();
    tokens.push(Token::new(TokenKind::Function(func), data_type, vector_length.max(1)));
    Ok((NodeInfo { data_type, vector_length: vector_length.max(1), constant: None, depth }, tokens))
}

fn lower_vcall(vfunc: VFuncId, inner: &Expr, ctx: &mut LowerCtx) -> Result<(NodeInfo, Vec<Token>), CompileError> {
    let (inner_info, inner_tokens) = lower(inner, ctx)?;
    let data_type = inner_info.data_type;

    if let Some(c) = &inner_info.constant {
        let truthy = c.iter().map(|s| s.is_truthy());
        let result = match vfunc {
            VFuncId::All => truthy.fold(true, |acc, t| acc && t),
            VFuncId::Any => truthy.fold(false, |acc, t| acc || t),
        };
        return Ok(fold_leaf(data_type, 1, vec![bool_scalar(result, data_type)]));
    }

    check_depth(inner_info.depth)?;
    let mut tokens = inner_tokens;
    tokens.push(Token::new(TokenKind::VectorFunction(vfunc), data_type, 1));
    Ok((NodeInfo { data_type, vector_length: 1, constant: None, depth: inner_info.depth }, tokens))
}

fn bool_scalar(value: bool, data_type: DataType) -> Scalar {
    match data_type {
        DataType::Int32 => Scalar::Int32(i32::from(value)),
        DataType::Float32 => Scalar::Float32(if value { 1.0 } else { 0.0 }),
        DataType::Float64 => Scalar::Float64(if value { 1.0 } else { 0.0 }),
    }
}

fn lower_vector(elems: &[Expr], ctx: &mut LowerCtx) -> Result<(NodeInfo, Vec<Token>), CompileError> {
    if elems.is_empty() {
        return Err(CompileError::Syntax { detail: "vector literal must have at least one element".into() });
    }

    let mut infos = Vec::with_capacity(elems.len());
    let mut token_groups = Vec::with_capacity(elems.len());
    for e in elems {
        let (info, toks) = lower(e, ctx)?;
        if info.vector_length != 1 {
            return Err(CompileError::LengthMismatch { expected: 1, actual: info.vector_length });
        }
        infos.push(info);
        token_groups.push(toks);
    }

    let data_type = infos.iter().fold(infos[0].data_type, |acc, i| acc.widen(i.data_type));
    let vector_length = elems.len();
    ctx.max_vector_length = ctx.max_vector_length.max(vector_length);

    if infos.iter().all(|i| i.constant.is_some()) {
        let folded: Vec<Scalar> = infos
            .iter()
            .map(|i| i.constant.as_ref().unwrap()[0].cast_to(data_type))
            .collect();
        return Ok(emit_const_vector(data_type, folded));
    }

    let depth = combine(&infos.iter().map(|i| i.depth).collect::<Vec<_>>());
    check_depth(depth)?;
    let mut tokens: Vec<Token> = token_groups.into_iter().flatten().collect();
    tokens.push(Token::new(TokenKind::Vectorize { count: vector_length }, data_type, vector_length));
    Ok((NodeInfo { data_type, vector_length, constant: None, depth }, tokens))
}

fn lower_conditional(
    cond: &Expr,
    then: &Expr,
    els: Option<&Expr>,
    ctx: &mut LowerCtx,
) -> Result<(NodeInfo, Vec<Token>), CompileError> {
    let (cond_info, cond_tokens) = lower(cond, ctx)?;
    let (then_info, then_tokens) = lower(then, ctx)?;
    let els_parts = els.map(|e| lower(e, ctx)).transpose()?;

    let data_type = match &els_parts {
        Some((els_info, _)) => cond_info.data_type.widen(then_info.data_type).widen(els_info.data_type),
        None => cond_info.data_type.widen(then_info.data_type),
    };
    let vector_length = match &els_parts {
        Some((els_info, _)) => {
            let ab = unify_lengths(cond_info.vector_length, then_info.vector_length)?;
            unify_lengths(ab, els_info.vector_length)?
        }
        None => unify_lengths(cond_info.vector_length, then_info.vector_length)?,
    };
    ctx.max_vector_length = ctx.max_vector_length.max(vector_length);

    let op = if els_parts.is_some() { OpCode::IfThenElse } else { OpCode::IfThen };

    if let Some(folded) = try_fold_conditional(op, data_type, vector_length, &cond_info, &then_info, els_parts.as_ref().map(|(i, _)| i)) {
        return Ok(fold_leaf(data_type, vector_length, folded));
    }

    let els_depth = els_parts.as_ref().map_or(0, |(i, _)| i.depth);
    let depth = combine(&[cond_info.depth, then_info.depth, els_depth]);
    check_depth(depth)?;

    let mut tokens = cond_tokens;
    tokens.extend(then_tokens);
    if let Some((_, els_tokens)) = els_parts {
        tokens.extend(els_tokens);
    }
    tokens.push(Token::new(TokenKind::Operator(op), data_type, vector_length));
    Ok((NodeInfo { data_type, vector_length, constant: None, depth }, tokens))
}

/// Attempts to fold a conditional node. Returns `None` (don't fold) when
/// any operand isn't constant, or when an `IFTHEN` with no else branch
/// would suppress every sample — that's a legitimate (if degenerate)
/// runtime behavior, not something the compiler should reject or collapse.
fn try_fold_conditional(
    op: OpCode,
    data_type: DataType,
    vector_length: usize,
    cond_info: &NodeInfo,
    then_info: &NodeInfo,
    els_info: Option<&NodeInfo>,
) -> Option<Vec<Scalar>> {
    let cond_c = cond_info.constant.as_ref()?;
    let then_c = then_info.constant.as_ref()?;
    let els_c = match els_info {
        Some(info) => Some(info.constant.as_ref()?),
        None => None,
    };

    let mut folded = Vec::with_capacity(vector_length);
    for lane in 0..vector_length {
        let cond_lane = pick_lane(cond_c, lane).cast_to(data_type);
        let then_lane = pick_lane(then_c, lane).cast_to(data_type);
        let els_lane = els_c.map(|c| pick_lane(c, lane).cast_to(data_type));
        match ops::apply_conditional(op, cond_lane, then_lane, els_lane) {
            Conditional::Value(v) => folded.push(v),
            Conditional::Suppressed => return None,
        }
    }
    Some(folded)
}
