//! Operator and function tables shared by the expression compiler's
//! constant folder and the runtime's evaluator.
//!
//! Neither crate computes arithmetic on its own: both call into
//! [`apply_binary`]/[`apply_not`]/[`apply_conditional`]/[`call_function`] so a
//! folded expression and an evaluated one can never drift apart.

use crate::scalar::{DataType, Scalar};

/// Binary, unary, and conditional operators, ordered by ascending
/// precedence just like the expression grammar's operator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Not,
    Multiply,
    Divide,
    Modulo,
    Add,
    Subtract,
    LeftShift,
    RightShift,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Equal,
    NotEqual,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
    IfThen,
    IfThenElse,
}

impl OpCode {
    pub fn symbol(self) -> &'static str {
        use OpCode::*;
        match self {
            Not => "!",
            Multiply => "*",
            Divide => "/",
            Modulo => "%",
            Add => "+",
            Subtract => "-",
            LeftShift => "<<",
            RightShift => ">>",
            Greater => ">",
            GreaterEqual => ">=",
            Less => "<",
            LessEqual => "<=",
            Equal => "==",
            NotEqual => "!=",
            BitAnd => "&",
            BitXor => "^",
            BitOr => "|",
            And => "&&",
            Or => "||",
            IfThen => "IFTHEN",
            IfThenElse => "IFTHENELSE",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            OpCode::Not => 1,
            OpCode::IfThenElse => 3,
            _ => 2,
        }
    }

    pub fn precedence(self) -> u8 {
        use OpCode::*;
        match self {
            Not => 11,
            Multiply | Divide | Modulo => 10,
            Add | Subtract => 9,
            LeftShift | RightShift => 8,
            Greater | GreaterEqual | Less | LessEqual => 7,
            Equal | NotEqual => 6,
            BitAnd => 5,
            BitXor => 4,
            BitOr => 3,
            And => 2,
            Or => 1,
            IfThen | IfThenElse => 0,
        }
    }

    /// Shifts and bitwise operators are only defined over `i32` lanes; the
    /// type checker must promote or reject float operands before an
    /// expression using one of these reaches the evaluator.
    pub fn is_integer_only(self) -> bool {
        matches!(
            self,
            OpCode::LeftShift | OpCode::RightShift | OpCode::BitAnd | OpCode::BitXor | OpCode::BitOr
        )
    }

    pub fn is_conditional(self) -> bool {
        matches!(self, OpCode::IfThen | OpCode::IfThenElse)
    }
}

fn bool_to_f64(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}
fn bool_to_f32(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}
fn bool_to_i32(b: bool) -> i32 {
    i32::from(b)
}

/// Evaluate one of the non-conditional binary operators at `dtype`.
/// Comparisons land back in the operand's own lane, matching the source
/// language's lack of a distinct boolean type.
pub fn apply_binary(op: OpCode, dtype: DataType, a: Scalar, b: Scalar) -> Scalar {
    debug_assert!(!op.is_conditional());
    match dtype {
        DataType::Int32 => Scalar::Int32(apply_binary_i32(op, a.as_i32(), b.as_i32())),
        DataType::Float32 => Scalar::Float32(apply_binary_f32(op, a.as_f32(), b.as_f32())),
        DataType::Float64 => Scalar::Float64(apply_binary_f64(op, a.as_f64(), b.as_f64())),
    }
}

fn apply_binary_i32(op: OpCode, a: i32, b: i32) -> i32 {
    use OpCode::*;
    match op {
        Add => a.wrapping_add(b),
        Subtract => a.wrapping_sub(b),
        Multiply => a.wrapping_mul(b),
        // Division/modulo by zero has no sample-rate-safe answer; yield 0
        // rather than panic the evaluation thread.
        Divide => {
            if b == 0 {
                0
            } else {
                a.wrapping_div(b)
            }
        }
        Modulo => {
            if b == 0 {
                0
            } else {
                a.wrapping_rem(b)
            }
        }
        Equal => bool_to_i32(a == b),
        NotEqual => bool_to_i32(a != b),
        Less => bool_to_i32(a < b),
        LessEqual => bool_to_i32(a <= b),
        Greater => bool_to_i32(a > b),
        GreaterEqual => bool_to_i32(a >= b),
        LeftShift => a.wrapping_shl(b as u32 & 31),
        RightShift => a.wrapping_shr(b as u32 & 31),
        BitAnd => a & b,
        BitOr => a | b,
        BitXor => a ^ b,
        And => bool_to_i32(a != 0 && b != 0),
        Or => bool_to_i32(a != 0 || b != 0),
        Not | IfThen | IfThenElse => {
            unreachable!("{op:?} is not a plain binary operator")
        }
    }
}

fn apply_binary_f64(op: OpCode, a: f64, b: f64) -> f64 {
    use OpCode::*;
    match op {
        Add => a + b,
        Subtract => a - b,
        Multiply => a * b,
        Divide => a / b,
        // `%` on Rust floats is the same truncated-division remainder as
        // libm's fmod.
        Modulo => a % b,
        Equal => bool_to_f64(a == b),
        NotEqual => bool_to_f64(a != b),
        Less => bool_to_f64(a < b),
        LessEqual => bool_to_f64(a <= b),
        Greater => bool_to_f64(a > b),
        GreaterEqual => bool_to_f64(a >= b),
        And => bool_to_f64(a != 0.0 && b != 0.0),
        Or => bool_to_f64(a != 0.0 || b != 0.0),
        LeftShift | RightShift | BitAnd | BitOr | BitXor => {
            unreachable!("{op:?} has no float lane; the type checker must reject this")
        }
        Not | IfThen | IfThenElse => {
            unreachable!("{op:?} is not a plain binary operator")
        }
    }
}

fn apply_binary_f32(op: OpCode, a: f32, b: f32) -> f32 {
    use OpCode::*;
    match op {
        Add => a + b,
        Subtract => a - b,
        Multiply => a * b,
        Divide => a / b,
        Modulo => a % b,
        Equal => bool_to_f32(a == b),
        NotEqual => bool_to_f32(a != b),
        Less => bool_to_f32(a < b),
        LessEqual => bool_to_f32(a <= b),
        Greater => bool_to_f32(a > b),
        GreaterEqual => bool_to_f32(a >= b),
        And => bool_to_f32(a != 0.0 && b != 0.0),
        Or => bool_to_f32(a != 0.0 || b != 0.0),
        LeftShift | RightShift | BitAnd | BitOr | BitXor => {
            unreachable!("{op:?} has no float lane; the type checker must reject this")
        }
        Not | IfThen | IfThenElse => {
            unreachable!("{op:?} is not a plain binary operator")
        }
    }
}

/// Evaluate the unary `!` operator, producing `0`/`1` in the operand's lane.
pub fn apply_not(dtype: DataType, a: Scalar) -> Scalar {
    match dtype {
        DataType::Int32 => Scalar::Int32(bool_to_i32(a.as_i32() == 0)),
        DataType::Float32 => Scalar::Float32(bool_to_f32(a.as_f32() == 0.0)),
        DataType::Float64 => Scalar::Float64(bool_to_f64(a.as_f64() == 0.0)),
    }
}

/// Outcome of evaluating a conditional operator. `IfThen` can suppress the
/// sample entirely when its condition is false: the connection produces no
/// output this tick rather than propagating a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conditional {
    Value(Scalar),
    Suppressed,
}

/// Evaluate `IFTHEN`/`IFTHENELSE`. `second` is the stack slot above the
/// condition; `third` is populated only for the three-operand form.
pub fn apply_conditional(op: OpCode, cond: Scalar, second: Scalar, third: Option<Scalar>) -> Conditional {
    match op {
        OpCode::IfThen => {
            if cond.is_truthy() {
                Conditional::Value(second)
            } else {
                Conditional::Suppressed
            }
        }
        OpCode::IfThenElse => {
            let third = third.expect("IFTHENELSE requires a third operand");
            Conditional::Value(if cond.is_truthy() { second } else { third })
        }
        _ => unreachable!("apply_conditional called with a non-conditional operator"),
    }
}

/// Named functions callable from expression source, in the same order as
/// the original function table. `Uniform` is kept last: it is the only
/// function that must never be constant-folded away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuncId {
    Abs,
    Acos,
    Acosh,
    Asin,
    Asinh,
    Atan,
    Atan2,
    Atanh,
    Cbrt,
    Ceil,
    Cos,
    Cosh,
    E,
    Exp,
    Exp2,
    Floor,
    Hypot,
    HzToMidi,
    Log,
    Log10,
    Log2,
    Logb,
    Max,
    MidiToHz,
    Min,
    Pi,
    Pow,
    Round,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
    Trunc,
    Uniform,
}

impl FuncId {
    pub fn name(self) -> &'static str {
        use FuncId::*;
        match self {
            Abs => "abs",
            Acos => "acos",
            Acosh => "acosh",
            Asin => "asin",
            Asinh => "asinh",
            Atan => "atan",
            Atan2 => "atan2",
            Atanh => "atanh",
            Cbrt => "cbrt",
            Ceil => "ceil",
            Cos => "cos",
            Cosh => "cosh",
            E => "e",
            Exp => "exp",
            Exp2 => "exp2",
            Floor => "floor",
            Hypot => "hypot",
            HzToMidi => "hzToMidi",
            Log => "log",
            Log10 => "log10",
            Log2 => "log2",
            Logb => "logb",
            Max => "max",
            MidiToHz => "midiToHz",
            Min => "min",
            Pi => "pi",
            Pow => "pow",
            Round => "round",
            Sin => "sin",
            Sinh => "sinh",
            Sqrt => "sqrt",
            Tan => "tan",
            Tanh => "tanh",
            Trunc => "trunc",
            Uniform => "uniform",
        }
    }

    pub fn from_name(name: &str) -> Option<FuncId> {
        use FuncId::*;
        Some(match name {
            "abs" => Abs,
            "acos" => Acos,
            "acosh" => Acosh,
            "asin" => Asin,
            "asinh" => Asinh,
            "atan" => Atan,
            "atan2" => Atan2,
            "atanh" => Atanh,
            "cbrt" => Cbrt,
            "ceil" => Ceil,
            "cos" => Cos,
            "cosh" => Cosh,
            "e" => E,
            "exp" => Exp,
            "exp2" => Exp2,
            "floor" => Floor,
            "hypot" => Hypot,
            "hzToMidi" => HzToMidi,
            "log" => Log,
            "log10" => Log10,
            "log2" => Log2,
            "logb" => Logb,
            "max" => Max,
            "midiToHz" => MidiToHz,
            "min" => Min,
            "pi" => Pi,
            "pow" => Pow,
            "round" => Round,
            "sin" => Sin,
            "sinh" => Sinh,
            "sqrt" => Sqrt,
            "tan" => Tan,
            "tanh" => Tanh,
            "trunc" => Trunc,
            "uniform" => Uniform,
            _ => return None,
        })
    }

    pub fn arity(self) -> usize {
        use FuncId::*;
        match self {
            E | Pi => 0,
            Atan2 | Hypot | Max | Min | Pow => 2,
            _ => 1,
        }
    }

    /// Whether this function has a native `i32` form. Functions without one
    /// (every transcendental) must have their operands promoted to a float
    /// type by the type checker before reaching [`call_function`].
    pub fn has_int32_form(self) -> bool {
        matches!(self, FuncId::Abs | FuncId::Max | FuncId::Min)
    }

    /// `uniform()` draws fresh randomness on every call and must never be
    /// constant-folded or precomputed, unlike every other function here.
    pub fn is_deterministic(self) -> bool {
        !matches!(self, FuncId::Uniform)
    }
}

/// Reducing functions applied across a vector's lanes, collapsing it to a
/// scalar boolean (`0`/`1` in the vector's own element type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VFuncId {
    All,
    Any,
}

impl VFuncId {
    pub fn name(self) -> &'static str {
        match self {
            VFuncId::All => "all",
            VFuncId::Any => "any",
        }
    }

    pub fn from_name(name: &str) -> Option<VFuncId> {
        match name {
            "all" => Some(VFuncId::All),
            "any" => Some(VFuncId::Any),
            _ => None,
        }
    }
}

fn maxd(x: f64, y: f64) -> f64 {
    if y > x { y } else { x }
}
fn mind(x: f64, y: f64) -> f64 {
    if y < x { y } else { x }
}
fn maxf(x: f32, y: f32) -> f32 {
    if y > x { y } else { x }
}
fn minf(x: f32, y: f32) -> f32 {
    if y < x { y } else { x }
}

/// Call a named function at `dtype`. `args` must already have `func.arity()`
/// elements; callers (the compiler's folder, the runtime's evaluator) are
/// responsible for arity checking ahead of time.
pub fn call_function(func: FuncId, dtype: DataType, args: &[Scalar]) -> Scalar {
    debug_assert_eq!(args.len(), func.arity());
    match dtype {
        DataType::Int32 => {
            let ints: Vec<i32> = args.iter().copied().map(Scalar::as_i32).collect();
            Scalar::Int32(call_function_i32(func, &ints))
        }
        DataType::Float32 => {
            let floats: Vec<f32> = args.iter().copied().map(Scalar::as_f32).collect();
            Scalar::Float32(call_function_f32(func, &floats))
        }
        DataType::Float64 => {
            let floats: Vec<f64> = args.iter().copied().map(Scalar::as_f64).collect();
            Scalar::Float64(call_function_f64(func, &floats))
        }
    }
}

fn call_function_i32(func: FuncId, args: &[i32]) -> i32 {
    match func {
        FuncId::Abs => args[0].wrapping_abs(),
        FuncId::Max => args[0].max(args[1]),
        FuncId::Min => args[0].min(args[1]),
        other => panic!(
            "{} has no native i32 form; the type checker should have promoted this operand",
            other.name()
        ),
    }
}

fn call_function_f64(func: FuncId, args: &[f64]) -> f64 {
    use FuncId::*;
    match func {
        Abs => args[0].abs(),
        Acos => args[0].acos(),
        Acosh => args[0].acosh(),
        Asin => args[0].asin(),
        Asinh => args[0].asinh(),
        Atan => args[0].atan(),
        Atan2 => args[0].atan2(args[1]),
        Atanh => args[0].atanh(),
        Cbrt => args[0].cbrt(),
        Ceil => args[0].ceil(),
        Cos => args[0].cos(),
        Cosh => args[0].cosh(),
        E => std::f64::consts::E,
        Exp => args[0].exp(),
        Exp2 => args[0].exp2(),
        Floor => args[0].floor(),
        Hypot => args[0].hypot(args[1]),
        HzToMidi => 69.0 + 12.0 * (args[0] / 440.0).log2(),
        Log => args[0].ln(),
        Log10 => args[0].log10(),
        Log2 => args[0].log2(),
        Logb => args[0].abs().log2().floor(),
        Max => maxd(args[0], args[1]),
        MidiToHz => 440.0 * 2f64.powf((args[0] - 69.0) / 12.0),
        Min => mind(args[0], args[1]),
        Pi => std::f64::consts::PI,
        Pow => args[0].powf(args[1]),
        Round => args[0].round(),
        Sin => args[0].sin(),
        Sinh => args[0].sinh(),
        Sqrt => args[0].sqrt(),
        Tan => args[0].tan(),
        Tanh => args[0].tanh(),
        Trunc => args[0].trunc(),
        Uniform => uniform_sample() * args[0],
    }
}

fn call_function_f32(func: FuncId, args: &[f32]) -> f32 {
    use FuncId::*;
    match func {
        Abs => args[0].abs(),
        Acos => args[0].acos(),
        Acosh => args[0].acosh(),
        Asin => args[0].asin(),
        Asinh => args[0].asinh(),
        Atan => args[0].atan(),
        Atan2 => args[0].atan2(args[1]),
        Atanh => args[0].atanh(),
        Cbrt => args[0].cbrt(),
        Ceil => args[0].ceil(),
        Cos => args[0].cos(),
        Cosh => args[0].cosh(),
        E => std::f32::consts::E,
        Exp => args[0].exp(),
        Exp2 => args[0].exp2(),
        Floor => args[0].floor(),
        Hypot => args[0].hypot(args[1]),
        HzToMidi => 69.0 + 12.0 * (args[0] / 440.0).log2(),
        Log => args[0].ln(),
        Log10 => args[0].log10(),
        Log2 => args[0].log2(),
        Logb => args[0].abs().log2().floor(),
        Max => maxf(args[0], args[1]),
        MidiToHz => 440.0 * 2f32.powf((args[0] - 69.0) / 12.0),
        Min => minf(args[0], args[1]),
        Pi => std::f32::consts::PI,
        Pow => args[0].powf(args[1]),
        Round => args[0].round(),
        Sin => args[0].sin(),
        Sinh => args[0].sinh(),
        Sqrt => args[0].sqrt(),
        Tan => args[0].tan(),
        Tanh => args[0].tanh(),
        Trunc => args[0].trunc(),
        Uniform => uniform_sample() as f32 * args[0],
    }
}

fn uniform_sample() -> f64 {
    use rand::Rng;
    rand::thread_rng().gen_range(0.0..1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulo_matches_fmod_not_rust_default_for_negatives() {
        let got = apply_binary_f64(OpCode::Modulo, -5.0, 3.0);
        assert_eq!(got, -2.0);
    }

    #[test]
    fn if_then_suppresses_on_false() {
        let cond = Scalar::Int32(0);
        let outcome = apply_conditional(OpCode::IfThen, cond, Scalar::Int32(42), None);
        assert_eq!(outcome, Conditional::Suppressed);
    }

    #[test]
    fn max_matches_c_comparison_semantics() {
        assert_eq!(call_function(FuncId::Max, DataType::Float64, &[Scalar::Float64(1.0), Scalar::Float64(2.0)]), Scalar::Float64(2.0));
        assert_eq!(call_function(FuncId::Max, DataType::Int32, &[Scalar::Int32(-1), Scalar::Int32(-5)]), Scalar::Int32(-1));
    }

    #[test]
    fn uniform_is_not_deterministic() {
        assert!(!FuncId::Uniform.is_deterministic());
        assert!(FuncId::Abs.is_deterministic());
    }

    #[test]
    fn integer_division_by_zero_yields_zero_instead_of_panicking() {
        assert_eq!(apply_binary_i32(OpCode::Divide, 10, 0), 0);
        assert_eq!(apply_binary_i32(OpCode::Modulo, 10, 0), 0);
    }
}
