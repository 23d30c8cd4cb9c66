//! Recursive-descent / precedence-climbing parser producing a [`Program`]
//! from a token stream. Operator precedence comes straight from
//! `OpCode::precedence`, so the climbing order always matches the table the
//! evaluator and folder use.

use crate::ast::{AssignTarget, Assignment, Expr, LaneSel, Program, Var};
use crate::error::CompileError;
use crate::lexer::LexToken;
use mapper_core::{FuncId, OpCode, VFuncId};

pub struct Parser<'a> {
    tokens: &'a [LexToken],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [LexToken]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &LexToken {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> LexToken {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &LexToken) -> bool {
        if self.peek() == tok {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &LexToken) -> Result<(), CompileError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(CompileError::Syntax {
                detail: format!("expected {tok:?}, found {:?}", self.peek()),
            })
        }
    }

    /// Parse one or more comma-separated `target = expr` assignments, all
    /// implicitly targeting `y`.
    pub fn parse_program(&mut self) -> Result<Program, CompileError> {
        let mut assignments = vec![self.parse_one_assignment()?];
        while self.eat(&LexToken::Comma) {
            assignments.push(self.parse_one_assignment()?);
        }
        if *self.peek() != LexToken::End {
            return Err(CompileError::Syntax {
                detail: format!("unexpected trailing token {:?}", self.peek()),
            });
        }
        Ok(Program { assignments })
    }

    fn parse_one_assignment(&mut self) -> Result<Assignment, CompileError> {
        let target = self.parse_assign_target()?;
        self.expect(&LexToken::Assign)?;
        let rhs = self.parse_ternary()?;
        Ok(Assignment { target, rhs })
    }

    fn parse_assign_target(&mut self) -> Result<AssignTarget, CompileError> {
        match self.advance() {
            LexToken::Ident(name) if name == "y" => {
                let lane = self.parse_lane_suffix()?;
                let history = self.parse_history_suffix()?;
                Ok(AssignTarget { lane, history })
            }
            other => Err(CompileError::InvalidAssignmentTarget {
                detail: format!("expected 'y', found {other:?}"),
            }),
        }
    }

    /// `[i]` or `[i:j]`, or no suffix at all (`LaneSel::All`).
    fn parse_lane_suffix(&mut self) -> Result<LaneSel, CompileError> {
        if !self.eat(&LexToken::LBracket) {
            return Ok(LaneSel::All);
        }
        let i = self.parse_int_literal()? as usize;
        let lane = if self.eat(&LexToken::Colon) {
            let j = self.parse_int_literal()? as usize;
            LaneSel::Range(i, j)
        } else {
            LaneSel::Index(i)
        };
        self.expect(&LexToken::RBracket)?;
        Ok(lane)
    }

    /// `{k}`, or no suffix at all (history index `0`).
    fn parse_history_suffix(&mut self) -> Result<i32, CompileError> {
        if !self.eat(&LexToken::LBrace) {
            return Ok(0);
        }
        let k = self.parse_int_literal()?;
        self.expect(&LexToken::RBrace)?;
        Ok(k)
    }

    fn parse_ternary(&mut self) -> Result<Expr, CompileError> {
        let cond = self.parse_binary(OpCode::Or.precedence())?;
        if self.eat(&LexToken::Question) {
            let then = self.parse_ternary()?;
            let els = if self.eat(&LexToken::Colon) {
                Some(Box::new(self.parse_ternary()?))
            } else {
                None
            };
            Ok(Expr::Conditional { cond: Box::new(cond), then: Box::new(then), els })
        } else {
            Ok(cond)
        }
    }

    fn peek_binary_op(&self) -> Option<OpCode> {
        match self.peek() {
            LexToken::Op(op) if !matches!(op, OpCode::Not) => Some(*op),
            _ => None,
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some(op) = self.peek_binary_op() else { break };
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.eat(&LexToken::Op(OpCode::Not)) {
            return Ok(Expr::Unary(OpCode::Not, Box::new(self.parse_unary()?)));
        }
        if self.eat(&LexToken::Op(OpCode::Subtract)) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Binary(OpCode::Subtract, Box::new(Expr::IntConst(0)), Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        match self.advance() {
            LexToken::Number { text, is_float } => self.parse_number(&text, is_float),
            LexToken::Ident(name) if name == "x" => self.parse_var_suffix(Var::X),
            LexToken::Ident(name) if name == "y" => self.parse_var_suffix(Var::Y),
            LexToken::Ident(name) => self.parse_call(&name),
            LexToken::LParen => {
                let inner = self.parse_ternary()?;
                self.expect(&LexToken::RParen)?;
                Ok(inner)
            }
            LexToken::LBracket => self.parse_vector_literal(),
            other => Err(CompileError::Syntax { detail: format!("unexpected token {other:?}") }),
        }
    }

    fn parse_number(&mut self, text: &str, is_float: bool) -> Result<Expr, CompileError> {
        if is_float {
            text.parse::<f32>()
                .map(Expr::FloatConst)
                .map_err(|_| CompileError::Lex { span: text.to_string() })
        } else {
            text.parse::<i32>()
                .map(Expr::IntConst)
                .map_err(|_| CompileError::Lex { span: text.to_string() })
        }
    }

    fn parse_var_suffix(&mut self, var: Var) -> Result<Expr, CompileError> {
        let mut lane = LaneSel::All;
        let mut history = 0;
        loop {
            if *self.peek() == LexToken::LBracket {
                lane = self.parse_lane_suffix()?;
                continue;
            }
            if *self.peek() == LexToken::LBrace {
                history = self.parse_history_suffix()?;
                continue;
            }
            break;
        }
        Ok(Expr::Var { var, lane, history })
    }

    /// A literal (possibly negative) integer used for a lane, history
    /// index, or vector-literal element count — never a general
    /// expression.
    fn parse_int_literal(&mut self) -> Result<i32, CompileError> {
        let negative = self.eat(&LexToken::Op(OpCode::Subtract));
        match self.advance() {
            LexToken::Number { text, is_float: false } => {
                let v: i32 = text
                    .parse()
                    .map_err(|_| CompileError::Lex { span: text.clone() })?;
                Ok(if negative { -v } else { v })
            }
            other => Err(CompileError::Syntax {
                detail: format!("expected an integer literal, found {other:?}"),
            }),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, CompileError> {
        if let Some(vfunc) = VFuncId::from_name(name) {
            self.expect(&LexToken::LParen)?;
            let arg = self.parse_ternary()?;
            self.expect(&LexToken::RParen)?;
            return Ok(Expr::VCall(vfunc, Box::new(arg)));
        }
        let Some(func) = FuncId::from_name(name) else {
            return Err(CompileError::UnknownIdentifier { name: name.to_string() });
        };
        let mut args = Vec::new();
        self.expect(&LexToken::LParen)?;
        if *self.peek() != LexToken::RParen {
            loop {
                args.push(self.parse_ternary()?);
                if !self.eat(&LexToken::Comma) {
                    break;
                }
            }
        }
        self.expect(&LexToken::RParen)?;
        if args.len() != func.arity() {
            return Err(CompileError::Syntax {
                detail: format!(
                    "{} expects {} argument(s), got {}",
                    func.name(),
                    func.arity(),
                    args.len()
                ),
            });
        }
        Ok(Expr::Call(func, args))
    }

    fn parse_vector_literal(&mut self) -> Result<Expr, CompileError> {
        let mut elems = Vec::new();
        if *self.peek() != LexToken::RBracket {
            loop {
                elems.push(self.parse_ternary()?);
                if !self.eat(&LexToken::Comma) {
                    break;
                }
            }
        }
        self.expect(&LexToken::RBracket)?;
        Ok(Expr::Vector(elems))
    }
}

/// Lex and parse `source` into a [`Program`] of one or more assignments.
pub fn parse(source: &str) -> Result<Program, CompileError> {
    let tokens = crate::lexer::lex(source)?;
    Parser::new(&tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_assignment() {
        let prog = parse("y = x * 2").unwrap();
        assert_eq!(prog.assignments.len(), 1);
        assert_eq!(prog.assignments[0].target, AssignTarget { lane: LaneSel::All, history: 0 });
        assert_eq!(
            prog.assignments[0].rhs,
            Expr::Binary(
                OpCode::Multiply,
                Box::new(Expr::Var { var: Var::X, lane: LaneSel::All, history: 0 }),
                Box::new(Expr::IntConst(2)),
            )
        );
    }

    #[test]
    fn precedence_climbs_correctly() {
        let prog = parse("y = 1 + 2 * 3").unwrap();
        assert_eq!(
            prog.assignments[0].rhs,
            Expr::Binary(
                OpCode::Add,
                Box::new(Expr::IntConst(1)),
                Box::new(Expr::Binary(
                    OpCode::Multiply,
                    Box::new(Expr::IntConst(2)),
                    Box::new(Expr::IntConst(3))
                )),
            )
        );
    }

    #[test]
    fn parses_history_and_lane_suffixes() {
        let prog = parse("y = x{-3}[1]").unwrap();
        assert_eq!(
            prog.assignments[0].rhs,
            Expr::Var { var: Var::X, lane: LaneSel::Index(1), history: -3 }
        );
    }

    #[test]
    fn parses_vector_range_suffix() {
        let prog = parse("y[0:1] = x[0:1]").unwrap();
        assert_eq!(prog.assignments[0].target, AssignTarget { lane: LaneSel::Range(0, 1), history: 0 });
    }

    #[test]
    fn parses_history_initializer_target() {
        let prog = parse("y{-1} = 0").unwrap();
        assert_eq!(prog.assignments[0].target, AssignTarget { lane: LaneSel::All, history: -1 });
    }

    #[test]
    fn parses_multiple_comma_assignments() {
        let prog = parse("y[0] = 1, y[1] = 2").unwrap();
        assert_eq!(prog.assignments.len(), 2);
        assert_eq!(prog.assignments[0].target.lane, LaneSel::Index(0));
        assert_eq!(prog.assignments[1].target.lane, LaneSel::Index(1));
    }

    #[test]
    fn parses_ternary_ifthenelse() {
        let prog = parse("y = x > 0 ? 1 : -1").unwrap();
        match prog.assignments[0].rhs {
            Expr::Conditional { els: Some(_), .. } => {}
            ref other => panic!("expected a full conditional, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_function() {
        assert!(parse("y = bogus(x)").is_err());
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(parse("y = pow(x)").is_err());
    }
}
