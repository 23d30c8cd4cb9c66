//! Tokenizer for expression source text.

use crate::error::CompileError;
use mapper_core::OpCode;

/// A token straight off the character stream, before the parser assigns it
/// any meaning (variable vs. function name, unary vs. binary `-`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum LexToken {
    Number { text: String, is_float: bool },
    Ident(String),
    Op(OpCode),
    Question,
    Colon,
    Assign,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    End,
}

pub fn lex(source: &str) -> Result<Vec<LexToken>, CompileError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            let mut is_float = false;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i < chars.len() && chars[i] == '.' {
                is_float = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                is_float = true;
                i += 1;
                if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(LexToken::Number { text, is_float });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(LexToken::Ident(text));
            continue;
        }

        if c == '<' && chars.get(i + 1) == Some(&'<') {
            tokens.push(LexToken::Op(OpCode::LeftShift));
            i += 2;
            continue;
        }
        if c == '>' && chars.get(i + 1) == Some(&'>') {
            tokens.push(LexToken::Op(OpCode::RightShift));
            i += 2;
            continue;
        }
        if c == '<' && chars.get(i + 1) == Some(&'=') {
            tokens.push(LexToken::Op(OpCode::LessEqual));
            i += 2;
            continue;
        }
        if c == '>' && chars.get(i + 1) == Some(&'=') {
            tokens.push(LexToken::Op(OpCode::GreaterEqual));
            i += 2;
            continue;
        }
        if c == '=' && chars.get(i + 1) == Some(&'=') {
            tokens.push(LexToken::Op(OpCode::Equal));
            i += 2;
            continue;
        }
        if c == '!' && chars.get(i + 1) == Some(&'=') {
            tokens.push(LexToken::Op(OpCode::NotEqual));
            i += 2;
            continue;
        }
        if c == '&' && chars.get(i + 1) == Some(&'&') {
            tokens.push(LexToken::Op(OpCode::And));
            i += 2;
            continue;
        }
        if c == '|' && chars.get(i + 1) == Some(&'|') {
            tokens.push(LexToken::Op(OpCode::Or));
            i += 2;
            continue;
        }

        let single = match c {
            '+' => Some(LexToken::Op(OpCode::Add)),
            '-' => Some(LexToken::Op(OpCode::Subtract)),
            '*' => Some(LexToken::Op(OpCode::Multiply)),
            '/' => Some(LexToken::Op(OpCode::Divide)),
            '%' => Some(LexToken::Op(OpCode::Modulo)),
            '<' => Some(LexToken::Op(OpCode::Less)),
            '>' => Some(LexToken::Op(OpCode::Greater)),
            '&' => Some(LexToken::Op(OpCode::BitAnd)),
            '|' => Some(LexToken::Op(OpCode::BitOr)),
            '^' => Some(LexToken::Op(OpCode::BitXor)),
            '!' => Some(LexToken::Op(OpCode::Not)),
            '?' => Some(LexToken::Question),
            ':' => Some(LexToken::Colon),
            '=' => Some(LexToken::Assign),
            ',' => Some(LexToken::Comma),
            '(' => Some(LexToken::LParen),
            ')' => Some(LexToken::RParen),
            '[' => Some(LexToken::LBracket),
            ']' => Some(LexToken::RBracket),
            '{' => Some(LexToken::LBrace),
            '}' => Some(LexToken::RBrace),
            _ => None,
        };

        match single {
            Some(tok) => {
                tokens.push(tok);
                i += 1;
            }
            None => return Err(CompileError::Lex { span: c.to_string() }),
        }
    }

    tokens.push(LexToken::End);
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_assignment_with_history_and_lane() {
        let toks = lex("y = x{-3}[1] * 2.5").unwrap();
        assert_eq!(
            toks,
            vec![
                LexToken::Ident("y".into()),
                LexToken::Assign,
                LexToken::Ident("x".into()),
                LexToken::LBrace,
                LexToken::Op(OpCode::Subtract),
                LexToken::Number { text: "3".into(), is_float: false },
                LexToken::RBrace,
                LexToken::LBracket,
                LexToken::Number { text: "1".into(), is_float: false },
                LexToken::RBracket,
                LexToken::Op(OpCode::Multiply),
                LexToken::Number { text: "2.5".into(), is_float: true },
                LexToken::End,
            ]
        );
    }

    #[test]
    fn distinguishes_two_char_operators_from_one_char() {
        let toks = lex("x <= y && z").unwrap();
        assert!(toks.contains(&LexToken::Op(OpCode::LessEqual)));
        assert!(toks.contains(&LexToken::Op(OpCode::And)));
    }

    #[test]
    fn unknown_character_is_a_lex_error() {
        assert!(lex("y = x @ 1").is_err());
    }
}
