//! Recursive-descent parser for the arithmetic expression subset:
//!
//! ```text
//! expr      := add_expr
//! add_expr  := mul_expr (('+'|'-') mul_expr)*
//! mul_expr  := un_expr (('*'|'/') un_expr)*
//! un_expr   := ('+'|'-')? primary
//! primary   := NUMBER | STRING | '(' expr ')'
//! ```
//!
//! The tree evaluates to an `i64` or an owned string. Integer arithmetic
//! wraps on overflow; `+` on two strings concatenates.

use crate::token::{ParseError, ParseErrorKind, Token, TokenType};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivideByZero,
    #[error("type mismatch")]
    TypeMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulOp {
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOp {
    Add,
    Subtract,
}

/// The expression tree. Chained same-precedence operations keep their
/// first operand apart from the (operator, operand) tail, which makes
/// left-to-right evaluation direct.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Number(i64),
    Str(String),
    Unary(UnOp, Box<Ast>),
    Mul(Box<Ast>, Vec<(MulOp, Ast)>),
    Add(Box<Ast>, Vec<(AddOp, Ast)>),
}

fn as_int(value: &Value) -> Result<i64, EvalError> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Text(_) => Err(EvalError::TypeMismatch),
    }
}

impl Ast {
    pub fn eval(&self) -> Result<Value, EvalError> {
        match self {
            Ast::Number(n) => Ok(Value::Int(*n)),
            Ast::Str(s) => Ok(Value::Text(s.clone())),
            Ast::Unary(op, child) => {
                let n = as_int(&child.eval()?)?;
                Ok(Value::Int(match op {
                    UnOp::Plus => n,
                    UnOp::Minus => n.wrapping_neg(),
                }))
            }
            Ast::Mul(first, rest) => {
                let mut acc = first.eval()?;
                for (op, term) in rest {
                    let lhs = as_int(&acc)?;
                    let rhs = as_int(&term.eval()?)?;
                    acc = Value::Int(match op {
                        MulOp::Multiply => lhs.wrapping_mul(rhs),
                        MulOp::Divide => {
                            if rhs == 0 {
                                return Err(EvalError::DivideByZero);
                            }
                            lhs.wrapping_div(rhs)
                        }
                    });
                }
                Ok(acc)
            }
            Ast::Add(first, rest) => {
                let mut acc = first.eval()?;
                for (op, term) in rest {
                    let rhs = term.eval()?;
                    acc = match (acc, op, rhs) {
                        (Value::Int(l), AddOp::Add, Value::Int(r)) => Value::Int(l.wrapping_add(r)),
                        (Value::Int(l), AddOp::Subtract, Value::Int(r)) => {
                            Value::Int(l.wrapping_sub(r))
                        }
                        (Value::Text(l), AddOp::Add, Value::Text(r)) => Value::Text(l + &r),
                        _ => return Err(EvalError::TypeMismatch),
                    };
                }
                Ok(acc)
            }
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ast::Number(n) => write!(f, "(lit-num: {n})"),
            Ast::Str(s) => write!(f, "(lit-str: {s})"),
            Ast::Unary(op, child) => {
                let sign = match op {
                    UnOp::Plus => '+',
                    UnOp::Minus => '-',
                };
                write!(f, "(un-expr: {sign}{child})")
            }
            Ast::Mul(first, rest) => {
                write!(f, "(mul-expr: {first}")?;
                for (op, term) in rest {
                    let sign = match op {
                        MulOp::Multiply => '*',
                        MulOp::Divide => '/',
                    };
                    write!(f, " {sign} {term}")?;
                }
                write!(f, ")")
            }
            Ast::Add(first, rest) => {
                write!(f, "(add-expr: {first}")?;
                for (op, term) in rest {
                    let sign = match op {
                        AddOp::Add => '+',
                        AddOp::Subtract => '-',
                    };
                    write!(f, " {sign} {term}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parses one expression off the front of the token list. Returns the
/// tree and the number of tokens consumed; a trailing `;` is left for
/// the statement layer.
pub fn parse(tokens: &[Token]) -> Result<(Ast, usize), ParseError> {
    let mut pos = 0;
    let ast = parse_add(tokens, &mut pos)?;
    Ok((ast, pos))
}

/// Parses one `expr ';'` statement. Returns the tree and the number of
/// tokens consumed, semicolon included.
pub fn parse_statement(tokens: &[Token]) -> Result<(Ast, usize), ParseError> {
    let (ast, consumed) = parse(tokens)?;
    match tokens.get(consumed) {
        Some(tok) if tok.kind == TokenType::Semicolon => Ok((ast, consumed + 1)),
        _ => Err(unexpected(tokens, consumed)),
    }
}

/// A statement compiled from a string, ready to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    ast: Ast,
}

impl Statement {
    /// Tokenizes and parses one `expr ';'` statement.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let tokens = crate::token::tokenize(input)?;
        let (ast, _) = parse_statement(&tokens)?;
        Ok(Self { ast })
    }

    pub fn eval(&self) -> Result<Value, EvalError> {
        self.ast.eval()
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }
}

fn unexpected(tokens: &[Token], pos: usize) -> ParseError {
    let line = tokens
        .get(pos)
        .or(tokens.last())
        .map(|t| t.line)
        .unwrap_or(1);
    ParseError::new(ParseErrorKind::UnexpectedToken, line, 0)
}

fn parse_add(tokens: &[Token], pos: &mut usize) -> Result<Ast, ParseError> {
    let first = parse_mul(tokens, pos)?;
    let mut rest = Vec::new();
    while let Some(tok) = tokens.get(*pos) {
        let op = match tok.kind {
            TokenType::Plus => AddOp::Add,
            TokenType::Minus => AddOp::Subtract,
            _ => break,
        };
        *pos += 1;
        rest.push((op, parse_mul(tokens, pos)?));
    }
    if rest.is_empty() {
        Ok(first)
    } else {
        Ok(Ast::Add(Box::new(first), rest))
    }
}

fn parse_mul(tokens: &[Token], pos: &mut usize) -> Result<Ast, ParseError> {
    let first = parse_unary(tokens, pos)?;
    let mut rest = Vec::new();
    while let Some(tok) = tokens.get(*pos) {
        let op = match tok.kind {
            TokenType::Star => MulOp::Multiply,
            TokenType::Slash => MulOp::Divide,
            _ => break,
        };
        *pos += 1;
        rest.push((op, parse_unary(tokens, pos)?));
    }
    if rest.is_empty() {
        Ok(first)
    } else {
        Ok(Ast::Mul(Box::new(first), rest))
    }
}

fn parse_unary(tokens: &[Token], pos: &mut usize) -> Result<Ast, ParseError> {
    let op = match tokens.get(*pos).map(|t| t.kind) {
        Some(TokenType::Plus) => Some(UnOp::Plus),
        Some(TokenType::Minus) => Some(UnOp::Minus),
        _ => None,
    };
    if op.is_some() {
        *pos += 1;
    }
    let primary = parse_primary(tokens, pos)?;
    match op {
        Some(op) => Ok(Ast::Unary(op, Box::new(primary))),
        None => Ok(primary),
    }
}

fn parse_primary(tokens: &[Token], pos: &mut usize) -> Result<Ast, ParseError> {
    let Some(tok) = tokens.get(*pos) else {
        return Err(unexpected(tokens, *pos));
    };
    match tok.kind {
        TokenType::Number => {
            // the numeric domain is i64; a decimal literal has no home
            let num: i64 = tok.lexeme.parse().map_err(|_| unexpected(tokens, *pos))?;
            *pos += 1;
            Ok(Ast::Number(num))
        }
        TokenType::String => {
            *pos += 1;
            Ok(Ast::Str(tok.lexeme.clone()))
        }
        TokenType::LeftParen => {
            *pos += 1;
            let inner = parse_add(tokens, pos)?;
            match tokens.get(*pos) {
                Some(close) if close.kind == TokenType::RightParen => {
                    *pos += 1;
                    Ok(inner)
                }
                _ => Err(unexpected(tokens, *pos)),
            }
        }
        _ => Err(unexpected(tokens, *pos)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn eval_str(input: &str) -> Result<Value, EvalError> {
        let tokens = tokenize(input).unwrap();
        let (ast, _) = parse_statement(&tokens).unwrap();
        ast.eval()
    }

    #[test]
    fn parenthesized_arithmetic() {
        assert_eq!(eval_str("-34 + (-7 * 5);"), Ok(Value::Int(-69)));
    }

    #[test]
    fn precedence_without_parentheses() {
        assert_eq!(eval_str("-34 + -7 * 5;"), Ok(Value::Int(-69)));
        assert_eq!(eval_str("2 + 3 * 4;"), Ok(Value::Int(14)));
    }

    #[test]
    fn left_associative_chains() {
        assert_eq!(eval_str("8 / 2 / 2;"), Ok(Value::Int(2)));
        assert_eq!(eval_str("1 - 2 - 3;"), Ok(Value::Int(-4)));
        assert_eq!(eval_str("2 * -3 / -2;"), Ok(Value::Int(3)));
    }

    #[test]
    fn division_by_zero_fails() {
        assert_eq!(eval_str("1 / 0;"), Err(EvalError::DivideByZero));
    }

    #[test]
    fn integer_arithmetic_wraps() {
        assert_eq!(
            eval_str("9223372036854775807 + 1;"),
            Ok(Value::Int(i64::MIN))
        );
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            eval_str("\"foo\" + \"bar\";"),
            Ok(Value::Text("foobar".into()))
        );
        assert_eq!(eval_str("\"a\" + 1;"), Err(EvalError::TypeMismatch));
        assert_eq!(eval_str("-\"a\";"), Err(EvalError::TypeMismatch));
        assert_eq!(eval_str("\"a\" * \"b\";"), Err(EvalError::TypeMismatch));
    }

    #[test]
    fn concatenation_is_associative() {
        let abc = |ast: Ast| ast.eval().unwrap();
        let left = Ast::Add(
            Box::new(Ast::Add(
                Box::new(Ast::Str("a".into())),
                vec![(AddOp::Add, Ast::Str("b".into()))],
            )),
            vec![(AddOp::Add, Ast::Str("c".into()))],
        );
        let right = Ast::Add(
            Box::new(Ast::Str("a".into())),
            vec![(
                AddOp::Add,
                Ast::Add(
                    Box::new(Ast::Str("b".into())),
                    vec![(AddOp::Add, Ast::Str("c".into()))],
                ),
            )],
        );
        assert_eq!(abc(left), abc(right));
    }

    #[test]
    fn a_plus_negated_a_is_zero() {
        for a in [0i64, 1, -1, 42, i64::MAX, i64::MIN] {
            let ast = Ast::Add(
                Box::new(Ast::Number(a)),
                vec![(AddOp::Subtract, Ast::Number(a))],
            );
            assert_eq!(ast.eval(), Ok(Value::Int(0)), "a = {a}");
        }
    }

    #[test]
    fn parse_is_deterministic() {
        let tokens = tokenize("1 + 2 * (3 - 4);").unwrap();
        let once = parse(&tokens).unwrap();
        let twice = parse(&tokens).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn parse_reports_tokens_consumed() {
        let tokens = tokenize("1 + 2;").unwrap();
        let (_, consumed) = parse(&tokens).unwrap();
        // the trailing semicolon is not consumed by parse itself
        assert_eq!(consumed, 3);
        assert_eq!(tokens[consumed].kind, TokenType::Semicolon);
        let (_, with_semi) = parse_statement(&tokens).unwrap();
        assert_eq!(with_semi, 4);
    }

    #[test]
    fn unexpected_token_pins_the_line() {
        let tokens = tokenize("1 + 2; 3 + ;").unwrap();
        let rest = &tokens[4..];
        let err = parse_statement(rest).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn decimal_literal_is_rejected_by_the_parser() {
        let tokens = tokenize("3.14;").unwrap();
        let err = parse_statement(&tokens).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnexpectedToken);
    }

    #[test]
    fn unbalanced_parenthesis_is_rejected() {
        let tokens = tokenize("(1 + 2;").unwrap();
        assert!(parse_statement(&tokens).is_err());
    }

    #[test]
    fn statement_compiles_and_evaluates() {
        let stmt = Statement::parse("-34 + (-7 * 5);").unwrap();
        assert_eq!(stmt.eval(), Ok(Value::Int(-69)));
        // re-evaluation is pure
        assert_eq!(stmt.eval(), Ok(Value::Int(-69)));

        let err = Statement::parse("-34 + (-7 * 5)").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnendedStmt);
    }

    #[test]
    fn tree_formatting() {
        let tokens = tokenize("-34 + 5;").unwrap();
        let (ast, _) = parse(&tokens).unwrap();
        assert_eq!(
            ast.to_string(),
            "(add-expr: (un-expr: -(lit-num: 34)) + (lit-num: 5))"
        );
    }
}
