//! Constraint expressions.
//!
//! A constrained parameter recomputes its value as a pure arithmetic
//! function of previously declared parameters. Expressions are compiled
//! once, at parse time, into a small tree holding parameter handles; they
//! are re-evaluated whenever the free parameters change.
//!
//! The surface is deliberately small: numeric literals, `+ - * /`, unary
//! minus, parentheses, and the one-argument functions `exp`, `log`,
//! `sqrt`, and `abs`.

use crate::params::ParamId;
use serde::{Deserialize, Serialize};

/// Why an expression failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// The expression refers to a name that has not been declared.
    Undefined(String),
    /// The expression is not well formed.
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Func {
    Exp,
    Log,
    Sqrt,
    Abs,
}

/// A compiled constraint expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Const(f64),
    Var(ParamId),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    /// Compile `src`, resolving parameter names through `resolve`.
    pub fn parse(
        src: &str,
        resolve: impl Fn(&str) -> Option<ParamId>,
    ) -> Result<Expr, ExprError> {
        let toks = lex(src)?;
        let mut p = Parser {
            toks,
            pos: 0,
            resolve: &resolve,
        };
        let e = p.expr()?;
        if p.pos != p.toks.len() {
            return Err(ExprError::Malformed(format!(
                "unexpected trailing input in '{src}'"
            )));
        }
        Ok(e)
    }

    /// Evaluate against the full parameter-value vector, indexed by handle.
    /// Division by zero follows IEEE semantics; the caller decides whether
    /// a non-finite result is acceptable.
    pub fn eval(&self, values: &[f64]) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::Var(id) => values[id.index()],
            Expr::Neg(a) => -a.eval(values),
            Expr::Add(a, b) => a.eval(values) + b.eval(values),
            Expr::Sub(a, b) => a.eval(values) - b.eval(values),
            Expr::Mul(a, b) => a.eval(values) * b.eval(values),
            Expr::Div(a, b) => a.eval(values) / b.eval(values),
            Expr::Call(f, a) => {
                let x = a.eval(values);
                match f {
                    Func::Exp => x.exp(),
                    Func::Log => x.ln(),
                    Func::Sqrt => x.sqrt(),
                    Func::Abs => x.abs(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn lex(src: &str) -> Result<Vec<Tok>, ExprError> {
    let mut toks = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '-' => {
                toks.push(Tok::Minus);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Star);
                i += 1;
            }
            '/' => {
                toks.push(Tok::Slash);
                i += 1;
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len() && matches!(bytes[i] as char, '0'..='9' | '.') {
                    i += 1;
                }
                // optional exponent
                if i < bytes.len() && matches!(bytes[i] as char, 'e' | 'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && matches!(bytes[j] as char, '+' | '-') {
                        j += 1;
                    }
                    if j < bytes.len() && (bytes[j] as char).is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text = &src[start..i];
                let num: f64 = text
                    .parse()
                    .map_err(|_| ExprError::Malformed(format!("bad number '{text}'")))?;
                toks.push(Tok::Num(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric()
                        || matches!(bytes[i] as char, '_' | '.'))
                {
                    i += 1;
                }
                toks.push(Tok::Ident(src[start..i].to_string()));
            }
            other => {
                return Err(ExprError::Malformed(format!(
                    "unexpected character '{other}'"
                )))
            }
        }
    }
    Ok(toks)
}

struct Parser<'a, R: Fn(&str) -> Option<ParamId>> {
    toks: Vec<Tok>,
    pos: usize,
    resolve: &'a R,
}

impl<R: Fn(&str) -> Option<ParamId>> Parser<'_, R> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Tok::Plus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    lhs = Expr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some(Tok::Minus) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.factor()?;
        loop {
            match self.peek() {
                Some(Tok::Star) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(rhs));
                }
                Some(Tok::Slash) => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    lhs = Expr::Div(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    // factor := '-' factor | primary
    fn factor(&mut self) -> Result<Expr, ExprError> {
        if matches!(self.peek(), Some(Tok::Minus)) {
            self.pos += 1;
            let inner = self.factor()?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.primary()
    }

    // primary := number | name | func '(' expr ')' | '(' expr ')'
    fn primary(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some(Tok::Num(v)) => Ok(Expr::Const(v)),
            Some(Tok::Ident(name)) => {
                if matches!(self.peek(), Some(Tok::LParen)) {
                    let func = match name.as_str() {
                        "exp" => Func::Exp,
                        "log" => Func::Log,
                        "sqrt" => Func::Sqrt,
                        "abs" => Func::Abs,
                        _ => {
                            return Err(ExprError::Malformed(format!(
                                "unknown function '{name}'"
                            )))
                        }
                    };
                    self.pos += 1; // '('
                    let arg = self.expr()?;
                    match self.next() {
                        Some(Tok::RParen) => Ok(Expr::Call(func, Box::new(arg))),
                        _ => Err(ExprError::Malformed("missing ')'".to_string())),
                    }
                } else {
                    let id = (self.resolve)(&name).ok_or(ExprError::Undefined(name))?;
                    Ok(Expr::Var(id))
                }
            }
            Some(Tok::LParen) => {
                let e = self.expr()?;
                match self.next() {
                    Some(Tok::RParen) => Ok(e),
                    _ => Err(ExprError::Malformed("missing ')'".to_string())),
                }
            }
            other => Err(ExprError::Malformed(format!(
                "unexpected token {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(name: &str) -> Option<ParamId> {
        match name {
            "a" => Some(ParamId::new(0)),
            "b" => Some(ParamId::new(1)),
            _ => None,
        }
    }

    #[test]
    fn test_literal() {
        let e = Expr::parse("2.5", resolve).unwrap();
        assert_eq!(e.eval(&[]), 2.5);
    }

    #[test]
    fn test_scientific_notation() {
        let e = Expr::parse("1.2e2", resolve).unwrap();
        assert_eq!(e.eval(&[]), 120.0);
    }

    #[test]
    fn test_precedence() {
        let e = Expr::parse("1 + 2 * 3", resolve).unwrap();
        assert_eq!(e.eval(&[]), 7.0);
        let e = Expr::parse("(1 + 2) * 3", resolve).unwrap();
        assert_eq!(e.eval(&[]), 9.0);
    }

    #[test]
    fn test_variables() {
        let e = Expr::parse("a + b / 2", resolve).unwrap();
        assert_eq!(e.eval(&[1.0, 4.0]), 3.0);
    }

    #[test]
    fn test_unary_minus() {
        let e = Expr::parse("-a * 3", resolve).unwrap();
        assert_eq!(e.eval(&[2.0]), -6.0);
    }

    #[test]
    fn test_functions() {
        let e = Expr::parse("exp(a)", resolve).unwrap();
        assert!((e.eval(&[1.0]) - std::f64::consts::E).abs() < 1e-12);
        let e = Expr::parse("sqrt(a * a)", resolve).unwrap();
        assert_eq!(e.eval(&[3.0]), 3.0);
    }

    #[test]
    fn test_divide_by_zero_is_not_finite() {
        let e = Expr::parse("a / b", resolve).unwrap();
        assert!(!e.eval(&[1.0, 0.0]).is_finite());
    }

    #[test]
    fn test_undefined_name() {
        assert_eq!(
            Expr::parse("a + zz", resolve),
            Err(ExprError::Undefined("zz".to_string()))
        );
    }

    #[test]
    fn test_malformed() {
        assert!(Expr::parse("1 +", resolve).is_err());
        assert!(Expr::parse("(1", resolve).is_err());
        assert!(Expr::parse("1 2", resolve).is_err());
        assert!(Expr::parse("frob(1)", resolve).is_err());
    }
}
