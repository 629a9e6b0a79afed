//! Token definitions for the federation payload dialect.
//!
//! The dialect is the small JavaScript subset that generated bootstrap
//! programs and container entry payloads are written in: declarations,
//! conditionals, for-in, functions and arrows, literals, member access,
//! calls and the short-circuit operators.

use std::fmt;

/// Byte range of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A token in the payload dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Var,
    Let,
    Const,
    If,
    Else,
    For,
    In,
    Function,
    Return,
    Throw,
    Import,
    From,
    True,
    False,
    Null,
    Undefined,

    // Literals
    Number(f64),
    Str(String),
    Ident(String),

    // Punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Question,
    Arrow,

    // Operators
    Assign,
    Not,
    OrOr,
    AndAnd,
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Gt,
    Le,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Ident(name) => write!(f, "{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}
