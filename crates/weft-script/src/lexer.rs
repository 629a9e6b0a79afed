//! Lexer for the federation payload dialect.
//!
//! Implemented with the logos library. The logos-internal enum is converted
//! to the public [`Token`] stream after lexing.

use logos::Logos;

use crate::error::ScriptError;
use crate::token::{Span, Token};

/// Logos-based token enum used internally for tokenization.
#[derive(Logos, Debug, Clone, PartialEq)]
enum LogosToken {
    // Whitespace (skip)
    #[regex(r"[ \t\r\n]+", logos::skip)]
    Whitespace,

    // Comments (skip)
    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    // Equivalent form of /\*([^*]|\*+[^*/])*\*+/ — the alternation-based
    // form miscompiles under logos and rejects valid block comments.
    #[regex(r"/\*[^*]*\*+([^/*][^*]*\*+)*/", logos::skip)]
    BlockComment,

    // Keywords (must come before identifiers)
    #[token("var")]
    Var,

    #[token("let")]
    Let,

    #[token("const")]
    Const,

    #[token("if")]
    If,

    #[token("else")]
    Else,

    #[token("for")]
    For,

    #[token("in")]
    In,

    #[token("function")]
    Function,

    #[token("return")]
    Return,

    #[token("throw")]
    Throw,

    #[token("import")]
    Import,

    #[token("from")]
    From,

    #[token("true")]
    True,

    #[token("false")]
    False,

    #[token("null")]
    Null,

    #[token("undefined")]
    Undefined,

    // Literals
    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| unescape(lex.slice()))]
    Str(String),

    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Punctuation
    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

    #[token("?")]
    Question,

    #[token("=>")]
    Arrow,

    // Operators (longest first)
    #[token("===")]
    StrictEq,

    #[token("!==")]
    StrictNe,

    #[token("==")]
    LooseEq,

    #[token("!=")]
    LooseNe,

    #[token("<=")]
    Le,

    #[token(">=")]
    Ge,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token("||")]
    OrOr,

    #[token("&&")]
    AndAnd,

    #[token("=")]
    Assign,

    #[token("!")]
    Not,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,
}

/// Strip the surrounding quotes and process escape sequences.
fn unescape(quoted: &str) -> Option<String> {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                other => out.push(other),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

impl From<LogosToken> for Token {
    fn from(t: LogosToken) -> Token {
        match t {
            LogosToken::Whitespace | LogosToken::LineComment | LogosToken::BlockComment => {
                unreachable!("skipped by logos")
            }
            LogosToken::Var => Token::Var,
            LogosToken::Let => Token::Let,
            LogosToken::Const => Token::Const,
            LogosToken::If => Token::If,
            LogosToken::Else => Token::Else,
            LogosToken::For => Token::For,
            LogosToken::In => Token::In,
            LogosToken::Function => Token::Function,
            LogosToken::Return => Token::Return,
            LogosToken::Throw => Token::Throw,
            LogosToken::Import => Token::Import,
            LogosToken::From => Token::From,
            LogosToken::True => Token::True,
            LogosToken::False => Token::False,
            LogosToken::Null => Token::Null,
            LogosToken::Undefined => Token::Undefined,
            LogosToken::Number(n) => Token::Number(n),
            LogosToken::Str(s) => Token::Str(s),
            LogosToken::Ident(s) => Token::Ident(s),
            LogosToken::LBrace => Token::LBrace,
            LogosToken::RBrace => Token::RBrace,
            LogosToken::LParen => Token::LParen,
            LogosToken::RParen => Token::RParen,
            LogosToken::LBracket => Token::LBracket,
            LogosToken::RBracket => Token::RBracket,
            LogosToken::Comma => Token::Comma,
            LogosToken::Semicolon => Token::Semicolon,
            LogosToken::Colon => Token::Colon,
            LogosToken::Dot => Token::Dot,
            LogosToken::Question => Token::Question,
            LogosToken::Arrow => Token::Arrow,
            LogosToken::StrictEq => Token::StrictEq,
            LogosToken::StrictNe => Token::StrictNe,
            LogosToken::LooseEq => Token::LooseEq,
            LogosToken::LooseNe => Token::LooseNe,
            LogosToken::Le => Token::Le,
            LogosToken::Ge => Token::Ge,
            LogosToken::Lt => Token::Lt,
            LogosToken::Gt => Token::Gt,
            LogosToken::OrOr => Token::OrOr,
            LogosToken::AndAnd => Token::AndAnd,
            LogosToken::Assign => Token::Assign,
            LogosToken::Not => Token::Not,
            LogosToken::Plus => Token::Plus,
            LogosToken::Minus => Token::Minus,
            LogosToken::Star => Token::Star,
            LogosToken::Slash => Token::Slash,
        }
    }
}

/// Tokenize payload source into a token stream with spans.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>, ScriptError> {
    let mut tokens = Vec::new();
    for (result, range) in LogosToken::lexer(source).spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((Token::from(token), span)),
            Err(_) => {
                return Err(ScriptError::Lex {
                    offset: span.start,
                    message: format!(
                        "unexpected character {:?}",
                        source[span.start..].chars().next().unwrap_or('\0')
                    ),
                })
            }
        }
    }
    Ok(tokens)
}
