//! Lex and parse error types.

use crate::span::Span;
use thiserror::Error;

/// An error raised while tokenizing source text.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unrecognized token at {span:?}")]
pub struct LexError {
    pub span: Span,
}

/// An error raised while parsing a token stream into the surface AST.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token {found} at {span:?}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        span: Span,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("invalid type annotation '{name}' at {span:?}")]
    InvalidType { name: String, span: Span },

    #[error("lexer error: {0}")]
    Lex(#[from] LexError),
}

pub type ParseResult<T> = Result<T, ParseError>;
