//! Token definitions for the rivetc surface language

mod precedence;

pub use precedence::{Associativity, Precedence};

use logos::Logos;

/// Tokens of the surface language.
///
/// The grammar is deliberately small: a handful of keywords, one flavor of
/// integer literal, and the punctuation needed for classes, functions,
/// tuples and the primitive operators spec.md §3 enumerates.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // ==================== Keywords ====================
    #[token("class")]
    KwClass,
    #[token("def")]
    KwDef,
    #[token("return")]
    KwReturn,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("while")]
    KwWhile,
    #[token("print")]
    KwPrint,
    #[token("int")]
    KwInt,
    #[token("bool")]
    KwBool,
    #[token("and")]
    KwAnd,
    #[token("or")]
    KwOr,
    #[token("not")]
    KwNot,

    // ==================== Literals ====================
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    IntLiteral(i64),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // ==================== Punctuation ====================
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,
    #[token("->")]
    Arrow,
    #[token("=")]
    Equals,

    // ==================== Operators ====================
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("==")]
    EqEq,
    #[token(">=")]
    GtEq,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token("<")]
    Lt,
}

impl Token {
    /// A human-readable name, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::IntLiteral(n) => format!("integer '{n}'"),
            other => format!("'{other:?}'"),
        }
    }
}
