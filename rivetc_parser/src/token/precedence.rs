//! Operator precedence for the expression parser.

use super::Token;

/// Binding power of a binary operator. Higher binds tighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i8)]
pub enum Precedence {
    Or = 1,
    And = 2,
    Comparison = 3,
    Additive = 4,
    Multiplicative = 5,
}

/// All binary operators in this language are left-associative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
}

impl Token {
    /// Precedence and associativity of a binary operator, or `None` if
    /// the token does not start an infix operator.
    pub fn binary_precedence(&self) -> Option<(Precedence, Associativity)> {
        use Associativity::Left;
        use Precedence::*;

        Some(match self {
            Token::KwOr => (Or, Left),
            Token::KwAnd => (And, Left),
            Token::EqEq | Token::Gt | Token::GtEq | Token::Lt | Token::LtEq => (Comparison, Left),
            Token::Plus | Token::Minus => (Additive, Left),
            Token::Star => (Multiplicative, Left),
            _ => return None,
        })
    }
}
