//! Lexer for rivetc source code.
//!
//! Thin wrapper over the `logos`-generated token iterator that attaches
//! [`Span`] information to every token, mirroring the span-tracking
//! convention used throughout this workspace's parser layer.

use logos::Logos;

use crate::error::LexError;
use crate::span::{SourceMap, Span};
use crate::token::Token;

/// A token together with the span of source text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Tokenizes an entire source string.
///
/// Returns every token eagerly; the surface language is small enough that
/// there is no benefit to a streaming lexer, unlike a full language
/// front end.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, LexError> {
    let source_map = SourceMap::new(source);
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = source_map.span(lexer.span().start, lexer.span().end);
        match result {
            Ok(token) => tokens.push(SpannedToken { token, span }),
            Err(()) => return Err(LexError { span }),
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_arithmetic() {
        let tokens = tokenize("1 + 2 * 3").unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0].token, Token::IntLiteral(1));
        assert_eq!(tokens[1].token, Token::Plus);
    }

    #[test]
    fn skips_comments() {
        let tokens = tokenize("# a comment\n42").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, Token::IntLiteral(42));
    }

    #[test]
    fn rejects_unknown_characters() {
        assert!(tokenize("1 @ 2").is_err());
    }
}
