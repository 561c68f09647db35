//! Expression parsing: precedence climbing over [`crate::token::Precedence`]
//! plus a postfix loop for field access, subscripting and calls.

use super::Parser;
use crate::ast::{Expr, PrimOp};
use crate::error::ParseResult;
use crate::token::{Precedence, Token};

impl Parser {
    pub(crate) fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_binary(Precedence::Or)
    }

    fn parse_binary(&mut self, min_prec: Precedence) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let Some((prec, _assoc)) = token.binary_precedence() else {
                break;
            };
            if prec < min_prec {
                break;
            }
            let op = self.binop_for(token.clone());
            self.advance();
            let rhs = self.parse_binary_next(prec)?;
            lhs = Expr::Prim(op, vec![lhs, rhs]);
        }

        Ok(lhs)
    }

    /// Left-associative operators parse their right operand at one
    /// precedence level higher so repeated applications nest left.
    fn parse_binary_next(&mut self, prec: Precedence) -> ParseResult<Expr> {
        let next = match prec {
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Comparison,
            Precedence::Comparison => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative => Precedence::Multiplicative,
        };
        self.parse_binary(next)
    }

    fn binop_for(&self, token: Token) -> PrimOp {
        match token {
            Token::KwOr => PrimOp::Or,
            Token::KwAnd => PrimOp::And,
            Token::EqEq => PrimOp::Eq,
            Token::Gt => PrimOp::Gt,
            Token::GtEq => PrimOp::Gte,
            Token::Lt => PrimOp::Lt,
            Token::LtEq => PrimOp::Lte,
            Token::Plus => PrimOp::Add,
            Token::Minus => PrimOp::Sub,
            Token::Star => PrimOp::Mult,
            other => unreachable!("not a binary operator: {other:?}"),
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.check(&Token::KwNot) {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Prim(PrimOp::Not, vec![operand]));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let field = self.expect_ident("field name")?;
                expr = Expr::FieldRef(Box::new(expr), field);
            } else if self.eat(&Token::LBracket) {
                let index = self.parse_expr()?;
                self.expect(Token::RBracket, "']'")?;
                expr = Expr::Prim(PrimOp::Subscript, vec![expr, index]);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.peek().cloned() {
            Some(Token::IntLiteral(n)) => {
                self.advance();
                Ok(Expr::ConstInt(n))
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expr::ConstBool(true))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expr::ConstBool(false))
            }
            Some(Token::Ident(name)) => {
                self.advance();
                if self.eat(&Token::LParen) {
                    let args = self.parse_arg_list()?;
                    Ok(Expr::Call(Box::new(Expr::Var(name)), args))
                } else {
                    Ok(Expr::Var(name))
                }
            }
            Some(Token::LParen) => {
                self.advance();
                let first = self.parse_expr()?;
                if self.eat(&Token::Comma) {
                    let mut elems = vec![first];
                    if !self.check(&Token::RParen) {
                        elems.push(self.parse_expr()?);
                        while self.eat(&Token::Comma) {
                            elems.push(self.parse_expr()?);
                        }
                    }
                    self.expect(Token::RParen, "')'")?;
                    Ok(Expr::Prim(PrimOp::Tuple, elems))
                } else {
                    self.expect(Token::RParen, "')'")?;
                    Ok(first)
                }
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_arg_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            args.push(self.parse_expr()?);
            while self.eat(&Token::Comma) {
                args.push(self.parse_expr()?);
            }
        }
        self.expect(Token::RParen, "')'")?;
        Ok(args)
    }
}
