//! Statement and top-level declaration parsing.

use super::Parser;
use crate::ast::{Param, Stmt, TypeAnnotation};
use crate::error::ParseResult;
use crate::token::Token;

impl Parser {
    pub(crate) fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        match self.peek() {
            Some(Token::KwClass) => self.parse_class_def(),
            Some(Token::KwDef) => self.parse_function_def(),
            Some(Token::KwReturn) => self.parse_return(),
            Some(Token::KwIf) => self.parse_if(),
            Some(Token::KwWhile) => self.parse_while(),
            Some(Token::KwPrint) => self.parse_print(),
            Some(Token::Ident(_)) => self.parse_assign(),
            _ => Err(self.unexpected("a statement")),
        }
    }

    fn parse_block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(Token::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(Token::RBrace, "'}'")?;
        Ok(stmts)
    }

    fn parse_type(&mut self) -> ParseResult<TypeAnnotation> {
        match self.peek().cloned() {
            Some(Token::KwInt) => {
                self.advance();
                Ok(TypeAnnotation::Int)
            }
            Some(Token::KwBool) => {
                self.advance();
                Ok(TypeAnnotation::Bool)
            }
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(TypeAnnotation::Named(name))
            }
            _ => Err(self.unexpected("a type")),
        }
    }

    fn parse_class_def(&mut self) -> ParseResult<Stmt> {
        self.advance(); // `class`
        let name = self.expect_ident("class name")?;
        self.expect(Token::LBrace, "'{'")?;
        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) {
            let fname = self.expect_ident("field name")?;
            self.expect(Token::Colon, "':'")?;
            let fty = self.parse_type()?;
            self.expect(Token::Semicolon, "';'")?;
            fields.push((fname, fty));
        }
        self.expect(Token::RBrace, "'}'")?;
        Ok(Stmt::ClassDef { name, fields })
    }

    fn parse_function_def(&mut self) -> ParseResult<Stmt> {
        self.advance(); // `def`
        let name = self.expect_ident("function name")?;
        self.expect(Token::LParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            params.push(self.parse_param()?);
            while self.eat(&Token::Comma) {
                params.push(self.parse_param()?);
            }
        }
        self.expect(Token::RParen, "')'")?;
        self.expect(Token::Arrow, "'->'")?;
        let ret = self.parse_type()?;
        let body = self.parse_block()?;
        Ok(Stmt::FunctionDef {
            name,
            params,
            body,
            ret,
        })
    }

    fn parse_param(&mut self) -> ParseResult<Param> {
        let name = self.expect_ident("parameter name")?;
        self.expect(Token::Colon, "':'")?;
        let ty = self.parse_type()?;
        Ok(Param { name, ty })
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let e = self.parse_expr()?;
        self.expect(Token::Semicolon, "';'")?;
        Ok(Stmt::Return(e))
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let cond = self.parse_expr()?;
        let then_body = self.parse_block()?;
        let else_body = if self.eat(&Token::KwElse) {
            self.parse_block()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If(cond, then_body, else_body))
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Stmt::While(cond, body))
    }

    fn parse_print(&mut self) -> ParseResult<Stmt> {
        self.advance();
        self.expect(Token::LParen, "'('")?;
        let e = self.parse_expr()?;
        self.expect(Token::RParen, "')'")?;
        self.expect(Token::Semicolon, "';'")?;
        Ok(Stmt::Print(e))
    }

    fn parse_assign(&mut self) -> ParseResult<Stmt> {
        let name = self.expect_ident("an identifier")?;
        self.expect(Token::Equals, "'='")?;
        let e = self.parse_expr()?;
        self.expect(Token::Semicolon, "';'")?;
        Ok(Stmt::Assign(name, e))
    }
}
