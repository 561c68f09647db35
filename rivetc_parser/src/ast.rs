//! The surface (`L`) abstract syntax tree.
//!
//! One sum type per syntactic category, matched exhaustively by every
//! later pass — spec.md §9 asks that dynamic AST dispatch be replaced by
//! tagged variants the type checker can enforce at compile time, so this
//! is the only AST representation in the whole pipeline; there is no
//! separate concrete syntax tree.

use serde::{Deserialize, Serialize};

/// A type as written in source: either a primitive or the name of a
/// previously declared class. Resolving `Named` to a concrete `Record`
/// type is the type checker's job (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeAnnotation {
    Int,
    Bool,
    Named(String),
}

/// A primitive operator. Matches spec.md §3's operator table exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimOp {
    Add,
    Sub,
    Mult,
    And,
    Or,
    Not,
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Tuple,
    Subscript,
}

impl PrimOp {
    pub fn name(self) -> &'static str {
        match self {
            PrimOp::Add => "add",
            PrimOp::Sub => "sub",
            PrimOp::Mult => "mult",
            PrimOp::And => "and",
            PrimOp::Or => "or",
            PrimOp::Not => "not",
            PrimOp::Eq => "eq",
            PrimOp::Gt => "gt",
            PrimOp::Gte => "gte",
            PrimOp::Lt => "lt",
            PrimOp::Lte => "lte",
            PrimOp::Tuple => "tuple",
            PrimOp::Subscript => "subscript",
        }
    }

    /// `true` for the comparison family (spec.md §3: `eq gt gte lt lte`).
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            PrimOp::Eq | PrimOp::Gt | PrimOp::Gte | PrimOp::Lt | PrimOp::Lte
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Var(String),
    ConstInt(i64),
    ConstBool(bool),
    Prim(PrimOp, Vec<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    FieldRef(Box<Expr>, String),
    /// Introduced by remove-complex-operands for `while` conditions
    /// (spec.md §4.2); never produced by the parser.
    Begin(Vec<Stmt>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeAnnotation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Assign(String, Expr),
    Print(Expr),
    If(Expr, Vec<Stmt>, Vec<Stmt>),
    While(Expr, Vec<Stmt>),
    Return(Expr),
    FunctionDef {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
        ret: TypeAnnotation,
    },
    ClassDef {
        name: String,
        fields: Vec<(String, TypeAnnotation)>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}
