//! `C` — the control IR (spec §3): per-function maps from block labels
//! to linear statement sequences, with explicit `Goto`/`If`/`Return`
//! terminators and atomic-or-shallow-primitive expressions.

pub use rivetc_parser::ast::PrimOp;

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Var(String),
    Const(i64),
    ConstBool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CExpr {
    Atom(Atom),
    Prim(PrimOp, Vec<Atom>),
    Call(Atom, Vec<Atom>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CStmt {
    Assign(String, CExpr),
    Print(Atom),
    Return(Atom),
    Goto(String),
    If(Atom, String, String),
}

/// One function's basic blocks in discovery order. `start_label` is
/// always `<fname>start` (spec §4.4).
#[derive(Debug, Clone, Default)]
pub struct CFunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub start_label: String,
    pub blocks: Vec<(String, Vec<CStmt>)>,
}

impl CFunctionDef {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        let name = name.into();
        let start_label = format!("{name}start");
        Self {
            name,
            params,
            start_label,
            blocks: Vec::new(),
        }
    }

    pub fn block_mut(&mut self, label: &str) -> &mut Vec<CStmt> {
        if let Some(pos) = self.blocks.iter().position(|(l, _)| l == label) {
            &mut self.blocks[pos].1
        } else {
            self.blocks.push((label.to_string(), Vec::new()));
            &mut self.blocks.last_mut().unwrap().1
        }
    }

    pub fn push(&mut self, label: &str, stmt: CStmt) {
        self.block_mut(label).push(stmt);
    }

    pub fn block(&self, label: &str) -> Option<&[CStmt]> {
        self.blocks
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, s)| s.as_slice())
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|(l, _)| l.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CProgram {
    pub functions: Vec<CFunctionDef>,
}
