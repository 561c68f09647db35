//! Explicate control (spec §4.4): turn the (now RCO'd and
//! record-eliminated) `L` statement trees into `C`'s per-function block
//! maps, with `Goto`/`If`/`Return` terminators. A tail-position
//! traversal threads a single "current block" label; control-flow
//! statements open fresh blocks and return the label execution
//! continues at afterward.
//!
//! Top-level statements (anything outside a `FunctionDef`) become the
//! implicit `main` function's body.

use rivetc_parser::ast::{Expr, Param, Program, Stmt};

use crate::cfg::{Atom, CExpr, CFunctionDef, CProgram, CStmt};
use crate::context::CompileContext;
use crate::error::{LowerError, LowerResult};

pub fn explicate_control(program: &Program, ctx: &mut CompileContext) -> LowerResult<CProgram> {
    let mut functions = Vec::new();
    let mut main_stmts = Vec::new();

    for stmt in &program.stmts {
        match stmt {
            Stmt::FunctionDef { .. } => functions.push(explicate_function(stmt, ctx)?),
            Stmt::ClassDef { .. } => {
                return Err(LowerError::Malformed(
                    "a ClassDef survived into explicate-control".to_string(),
                ))
            }
            other => main_stmts.push(other.clone()),
        }
    }

    functions.push(explicate_body("main", &[], &main_stmts, ctx)?);
    Ok(CProgram { functions })
}

fn explicate_function(stmt: &Stmt, ctx: &mut CompileContext) -> LowerResult<CFunctionDef> {
    match stmt {
        Stmt::FunctionDef { name, params, body, .. } => explicate_body(name, params, body, ctx),
        other => Err(LowerError::Malformed(format!("expected a FunctionDef, found {other:?}"))),
    }
}

fn explicate_body(
    name: &str,
    params: &[Param],
    body: &[Stmt],
    ctx: &mut CompileContext,
) -> LowerResult<CFunctionDef> {
    let mut f = CFunctionDef::new(name, params.iter().map(|p| p.name.clone()).collect());
    let start = f.start_label.clone();
    let last = explicate_stmts(body, start, &mut f, ctx)?;
    ensure_terminated(&mut f, &last);
    Ok(f)
}

/// After explicating a body, the final open block defensively returns
/// `0` unless control already left it via a `Goto`/`If`/`Return` (spec
/// §4.4's "defensive tail").
fn ensure_terminated(f: &mut CFunctionDef, label: &str) {
    let terminated = f
        .block(label)
        .and_then(|b| b.last())
        .map(|s| matches!(s, CStmt::Goto(_) | CStmt::If(..) | CStmt::Return(_)))
        .unwrap_or(false);
    if !terminated {
        f.push(label, CStmt::Return(Atom::Const(0)));
    }
}

fn explicate_stmts(
    stmts: &[Stmt],
    mut current: String,
    f: &mut CFunctionDef,
    ctx: &mut CompileContext,
) -> LowerResult<String> {
    for stmt in stmts {
        current = explicate_stmt(stmt, current, f, ctx)?;
    }
    Ok(current)
}

fn explicate_stmt(
    stmt: &Stmt,
    current: String,
    f: &mut CFunctionDef,
    ctx: &mut CompileContext,
) -> LowerResult<String> {
    match stmt {
        Stmt::Assign(name, expr) => {
            f.push(&current, CStmt::Assign(name.clone(), to_cexpr(expr)?));
            Ok(current)
        }
        Stmt::Print(expr) => {
            f.push(&current, CStmt::Print(to_atom(expr)?));
            Ok(current)
        }
        Stmt::Return(expr) => {
            f.push(&current, CStmt::Return(to_atom(expr)?));
            Ok(current)
        }
        Stmt::If(cond, thn, els) => {
            let then_label = ctx.fresh("block");
            let else_label = ctx.fresh("block");
            let cont_label = ctx.fresh("block");

            let then_end = explicate_stmts(thn, then_label.clone(), f, ctx)?;
            ensure_terminated_with_goto(f, &then_end, &cont_label);

            let else_end = explicate_stmts(els, else_label.clone(), f, ctx)?;
            ensure_terminated_with_goto(f, &else_end, &cont_label);

            let cond_atom = to_atom(cond)?;
            f.push(&current, CStmt::If(cond_atom, then_label, else_label));
            Ok(cont_label)
        }
        Stmt::While(cond, body) => {
            let test_label = ctx.fresh("block");
            let body_label = ctx.fresh("block");
            let cont_label = ctx.fresh("block");

            let body_end = explicate_stmts(body, body_label.clone(), f, ctx)?;
            ensure_terminated_with_goto(f, &body_end, &test_label);

            let (cond_setup, cond_atom) = split_condition(cond)?;
            let test_end = explicate_stmts(&cond_setup, test_label.clone(), f, ctx)?;
            f.push(&test_end, CStmt::If(cond_atom, body_label, cont_label.clone()));

            f.push(&current, CStmt::Goto(test_label));
            Ok(cont_label)
        }
        Stmt::FunctionDef { .. } => Err(LowerError::Malformed(
            "nested FunctionDef is not supported; functions must be top-level".to_string(),
        )),
        Stmt::ClassDef { .. } => Err(LowerError::Malformed(
            "a ClassDef survived into explicate-control".to_string(),
        )),
    }
}

/// `If`/`While` branch bodies fall through to the continuation block
/// unless they already ended in their own terminator (e.g. a nested
/// `If` that closed the block with a `Goto` of its own).
fn ensure_terminated_with_goto(f: &mut CFunctionDef, label: &str, target: &str) {
    let terminated = f
        .block(label)
        .and_then(|b| b.last())
        .map(|s| matches!(s, CStmt::Goto(_) | CStmt::If(..) | CStmt::Return(_)))
        .unwrap_or(false);
    if !terminated {
        f.push(label, CStmt::Goto(target.to_string()));
    }
}

fn split_condition(cond: &Expr) -> LowerResult<(Vec<Stmt>, Atom)> {
    match cond {
        Expr::Begin(stmts, atom) => Ok((stmts.clone(), to_atom(atom)?)),
        other => Ok((Vec::new(), to_atom(other)?)),
    }
}

fn to_atom(expr: &Expr) -> LowerResult<Atom> {
    match expr {
        Expr::Var(name) => Ok(Atom::Var(name.clone())),
        Expr::ConstInt(n) => Ok(Atom::Const(*n)),
        Expr::ConstBool(b) => Ok(Atom::ConstBool(*b)),
        other => Err(LowerError::Malformed(format!(
            "expected an atom after remove-complex-operands, found {other:?}"
        ))),
    }
}

fn to_cexpr(expr: &Expr) -> LowerResult<CExpr> {
    match expr {
        Expr::Var(_) | Expr::ConstInt(_) | Expr::ConstBool(_) => Ok(CExpr::Atom(to_atom(expr)?)),
        Expr::Prim(op, args) => {
            let atoms = args.iter().map(to_atom).collect::<LowerResult<Vec<_>>>()?;
            Ok(CExpr::Prim(*op, atoms))
        }
        Expr::Call(callee, args) => {
            let callee_atom = to_atom(callee)?;
            let atoms = args.iter().map(to_atom).collect::<LowerResult<Vec<_>>>()?;
            Ok(CExpr::Call(callee_atom, atoms))
        }
        other => Err(LowerError::Malformed(format!(
            "non-atomic, non-primitive expression survived into explicate-control: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::eliminate_records::eliminate_records;
    use crate::passes::rco::remove_complex_operands;
    use crate::passes::typecheck::typecheck_program;
    use rivetc_parser::parse;

    fn explicate(src: &str) -> LowerResult<CProgram> {
        let program = parse(src).unwrap();
        let mut ctx = CompileContext::new();
        typecheck_program(&program, &mut ctx, false).unwrap();
        let program = remove_complex_operands(&program, &mut ctx);
        let program = eliminate_records(&program, &mut ctx)?;
        typecheck_program(&program, &mut ctx, true).unwrap();
        explicate_control(&program, &mut ctx)
    }

    #[test]
    fn straight_line_code_stays_in_one_block() {
        let c = explicate("x = 1; print(x + 1);").unwrap();
        let main = c.functions.iter().find(|f| f.name == "main").unwrap();
        assert_eq!(main.blocks.len(), 1);
        assert!(matches!(main.block(&main.start_label).unwrap().last(), Some(CStmt::Return(_))));
    }

    #[test]
    fn if_creates_three_new_blocks() {
        let c = explicate("x = 1; if x == 1 { print(1); } else { print(2); }").unwrap();
        let main = c.functions.iter().find(|f| f.name == "main").unwrap();
        // start + then + else + cont
        assert_eq!(main.blocks.len(), 4);
        let start_block = main.block(&main.start_label).unwrap();
        assert!(matches!(start_block.last(), Some(CStmt::If(..))));
    }

    #[test]
    fn while_loop_has_test_body_and_cont_blocks() {
        let c = explicate("x = 0; while x < 3 { x = x + 1; }").unwrap();
        let main = c.functions.iter().find(|f| f.name == "main").unwrap();
        assert_eq!(main.blocks.len(), 4);
    }

    #[test]
    fn every_block_ends_in_a_single_terminator() {
        let c = explicate("x = 0; while x < 3 { if x == 1 { x = x + 1; } else { x = x + 2; } }").unwrap();
        for f in &c.functions {
            for (label, stmts) in &f.blocks {
                let terminators = stmts
                    .iter()
                    .filter(|s| matches!(s, CStmt::Goto(_) | CStmt::If(..) | CStmt::Return(_)))
                    .count();
                assert_eq!(terminators, 1, "block {label} has {terminators} terminators");
                assert!(matches!(
                    stmts.last(),
                    Some(CStmt::Goto(_)) | Some(CStmt::If(..)) | Some(CStmt::Return(_))
                ));
            }
        }
    }

    #[test]
    fn function_def_becomes_its_own_c_function() {
        let c = explicate("def id(n: int) -> int { return n; } print(id(5));").unwrap();
        assert!(c.functions.iter().any(|f| f.name == "id"));
        let idf = c.functions.iter().find(|f| f.name == "id").unwrap();
        assert_eq!(idf.start_label, "idstart");
    }
}
