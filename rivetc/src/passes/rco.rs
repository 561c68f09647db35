//! Remove Complex Operands (spec §4.2): hoist every non-atomic
//! subexpression into a fresh `Assign(gensym('tmp'), ...)` placed
//! immediately before the statement that used it. Atoms are `Var`,
//! `ConstInt`, and `ConstBool`.

use rivetc_parser::ast::{Expr, Program, Stmt};

use crate::context::CompileContext;

pub fn remove_complex_operands(program: &Program, ctx: &mut CompileContext) -> Program {
    Program {
        stmts: rco_stmts(&program.stmts, ctx),
    }
}

fn rco_stmts(stmts: &[Stmt], ctx: &mut CompileContext) -> Vec<Stmt> {
    stmts.iter().flat_map(|s| rco_stmt(s, ctx)).collect()
}

fn is_atom(expr: &Expr) -> bool {
    matches!(expr, Expr::Var(_) | Expr::ConstInt(_) | Expr::ConstBool(_))
}

/// Atomizes `expr`: returns the setup statements that must run first,
/// plus an atomic `Expr` standing in for its value.
fn atomize(expr: &Expr, ctx: &mut CompileContext) -> (Vec<Stmt>, Expr) {
    let (mut setup, e) = rco_expr(expr, ctx);
    if is_atom(&e) {
        (setup, e)
    } else {
        let tmp = ctx.fresh("tmp");
        setup.push(Stmt::Assign(tmp.clone(), e));
        (setup, Expr::Var(tmp))
    }
}

/// Atomizes every subexpression of `expr` but leaves its own top level
/// as-is (it may still be a `Prim`/`Call`/`FieldRef`, just one whose
/// arguments are now all atomic).
fn rco_expr(expr: &Expr, ctx: &mut CompileContext) -> (Vec<Stmt>, Expr) {
    match expr {
        Expr::Var(_) | Expr::ConstInt(_) | Expr::ConstBool(_) => (Vec::new(), expr.clone()),
        Expr::Prim(op, args) => {
            let mut setup = Vec::new();
            let mut new_args = Vec::with_capacity(args.len());
            for arg in args {
                let (s, atom) = atomize(arg, ctx);
                setup.extend(s);
                new_args.push(atom);
            }
            (setup, Expr::Prim(*op, new_args))
        }
        Expr::Call(callee, args) => {
            let mut setup = Vec::new();
            let (callee_setup, callee_atom) = atomize(callee, ctx);
            setup.extend(callee_setup);
            let mut new_args = Vec::with_capacity(args.len());
            for arg in args {
                let (s, atom) = atomize(arg, ctx);
                setup.extend(s);
                new_args.push(atom);
            }
            (setup, Expr::Call(Box::new(callee_atom), new_args))
        }
        Expr::FieldRef(obj, field) => {
            let (setup, obj_atom) = atomize(obj, ctx);
            (setup, Expr::FieldRef(Box::new(obj_atom), field.clone()))
        }
        Expr::Begin(stmts, tail) => {
            let mut setup = rco_stmts(stmts, ctx);
            let (tail_setup, tail_atom) = atomize(tail, ctx);
            setup.extend(tail_setup);
            (setup, tail_atom)
        }
    }
}

fn rco_stmt(stmt: &Stmt, ctx: &mut CompileContext) -> Vec<Stmt> {
    match stmt {
        Stmt::Assign(name, expr) => {
            let (mut setup, rhs) = rco_expr(expr, ctx);
            setup.push(Stmt::Assign(name.clone(), rhs));
            setup
        }
        Stmt::Print(expr) => {
            let (mut setup, atom) = atomize(expr, ctx);
            setup.push(Stmt::Print(atom));
            setup
        }
        Stmt::Return(expr) => {
            let (mut setup, atom) = atomize(expr, ctx);
            setup.push(Stmt::Return(atom));
            setup
        }
        Stmt::If(cond, thn, els) => {
            let (mut setup, cond_atom) = atomize(cond, ctx);
            setup.push(Stmt::If(cond_atom, rco_stmts(thn, ctx), rco_stmts(els, ctx)));
            setup
        }
        Stmt::While(cond, body) => {
            let (cond_setup, cond_atom) = atomize(cond, ctx);
            let body = rco_stmts(body, ctx);
            // The setup must be re-run on every iteration, so it travels
            // with the condition as a `Begin` rather than running once
            // before the loop (spec §4.2's contract for `While`).
            let wrapped_cond = if cond_setup.is_empty() {
                cond_atom
            } else {
                Expr::Begin(cond_setup, Box::new(cond_atom))
            };
            vec![Stmt::While(wrapped_cond, body)]
        }
        Stmt::FunctionDef {
            name,
            params,
            body,
            ret,
        } => vec![Stmt::FunctionDef {
            name: name.clone(),
            params: params.clone(),
            body: rco_stmts(body, ctx),
            ret: ret.clone(),
        }],
        Stmt::ClassDef { .. } => vec![stmt.clone()],
    }
}
