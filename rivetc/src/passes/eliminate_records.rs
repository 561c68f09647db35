//! Eliminate-records (spec §4.3): rewrite nominal records into the
//! positional tuples they're laid out as, so everything downstream only
//! ever has to deal with `Prim('tuple', ...)`/`Prim('subscript', ...)`.
//!
//! `ClassDef` statements are dropped; `ctx.record_types` (populated by
//! the first typecheck pass) is the only thing that still remembers
//! field names and order from here on. This pass carries its own
//! `Type::Record`-shaped environment rather than reusing the caller's,
//! since it needs the nominal field layout to resolve `FieldRef` — the
//! second typecheck pass, run after this one, is what actually wants
//! the tuple-shaped view (spec §9: `as_tuple` only matters there).

use std::collections::HashMap;

use rivetc_parser::ast::{Expr, PrimOp, Program, Stmt};

use crate::context::CompileContext;
use crate::error::{LowerError, LowerResult};
use crate::passes::typecheck::resolve_annotation;
use crate::types::Type;

pub fn eliminate_records(program: &Program, ctx: &mut CompileContext) -> LowerResult<Program> {
    let mut env = HashMap::new();
    Ok(Program {
        stmts: elim_stmts(&program.stmts, ctx, &mut env)?,
    })
}

fn elim_stmts(
    stmts: &[Stmt],
    ctx: &mut CompileContext,
    env: &mut HashMap<String, Type>,
) -> LowerResult<Vec<Stmt>> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        if matches!(stmt, Stmt::ClassDef { .. }) {
            continue;
        }
        out.push(elim_stmt(stmt, ctx, env)?);
    }
    Ok(out)
}

fn elim_stmt(stmt: &Stmt, ctx: &mut CompileContext, env: &mut HashMap<String, Type>) -> LowerResult<Stmt> {
    match stmt {
        Stmt::Assign(name, expr) => {
            let (ty, e) = elim_expr(expr, ctx, env)?;
            if ty.is_tuple() {
                ctx.tuple_var_types.insert(name.clone(), ty.clone());
            }
            env.insert(name.clone(), ty);
            Ok(Stmt::Assign(name.clone(), e))
        }
        Stmt::Print(expr) => Ok(Stmt::Print(elim_expr(expr, ctx, env)?.1)),
        Stmt::Return(expr) => Ok(Stmt::Return(elim_expr(expr, ctx, env)?.1)),
        Stmt::If(cond, thn, els) => {
            let (_, cond_e) = elim_expr(cond, ctx, env)?;
            let thn2 = elim_stmts(thn, ctx, env)?;
            let els2 = elim_stmts(els, ctx, env)?;
            Ok(Stmt::If(cond_e, thn2, els2))
        }
        Stmt::While(cond, body) => {
            let (_, cond_e) = elim_expr(cond, ctx, env)?;
            let body2 = elim_stmts(body, ctx, env)?;
            Ok(Stmt::While(cond_e, body2))
        }
        Stmt::FunctionDef { name, params, body, ret } => {
            let param_types = params
                .iter()
                .map(|p| resolve_annotation(&p.ty, ctx, false))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| LowerError::Malformed(e.to_string()))?;
            let ret_ty = resolve_annotation(ret, ctx, false).map_err(|e| LowerError::Malformed(e.to_string()))?;

            // Bind the function's own name before its body so recursive
            // calls (and sibling calls ordered either way, since the
            // first typecheck pass already validated the whole program)
            // resolve in `elim_expr` the same way a plain function
            // reference does.
            env.insert(name.clone(), Type::Callable(param_types.clone(), Box::new(ret_ty.clone())));

            let mut body_env = env.clone();
            for (p, ty) in params.iter().zip(&param_types) {
                body_env.insert(p.name.clone(), ty.clone());
                if ty.is_tuple() {
                    ctx.tuple_var_types.insert(p.name.clone(), ty.clone());
                }
            }
            let body2 = elim_stmts(body, ctx, &mut body_env)?;
            Ok(Stmt::FunctionDef {
                name: name.clone(),
                params: params.clone(),
                body: body2,
                ret: ret.clone(),
            })
        }
        Stmt::ClassDef { .. } => unreachable!("filtered out by elim_stmts"),
    }
}

/// Lowers `expr`, returning both the rewritten expression and its type
/// (needed by the caller to resolve a later `FieldRef`/`Assign`).
fn elim_expr(expr: &Expr, ctx: &mut CompileContext, env: &HashMap<String, Type>) -> LowerResult<(Type, Expr)> {
    match expr {
        Expr::ConstInt(_) => Ok((Type::Int, expr.clone())),
        Expr::ConstBool(_) => Ok((Type::Bool, expr.clone())),
        Expr::Var(name) => {
            let ty = env
                .get(name)
                .cloned()
                .ok_or_else(|| LowerError::Malformed(format!("undefined variable `{name}` during elimination")))?;
            Ok((ty, expr.clone()))
        }
        Expr::Prim(op, args) => {
            let mut new_args = Vec::with_capacity(args.len());
            let mut arg_types = Vec::with_capacity(args.len());
            for a in args {
                let (t, e) = elim_expr(a, ctx, env)?;
                arg_types.push(t);
                new_args.push(e);
            }
            let result_ty = match op {
                PrimOp::Add | PrimOp::Sub | PrimOp::Mult => Type::Int,
                PrimOp::And | PrimOp::Or | PrimOp::Not => Type::Bool,
                PrimOp::Eq | PrimOp::Gt | PrimOp::Gte | PrimOp::Lt | PrimOp::Lte => Type::Bool,
                PrimOp::Tuple => Type::Tuple(arg_types),
                PrimOp::Subscript => {
                    unreachable!("subscript is introduced by this pass, never present beforehand")
                }
            };
            Ok((result_ty, Expr::Prim(*op, new_args)))
        }
        Expr::Call(callee, args) => {
            let name = match &**callee {
                Expr::Var(n) => n.clone(),
                other => return Err(LowerError::Malformed(format!("unsupported call target {other:?}"))),
            };

            if let Some(record) = ctx.record_types.get(&name).cloned() {
                let fields = record.record_fields().expect("record_types only holds Record").to_vec();
                if args.is_empty() && !fields.is_empty() {
                    return Err(LowerError::EmptyRecordFieldAssign { name });
                }
                let mut new_args = Vec::with_capacity(args.len());
                for a in args {
                    let (_, e) = elim_expr(a, ctx, env)?;
                    new_args.push(e);
                }
                return Ok((record, Expr::Prim(PrimOp::Tuple, new_args)));
            }

            let (callee_ty, callee_e) = elim_expr(callee, ctx, env)?;
            let mut new_args = Vec::with_capacity(args.len());
            for a in args {
                let (_, e) = elim_expr(a, ctx, env)?;
                new_args.push(e);
            }
            let ret_ty = match callee_ty {
                Type::Callable(_, ret) => *ret,
                other => return Err(LowerError::Malformed(format!("call target has non-callable type {other}"))),
            };
            Ok((ret_ty, Expr::Call(Box::new(callee_e), new_args)))
        }
        Expr::FieldRef(obj, field) => {
            let (obj_ty, obj_e) = elim_expr(obj, ctx, env)?;
            let index = obj_ty.field_index(field).ok_or_else(|| {
                LowerError::Malformed(format!("no such field `{field}` on {obj_ty}"))
            })?;
            let field_ty = obj_ty.record_fields().expect("checked by field_index above")[index]
                .1
                .clone();
            Ok((
                field_ty,
                Expr::Prim(PrimOp::Subscript, vec![obj_e, Expr::ConstInt(index as i64)]),
            ))
        }
        Expr::Begin(stmts, tail) => {
            let mut inner_env = env.clone();
            let new_stmts = elim_stmts(stmts, ctx, &mut inner_env)?;
            let (tail_ty, tail_e) = elim_expr(tail, ctx, &inner_env)?;
            Ok((tail_ty, Expr::Begin(new_stmts, Box::new(tail_e))))
        }
    }
}
