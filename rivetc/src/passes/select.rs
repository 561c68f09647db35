//! Select instructions (spec §4.5): lower each `C` statement to a short
//! pseudo-x86 sequence over symbolic `Var`s, per function. Register
//! allocation, patching, and prelude/conclusion all run afterward.

use rivetc_parser::ast::PrimOp;

use crate::cfg::{Atom, CExpr, CFunctionDef, CProgram, CStmt};
use crate::constants::{ARGUMENT_REGISTERS, CALLER_SAVED_REGISTERS};
use crate::context::CompileContext;
use crate::error::{LowerError, LowerResult};
use crate::types::Type;
use crate::xasm::{Arg, CondCode, Instr, Reg, XFunctionDef, XProgram};

pub fn select_instructions(program: &CProgram, ctx: &CompileContext) -> LowerResult<XProgram> {
    let mut functions = Vec::with_capacity(program.functions.len());
    for f in &program.functions {
        functions.push(select_function(f, ctx)?);
    }
    Ok(XProgram { functions })
}

fn select_function(f: &CFunctionDef, ctx: &CompileContext) -> LowerResult<XFunctionDef> {
    let mut xf = XFunctionDef::new(f.name.clone(), f.params.clone());
    for (label, stmts) in &f.blocks {
        let mut instrs = Vec::new();
        if *label == f.start_label {
            for (i, param) in f.params.iter().enumerate() {
                let argreg = ARGUMENT_REGISTERS.get(i).copied().ok_or_else(|| {
                    LowerError::Malformed(format!(
                        "function `{}` takes more than {} parameters",
                        f.name,
                        ARGUMENT_REGISTERS.len()
                    ))
                })?;
                instrs.push(Instr::Movq(Arg::Reg(argreg), Arg::Var(param.clone())));
            }
        }
        for stmt in stmts {
            select_stmt(stmt, f, ctx, &mut instrs)?;
        }
        xf.push_block(label.clone(), instrs);
    }
    Ok(xf)
}

fn select_stmt(stmt: &CStmt, f: &CFunctionDef, ctx: &CompileContext, out: &mut Vec<Instr>) -> LowerResult<()> {
    match stmt {
        CStmt::Assign(x, expr) => select_assign(x, expr, ctx, out),
        CStmt::Print(atom) => {
            out.push(Instr::Movq(atom_arg(atom), Arg::Reg(Reg::Rdi)));
            out.push(Instr::Callq("print_int".to_string()));
            Ok(())
        }
        CStmt::Return(atom) => {
            out.push(Instr::Movq(atom_arg(atom), Arg::Reg(Reg::Rax)));
            out.push(Instr::Jmp(format!("{}conclusion", f.name)));
            Ok(())
        }
        CStmt::Goto(label) => {
            out.push(Instr::Jmp(label.clone()));
            Ok(())
        }
        CStmt::If(atom, t, e) => {
            out.push(Instr::Cmpq(atom_arg(atom), Arg::Imm(1)));
            out.push(Instr::JmpIf(CondCode::E, t.clone()));
            out.push(Instr::Jmp(e.clone()));
            Ok(())
        }
    }
}

fn select_assign(x: &str, expr: &CExpr, ctx: &CompileContext, out: &mut Vec<Instr>) -> LowerResult<()> {
    match expr {
        CExpr::Atom(Atom::Var(name)) if ctx.is_function(name) => {
            out.push(Instr::Leaq(Arg::GlobalVal(name.clone()), Arg::Var(x.to_string())));
            Ok(())
        }
        CExpr::Atom(atom) => {
            out.push(Instr::Movq(atom_arg(atom), Arg::Var(x.to_string())));
            Ok(())
        }
        CExpr::Call(callee, args) => select_call(x, callee, args, ctx, out),
        CExpr::Prim(PrimOp::Tuple, args) => select_tuple(x, args, ctx, out),
        CExpr::Prim(PrimOp::Subscript, args) => select_subscript(x, args, out),
        CExpr::Prim(PrimOp::Not, args) => select_not(x, args, out),
        CExpr::Prim(op, args) if is_binary_arith(*op) => select_binary_arith(x, *op, args, out),
        CExpr::Prim(op, args) if op.is_comparison() => select_comparison(x, *op, args, out),
        CExpr::Prim(op, _) => Err(LowerError::Malformed(format!(
            "primitive `{}` has no instruction-selection rule",
            op.name()
        ))),
    }
}

fn select_call(x: &str, callee: &Atom, args: &[Atom], ctx: &CompileContext, out: &mut Vec<Instr>) -> LowerResult<()> {
    if args.len() > ARGUMENT_REGISTERS.len() {
        return Err(LowerError::Malformed(format!(
            "call with {} arguments exceeds the {} available argument registers",
            args.len(),
            ARGUMENT_REGISTERS.len()
        )));
    }
    for reg in CALLER_SAVED_REGISTERS {
        out.push(Instr::Pushq(Arg::Reg(reg)));
    }
    for (arg, reg) in args.iter().zip(ARGUMENT_REGISTERS.iter()) {
        out.push(Instr::Movq(atom_arg(arg), Arg::Reg(*reg)));
    }
    match callee {
        Atom::Var(name) if ctx.is_function(name) => out.push(Instr::Callq(name.clone())),
        other => out.push(Instr::IndirectCallq(atom_arg(other))),
    }
    for reg in CALLER_SAVED_REGISTERS.iter().rev() {
        out.push(Instr::Popq(Arg::Reg(*reg)));
    }
    out.push(Instr::Movq(Arg::Reg(Reg::Rax), Arg::Var(x.to_string())));
    Ok(())
}

fn select_tuple(x: &str, args: &[Atom], ctx: &CompileContext, out: &mut Vec<Instr>) -> LowerResult<()> {
    let ty = ctx
        .tuple_var_types
        .get(x)
        .cloned()
        .ok_or_else(|| LowerError::Malformed(format!("`{x}` holds a tuple but has no recorded type")))?;
    let field_types = match &ty {
        Type::Tuple(items) => items.clone(),
        Type::Record(_, fields) => fields.iter().map(|(_, t)| t.clone()).collect(),
        other => {
            return Err(LowerError::Malformed(format!(
                "`{x}`'s recorded type {other} is not a tuple"
            )))
        }
    };

    let n = args.len();
    let mut pointer_mask: u64 = 0;
    for (i, field_ty) in field_types.iter().enumerate() {
        if field_ty.is_tuple() {
            pointer_mask |= 1 << i;
        }
    }
    let tag = encode_vector_tag(n as u32, pointer_mask);

    out.push(Instr::Movq(Arg::Imm(8 * (1 + n as i64)), Arg::Reg(Reg::Rdi)));
    out.push(Instr::Callq("allocate".to_string()));
    out.push(Instr::Movq(Arg::Reg(Reg::Rax), Arg::Reg(Reg::R11)));
    out.push(Instr::Movq(Arg::Imm(tag), Arg::Deref(Reg::R11, 0)));
    for (i, arg) in args.iter().enumerate() {
        out.push(Instr::Movq(atom_arg(arg), Arg::Deref(Reg::R11, 8 * (i as i64 + 1))));
    }
    out.push(Instr::Movq(Arg::Reg(Reg::R11), Arg::Var(x.to_string())));
    Ok(())
}

fn select_subscript(x: &str, args: &[Atom], out: &mut Vec<Instr>) -> LowerResult<()> {
    let (obj, index) = match args {
        [obj, Atom::Const(i)] => (obj, *i),
        _ => {
            return Err(LowerError::Malformed(
                "`subscript` requires exactly [object, const index]".to_string(),
            ))
        }
    };
    out.push(Instr::Movq(atom_arg(obj), Arg::Reg(Reg::R11)));
    out.push(Instr::Movq(Arg::Deref(Reg::R11, 8 * (index + 1)), Arg::Var(x.to_string())));
    Ok(())
}

fn select_binary_arith(x: &str, op: PrimOp, args: &[Atom], out: &mut Vec<Instr>) -> LowerResult<()> {
    let (a, b) = two(args)?;
    out.push(Instr::Movq(atom_arg(a), Arg::Reg(Reg::Rax)));
    let op_instr = match op {
        PrimOp::Add => Instr::Addq(atom_arg(b), Arg::Reg(Reg::Rax)),
        PrimOp::Sub => Instr::Subq(atom_arg(b), Arg::Reg(Reg::Rax)),
        PrimOp::Mult => Instr::Imulq(atom_arg(b), Arg::Reg(Reg::Rax)),
        PrimOp::And => Instr::Andq(atom_arg(b), Arg::Reg(Reg::Rax)),
        PrimOp::Or => Instr::Orq(atom_arg(b), Arg::Reg(Reg::Rax)),
        _ => unreachable!("guarded by is_binary_arith"),
    };
    out.push(op_instr);
    out.push(Instr::Movq(Arg::Reg(Reg::Rax), Arg::Var(x.to_string())));
    Ok(())
}

fn is_binary_arith(op: PrimOp) -> bool {
    matches!(op, PrimOp::Add | PrimOp::Sub | PrimOp::Mult | PrimOp::And | PrimOp::Or)
}

fn select_comparison(x: &str, op: PrimOp, args: &[Atom], out: &mut Vec<Instr>) -> LowerResult<()> {
    let (a, b) = two(args)?;
    let cc = match op {
        PrimOp::Eq => CondCode::E,
        PrimOp::Gt => CondCode::G,
        PrimOp::Gte => CondCode::Ge,
        PrimOp::Lt => CondCode::L,
        PrimOp::Lte => CondCode::Le,
        _ => unreachable!("guarded by PrimOp::is_comparison"),
    };
    // x86 `cmpq src, dst` computes `dst - src`; passing `(b, a)` makes
    // `a` the destination, so the flags reflect `a OP b` (spec §4.5).
    out.push(Instr::Cmpq(atom_arg(b), atom_arg(a)));
    out.push(Instr::Set(cc, Arg::ByteReg(Reg::Rax)));
    out.push(Instr::Movzbq(Arg::ByteReg(Reg::Rax), Arg::Var(x.to_string())));
    Ok(())
}

fn select_not(x: &str, args: &[Atom], out: &mut Vec<Instr>) -> LowerResult<()> {
    let a = match args {
        [a] => a,
        _ => return Err(LowerError::Malformed("`not` takes exactly one argument".to_string())),
    };
    out.push(Instr::Movq(atom_arg(a), Arg::Var(x.to_string())));
    out.push(Instr::Xorq(Arg::Imm(1), Arg::Var(x.to_string())));
    Ok(())
}

fn two(args: &[Atom]) -> LowerResult<(&Atom, &Atom)> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(LowerError::Malformed(format!(
            "expected exactly two operands, found {}",
            args.len()
        ))),
    }
}

fn atom_arg(atom: &Atom) -> Arg {
    match atom {
        Atom::Var(name) => Arg::Var(name.clone()),
        Atom::Const(n) => Arg::Imm(*n),
        Atom::ConstBool(b) => Arg::Imm(if *b { 1 } else { 0 }),
    }
}

/// Mirrors `rivetc_runtime::heap::encode_tag`'s bit layout (spec §4.5):
/// bit 0 is the forwarding/live flag, bits 1..6 the field count, bits
/// 7.. the pointer mask. Reimplemented here rather than taking a
/// dependency on the runtime crate, since this is a compile-time
/// computation over a value embedded as an immediate in the emitted
/// assembly, not a runtime operation.
fn encode_vector_tag(length: u32, pointer_mask: u64) -> i64 {
    let mut tag: i64 = 1;
    tag |= (i64::from(length) & 0x3f) << 1;
    tag |= (pointer_mask as i64) << 7;
    tag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::eliminate_records::eliminate_records;
    use crate::passes::explicate::explicate_control;
    use crate::passes::rco::remove_complex_operands;
    use crate::passes::typecheck::typecheck_program;
    use rivetc_parser::parse;

    fn select(src: &str) -> LowerResult<XProgram> {
        let program = parse(src).unwrap();
        let mut ctx = CompileContext::new();
        typecheck_program(&program, &mut ctx, false).unwrap();
        let program = remove_complex_operands(&program, &mut ctx);
        let program = eliminate_records(&program, &mut ctx)?;
        typecheck_program(&program, &mut ctx, true).unwrap();
        let cprogram = explicate_control(&program, &mut ctx)?;
        select_instructions(&cprogram, &ctx)
    }

    #[test]
    fn print_lowers_to_rdi_load_and_call() {
        let x = select("print(42);").unwrap();
        let main = x.functions.iter().find(|f| f.name == "main").unwrap();
        let start = main.block("mainstart").unwrap();
        assert!(start.contains(&Instr::Movq(Arg::Imm(42), Arg::Reg(Reg::Rdi))));
        assert!(start.contains(&Instr::Callq("print_int".to_string())));
    }

    #[test]
    fn addition_uses_rax_as_scratch() {
        let x = select("print(1 + 2);").unwrap();
        let main = x.functions.iter().find(|f| f.name == "main").unwrap();
        let start = main.block("mainstart").unwrap();
        assert!(start.iter().any(|i| matches!(i, Instr::Addq(_, Arg::Reg(Reg::Rax)))));
    }

    #[test]
    fn comparison_sets_then_zero_extends() {
        let x = select("x = 1; print(x < 2);").unwrap();
        let main = x.functions.iter().find(|f| f.name == "main").unwrap();
        let start = main.block("mainstart").unwrap();
        assert!(start
            .iter()
            .any(|i| matches!(i, Instr::Set(CondCode::L, Arg::ByteReg(Reg::Rax)))));
        assert!(start
            .iter()
            .any(|i| matches!(i, Instr::Movzbq(Arg::ByteReg(Reg::Rax), _))));
    }

    #[test]
    fn record_construction_allocates_and_tags() {
        let src = "class Point { x: int; y: int; } p = Point(1, 2); print(p.x);";
        let x = select(src).unwrap();
        let main = x.functions.iter().find(|f| f.name == "main").unwrap();
        let start = main.block("mainstart").unwrap();
        assert!(start.contains(&Instr::Callq("allocate".to_string())));
        // tag for 2 plain-int fields: forwarding bit | length=2 << 1, no pointer bits.
        let expected_tag = 1 | (2 << 1);
        assert!(start.contains(&Instr::Movq(Arg::Imm(expected_tag), Arg::Deref(Reg::R11, 0))));
    }

    #[test]
    fn field_access_reads_offset_from_index() {
        let src = "class Point { x: int; y: int; } p = Point(1, 2); print(p.y);";
        let x = select(src).unwrap();
        let main = x.functions.iter().find(|f| f.name == "main").unwrap();
        let start = main.block("mainstart").unwrap();
        assert!(start
            .iter()
            .any(|i| matches!(i, Instr::Movq(Arg::Deref(Reg::R11, 16), _))));
    }

    #[test]
    fn function_call_saves_caller_registers_around_it() {
        let src = "def id(n: int) -> int { return n; } print(id(5));";
        let x = select(src).unwrap();
        let main = x.functions.iter().find(|f| f.name == "main").unwrap();
        let start = main.block("mainstart").unwrap();
        let pushes = start.iter().filter(|i| matches!(i, Instr::Pushq(_))).count();
        let pops = start.iter().filter(|i| matches!(i, Instr::Popq(_))).count();
        assert_eq!(pushes, CALLER_SAVED_REGISTERS.len());
        assert_eq!(pops, CALLER_SAVED_REGISTERS.len());
        assert!(start.contains(&Instr::Callq("id".to_string())));
    }
}
