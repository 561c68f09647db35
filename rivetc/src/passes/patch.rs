//! Patch instructions (spec §4.7): after the allocator has rewritten
//! every `Var` to a real home, split the operand shapes x86 forbids.
//! Two cases (spec lists no others as reachable from select-instructions'
//! output):
//!
//!   - `Cmpq(_, Imm(i))` — `cmpq`'s second operand can't be an
//!     immediate; materialize it in `rax` first.
//!   - `Movq/Movzbq/Addq(mem, mem)` — no x86 instruction takes two
//!     memory operands; materialize the source in `rax` first.

use crate::xasm::{Arg, Instr, XFunctionDef, XProgram};

pub fn patch_instructions(program: &mut XProgram) {
    for f in &mut program.functions {
        patch_function(f);
    }
}

fn patch_function(f: &mut XFunctionDef) {
    for (_, instrs) in &mut f.blocks {
        let mut patched = Vec::with_capacity(instrs.len());
        for instr in instrs.drain(..) {
            patch_instr(instr, &mut patched);
        }
        *instrs = patched;
    }
}

fn patch_instr(instr: Instr, out: &mut Vec<Instr>) {
    match instr {
        Instr::Cmpq(src, dst) if matches!(dst, Arg::Imm(_)) => {
            out.push(Instr::Movq(dst, Arg::Reg(crate::xasm::Reg::Rax)));
            out.push(Instr::Cmpq(src, Arg::Reg(crate::xasm::Reg::Rax)));
        }
        Instr::Movq(src, dst) if src.is_memory() && dst.is_memory() => {
            out.push(Instr::Movq(src, Arg::Reg(crate::xasm::Reg::Rax)));
            out.push(Instr::Movq(Arg::Reg(crate::xasm::Reg::Rax), dst));
        }
        Instr::Movzbq(src, dst) if src.is_memory() && dst.is_memory() => {
            out.push(Instr::Movq(src, Arg::Reg(crate::xasm::Reg::Rax)));
            out.push(Instr::Movzbq(Arg::Reg(crate::xasm::Reg::Rax), dst));
        }
        Instr::Addq(src, dst) if src.is_memory() && dst.is_memory() => {
            out.push(Instr::Movq(src, Arg::Reg(crate::xasm::Reg::Rax)));
            out.push(Instr::Addq(Arg::Reg(crate::xasm::Reg::Rax), dst));
        }
        other => out.push(other),
    }
}
