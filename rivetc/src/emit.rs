//! Textual x86-64 emission (spec §6): pretty-print `X` IR as AT&T
//! assembly, and append the hand-written bump-allocator stub the
//! generated `Callq("allocate")` sites call into.

use std::fmt::Write as _;

use crate::xasm::{Arg, Instr, XProgram};

pub fn emit_program(program: &XProgram) -> String {
    let mut out = String::new();
    writeln!(out, "    .globl main").unwrap();
    writeln!(out, "    .text").unwrap();
    for f in &program.functions {
        for (label, instrs) in &f.blocks {
            writeln!(out, "{label}:").unwrap();
            for instr in instrs {
                emit_instr(&mut out, instr);
            }
        }
    }
    out.push_str(ALLOCATE_STUB);
    out
}

fn fmt_arg(arg: &Arg) -> String {
    match arg {
        Arg::Imm(n) => format!("${n}"),
        Arg::Reg(r) => format!("%{}", r.name64()),
        Arg::ByteReg(r) => format!("%{}", r.name8()),
        Arg::Deref(r, offset) => format!("{offset}(%{})", r.name64()),
        Arg::GlobalVal(name) => format!("{name}(%rip)"),
        Arg::Var(name) => unreachable!("`{name}` reached emission without a home; allocate-registers should have substituted it"),
    }
}

fn emit_instr(out: &mut String, instr: &Instr) {
    match instr {
        Instr::Movq(s, d) => writeln!(out, "    movq {}, {}", fmt_arg(s), fmt_arg(d)),
        Instr::Movzbq(s, d) => writeln!(out, "    movzbq {}, {}", fmt_arg(s), fmt_arg(d)),
        Instr::Leaq(s, d) => writeln!(out, "    leaq {}, {}", fmt_arg(s), fmt_arg(d)),
        Instr::Addq(s, d) => writeln!(out, "    addq {}, {}", fmt_arg(s), fmt_arg(d)),
        Instr::Subq(s, d) => writeln!(out, "    subq {}, {}", fmt_arg(s), fmt_arg(d)),
        Instr::Imulq(s, d) => writeln!(out, "    imulq {}, {}", fmt_arg(s), fmt_arg(d)),
        Instr::Cmpq(s, d) => writeln!(out, "    cmpq {}, {}", fmt_arg(s), fmt_arg(d)),
        Instr::Andq(s, d) => writeln!(out, "    andq {}, {}", fmt_arg(s), fmt_arg(d)),
        Instr::Orq(s, d) => writeln!(out, "    orq {}, {}", fmt_arg(s), fmt_arg(d)),
        Instr::Xorq(s, d) => writeln!(out, "    xorq {}, {}", fmt_arg(s), fmt_arg(d)),
        Instr::Pushq(a) => writeln!(out, "    pushq {}", fmt_arg(a)),
        Instr::Popq(a) => writeln!(out, "    popq {}", fmt_arg(a)),
        Instr::Set(cc, a) => writeln!(out, "    set{} {}", cc.suffix(), fmt_arg(a)),
        Instr::Callq(name) => writeln!(out, "    callq {name}"),
        Instr::IndirectCallq(a) => writeln!(out, "    callq *{}", fmt_arg(a)),
        Instr::Jmp(label) => writeln!(out, "    jmp {label}"),
        Instr::JmpIf(cc, label) => writeln!(out, "    j{} {label}", cc.suffix()),
        Instr::Retq => writeln!(out, "    retq"),
    }
    .unwrap();
}

/// A bump allocator over the runtime's `free_ptr`/`fromspace_end`
/// globals: on entry `%rdi` holds the requested size in bytes. Calls
/// `collect(r15)` once on overflow and proceeds — the collector leaves
/// enough space behind it that a program whose tuples are all
/// reachable from the root stack never needs a second retry.
const ALLOCATE_STUB: &str = r#"allocate:
    movq free_ptr(%rip), %rax
    addq %rdi, %rax
    cmpq fromspace_end(%rip), %rax
    jle .Lallocate_ok
    pushq %rdi
    movq %r15, %rdi
    callq collect
    popq %rdi
.Lallocate_ok:
    movq free_ptr(%rip), %rax
    addq %rdi, free_ptr(%rip)
    retq
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xasm::{Reg, XFunctionDef};

    #[test]
    fn emits_globl_main_and_the_allocate_stub() {
        let mut f = XFunctionDef::new("main", vec![]);
        f.push_block("main", vec![Instr::Retq]);
        let program = XProgram { functions: vec![f] };
        let text = emit_program(&program);
        assert!(text.contains(".globl main"));
        assert!(text.contains("allocate:"));
        assert!(text.contains("callq collect"));
    }

    #[test]
    fn formats_instructions_in_att_syntax() {
        let mut f = XFunctionDef::new("main", vec![]);
        f.push_block(
            "main",
            vec![
                Instr::Movq(Arg::Imm(5), Arg::Reg(Reg::Rax)),
                Instr::Addq(Arg::Deref(Reg::Rbp, -8), Arg::Reg(Reg::Rax)),
            ],
        );
        let program = XProgram { functions: vec![f] };
        let text = emit_program(&program);
        assert!(text.contains("movq $5, %rax"));
        assert!(text.contains("addq -8(%rbp), %rax"));
    }
}
