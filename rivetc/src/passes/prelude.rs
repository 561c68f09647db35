//! Prelude and conclusion (spec §4.8): two synthetic blocks per
//! function bracketing the ones select-instructions produced. `main`'s
//! prelude additionally brings the runtime's heap and root stack up.

use crate::constants::{CALLEE_SAVED_REGISTERS, HEAP_SIZE, ROOT_STACK_SIZE};
use crate::xasm::{Arg, Instr, Reg, XFunctionDef, XProgram};

pub fn add_prelude_and_conclusion(program: &mut XProgram) {
    for f in &mut program.functions {
        add_to_function(f);
    }
}

fn add_to_function(f: &mut XFunctionDef) {
    let mut prelude = vec![
        Instr::Pushq(Arg::Reg(Reg::Rbp)),
        Instr::Movq(Arg::Reg(Reg::Rsp), Arg::Reg(Reg::Rbp)),
    ];
    for reg in CALLEE_SAVED_REGISTERS {
        prelude.push(Instr::Pushq(Arg::Reg(reg)));
    }
    prelude.push(Instr::Subq(Arg::Imm(f.regular_stack_bytes), Arg::Reg(Reg::Rsp)));

    if f.name == "main" {
        prelude.push(Instr::Movq(Arg::Imm(ROOT_STACK_SIZE), Arg::Reg(Reg::Rdi)));
        prelude.push(Instr::Movq(Arg::Imm(HEAP_SIZE), Arg::Reg(Reg::Rsi)));
        prelude.push(Instr::Callq("initialize".to_string()));
        prelude.push(Instr::Movq(
            Arg::GlobalVal("rootstack_begin".to_string()),
            Arg::Reg(Reg::R15),
        ));
    }
    for _ in 0..f.root_stack_slots {
        prelude.push(Instr::Movq(Arg::Imm(0), Arg::Deref(Reg::R15, 0)));
        prelude.push(Instr::Addq(Arg::Imm(8), Arg::Reg(Reg::R15)));
    }
    prelude.push(Instr::Jmp(format!("{}start", f.name)));

    let mut conclusion = vec![
        Instr::Addq(Arg::Imm(f.regular_stack_bytes), Arg::Reg(Reg::Rsp)),
        Instr::Subq(Arg::Imm(8 * f.root_stack_slots as i64), Arg::Reg(Reg::R15)),
    ];
    for reg in CALLEE_SAVED_REGISTERS.iter().rev() {
        conclusion.push(Instr::Popq(Arg::Reg(*reg)));
    }
    conclusion.push(Instr::Popq(Arg::Reg(Reg::Rbp)));
    conclusion.push(Instr::Retq);

    f.blocks.insert(0, (f.name.clone(), prelude));
    f.push_block(format!("{}conclusion", f.name), conclusion);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_prelude_initializes_the_runtime() {
        let mut f = XFunctionDef::new("main", vec![]);
        f.push_block("mainstart", vec![Instr::Retq]);
        f.root_stack_slots = 2;
        let mut p = XProgram { functions: vec![f] };
        add_prelude_and_conclusion(&mut p);

        let prelude = p.functions[0].block("main").unwrap();
        assert!(prelude.contains(&Instr::Callq("initialize".to_string())));
        assert!(prelude.contains(&Instr::Movq(
            Arg::GlobalVal("rootstack_begin".to_string()),
            Arg::Reg(Reg::R15)
        )));
        let zeroing = prelude.iter().filter(|i| matches!(i, Instr::Movq(Arg::Imm(0), Arg::Deref(Reg::R15, 0)))).count();
        assert_eq!(zeroing, 2);
        assert_eq!(prelude.last(), Some(&Instr::Jmp("mainstart".to_string())));
    }

    #[test]
    fn non_main_prelude_skips_runtime_init() {
        let mut f = XFunctionDef::new("id", vec!["n".to_string()]);
        f.push_block("idstart", vec![Instr::Retq]);
        let mut p = XProgram { functions: vec![f] };
        add_prelude_and_conclusion(&mut p);

        let prelude = p.functions[0].block("id").unwrap();
        assert!(!prelude.iter().any(|i| matches!(i, Instr::Callq(name) if name == "initialize")));
    }

    #[test]
    fn conclusion_restores_callee_saved_registers_in_reverse() {
        let mut f = XFunctionDef::new("f", vec![]);
        f.push_block("fstart", vec![Instr::Retq]);
        let mut p = XProgram { functions: vec![f] };
        add_prelude_and_conclusion(&mut p);

        let conclusion = p.functions[0].block("fconclusion").unwrap();
        let pushed_order: Vec<Reg> = CALLEE_SAVED_REGISTERS.to_vec();
        let popped: Vec<Reg> = conclusion
            .iter()
            .filter_map(|i| match i {
                Instr::Popq(Arg::Reg(r)) if *r != Reg::Rbp => Some(*r),
                _ => None,
            })
            .collect();
        let mut expected = pushed_order;
        expected.reverse();
        assert_eq!(popped, expected);
        assert_eq!(conclusion.last(), Some(&Instr::Retq));
    }
}
