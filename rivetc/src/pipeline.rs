//! The full pass pipeline (spec §2): parse, typecheck, remove-complex-
//! operands, eliminate-records, typecheck again, explicate-control,
//! select-instructions, allocate-registers (per function), patch-
//! instructions, prelude-and-conclusion, and textual emission.
//!
//! A fresh [`CompileContext`] is built for each call, so the auxiliary
//! tables it carries never leak state between independent compilations
//! (spec §5).

use crate::context::CompileContext;
use crate::emit;
use crate::error::CompileError;
use crate::passes::{eliminate_records, explicate, patch, prelude, rco, select, typecheck};
use crate::regalloc;

/// Parse and lower `src` all the way to textual assembly.
pub fn compile_source(src: &str) -> Result<String, CompileError> {
    let program = rivetc_parser::parse(src)?;

    let mut ctx = CompileContext::new();
    typecheck::typecheck_program(&program, &mut ctx, false)?;

    let program = rco::remove_complex_operands(&program, &mut ctx);
    let program = eliminate_records::eliminate_records(&program, &mut ctx)?;
    typecheck::typecheck_program(&program, &mut ctx, true)?;

    let cprogram = explicate::explicate_control(&program, &mut ctx)?;
    let mut xprogram = select::select_instructions(&cprogram, &ctx)?;

    for f in &mut xprogram.functions {
        regalloc::allocate_registers(f, &ctx)?;
    }
    patch::patch_instructions(&mut xprogram);
    prelude::add_prelude_and_conclusion(&mut xprogram);

    Ok(emit::emit_program(&xprogram))
}
