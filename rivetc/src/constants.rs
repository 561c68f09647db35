//! Register conventions and runtime sizes (spec §6: "a constants table
//! exposing `argument_registers`, `caller_saved_registers`,
//! `callee_saved_registers`, `root_stack_size`, `heap_size`").

use crate::xasm::Reg;

/// System V AMD64 argument-passing order (spec §4.5).
pub const ARGUMENT_REGISTERS: [Reg; 6] = [
    Reg::Rdi,
    Reg::Rsi,
    Reg::Rdx,
    Reg::Rcx,
    Reg::R8,
    Reg::R9,
];

/// Used by select-instructions' push/pop bracket around a call (spec
/// §4.5) so that whatever a register is holding — a variable's home or
/// a transient scratch value — survives the call. Excludes `rax`:
/// `select_call` moves the call's return value out of `rax` right
/// after popping this set back, so saving/restoring `rax` here would
/// overwrite that return value with whatever `rax` held beforehand.
pub const CALLER_SAVED_REGISTERS: [Reg; 8] = [
    Reg::Rcx,
    Reg::Rdx,
    Reg::Rsi,
    Reg::Rdi,
    Reg::R8,
    Reg::R9,
    Reg::R10,
    Reg::R11,
];

pub const CALLEE_SAVED_REGISTERS: [Reg; 4] = [Reg::Rbx, Reg::R12, Reg::R13, Reg::R14];

/// Caller-saved registers eligible as variable homes. `rax` and `r11`
/// are select-instructions' own scratch registers (spec §4.5: `rax` for
/// arithmetic/comparisons/patch-instructions, `r11` for tuple
/// construction and subscript, both used without a save/restore
/// bracket), so neither can also be handed out as a variable's home —
/// a live variable homed there would be clobbered the next time
/// select-instructions needs the scratch. `rsp`, `rbp`, and `r15` are
/// reserved for the stack frame and the root stack and likewise never
/// enter the pool.
const ALLOCATABLE_CALLER_SAVED_REGISTERS: [Reg; 7] =
    [Reg::Rcx, Reg::Rdx, Reg::Rsi, Reg::Rdi, Reg::R8, Reg::R9, Reg::R10];

/// Register pool for color→home mapping (spec §4.6). Colors are mapped
/// in ascending order by `Vec::pop`, which drains from the end, so the
/// registers meant to come out *first* (caller-saved) are placed last.
pub fn register_pool() -> Vec<Reg> {
    let mut pool =
        Vec::with_capacity(CALLEE_SAVED_REGISTERS.len() + ALLOCATABLE_CALLER_SAVED_REGISTERS.len());
    pool.extend_from_slice(&CALLEE_SAVED_REGISTERS);
    pool.extend_from_slice(&ALLOCATABLE_CALLER_SAVED_REGISTERS);
    pool
}

/// Bytes for the collector-managed root stack, reserved by `initialize`
/// in `main`'s prelude.
pub const ROOT_STACK_SIZE: i64 = 16 * 1024;

/// Bytes for each heap semispace, reserved by `initialize`.
pub const HEAP_SIZE: i64 = 64 * 1024;
