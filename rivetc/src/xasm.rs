//! `X` — pseudo-x86 instructions over a mix of real registers and
//! symbolic variables (spec §3). Select-instructions produces these;
//! the register allocator resolves every `Var` to a real `Arg` before
//! patch-instructions and emission see them.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Reg {
    pub fn name64(self) -> &'static str {
        match self {
            Reg::Rax => "rax",
            Reg::Rbx => "rbx",
            Reg::Rcx => "rcx",
            Reg::Rdx => "rdx",
            Reg::Rsi => "rsi",
            Reg::Rdi => "rdi",
            Reg::Rbp => "rbp",
            Reg::Rsp => "rsp",
            Reg::R8 => "r8",
            Reg::R9 => "r9",
            Reg::R10 => "r10",
            Reg::R11 => "r11",
            Reg::R12 => "r12",
            Reg::R13 => "r13",
            Reg::R14 => "r14",
            Reg::R15 => "r15",
        }
    }

    /// The low 8-bit name, used as the destination of `Set` (spec §4.5:
    /// `Set(cc, al)`).
    pub fn name8(self) -> &'static str {
        match self {
            Reg::Rax => "al",
            Reg::Rbx => "bl",
            Reg::Rcx => "cl",
            Reg::Rdx => "dl",
            Reg::Rsi => "sil",
            Reg::Rdi => "dil",
            Reg::Rbp => "bpl",
            Reg::Rsp => "spl",
            Reg::R8 => "r8b",
            Reg::R9 => "r9b",
            Reg::R10 => "r10b",
            Reg::R11 => "r11b",
            Reg::R12 => "r12b",
            Reg::R13 => "r13b",
            Reg::R14 => "r14b",
            Reg::R15 => "r15b",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Imm(i64),
    Reg(Reg),
    ByteReg(Reg),
    /// A symbolic variable, present until the register allocator
    /// assigns it a home and patch-instructions substitutes it away.
    Var(String),
    Deref(Reg, i64),
    GlobalVal(String),
}

impl Arg {
    pub fn is_memory(&self) -> bool {
        matches!(self, Arg::Deref(_, _) | Arg::GlobalVal(_))
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Arg::Var(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondCode {
    E,
    G,
    Ge,
    L,
    Le,
}

impl CondCode {
    pub fn suffix(self) -> &'static str {
        match self {
            CondCode::E => "e",
            CondCode::G => "g",
            CondCode::Ge => "ge",
            CondCode::L => "l",
            CondCode::Le => "le",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Movq(Arg, Arg),
    Movzbq(Arg, Arg),
    Leaq(Arg, Arg),
    Addq(Arg, Arg),
    Subq(Arg, Arg),
    Imulq(Arg, Arg),
    Cmpq(Arg, Arg),
    Andq(Arg, Arg),
    Orq(Arg, Arg),
    Xorq(Arg, Arg),
    Pushq(Arg),
    Popq(Arg),
    Set(CondCode, Arg),
    Callq(String),
    IndirectCallq(Arg),
    Jmp(String),
    JmpIf(CondCode, String),
    Retq,
}

/// One function's blocks, in the order they should be emitted. A plain
/// `Vec` instead of a map keeps emission order deterministic without
/// pulling in an ordered-map dependency the teacher doesn't use.
#[derive(Debug, Clone, Default)]
pub struct XFunctionDef {
    pub name: String,
    /// Carried through from `CFunctionDef` so the register allocator
    /// can apply the parameter-home override (spec §4.6) without a
    /// second lookup into the `C` IR.
    pub params: Vec<String>,
    pub blocks: Vec<(String, Vec<Instr>)>,
    pub regular_stack_bytes: i64,
    pub root_stack_slots: usize,
}

impl XFunctionDef {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
            blocks: Vec::new(),
            regular_stack_bytes: 0,
            root_stack_slots: 0,
        }
    }

    pub fn block(&self, label: &str) -> Option<&[Instr]> {
        self.blocks
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, instrs)| instrs.as_slice())
    }

    pub fn push_block(&mut self, label: impl Into<String>, instrs: Vec<Instr>) {
        self.blocks.push((label.into(), instrs));
    }
}

#[derive(Debug, Clone, Default)]
pub struct XProgram {
    pub functions: Vec<XFunctionDef>,
}
