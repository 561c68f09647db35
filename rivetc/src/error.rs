//! Phase-scoped error enums (spec §7: type errors, structural errors,
//! I/O errors).

use thiserror::Error;

use crate::types::Type;

/// Raised by either typecheck pass (spec §4.1). Unrecoverable; the rest
/// of the compiler assumes well-typedness, so compilation stops here.
#[derive(Debug, Error)]
pub enum TypeError {
    #[error("undefined name `{name}`")]
    UndefinedVariable { name: String },

    #[error("type mismatch: expected {expected}, found {found}")]
    Mismatch { expected: Type, found: Type },

    #[error("`{op}` expects operands of type {expected}, found {found}")]
    BadOperandType {
        op: &'static str,
        expected: String,
        found: Type,
    },

    #[error("`{lhs}` and `{rhs}` must have the same type for `eq`, found {lhs_ty} and {rhs_ty}")]
    EqOperandMismatch {
        lhs: String,
        rhs: String,
        lhs_ty: Type,
        rhs_ty: Type,
    },

    #[error("undefined function or record type `{name}`")]
    UndefinedCallee { name: String },

    #[error("`{name}` expects {expected} argument(s), found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("`{record}` has no field `{field}`")]
    NoSuchField { record: String, field: String },

    /// spec §9's second "do not silently fix" quirk: the original falls
    /// back to the object's own type when a `FieldRef` target isn't a
    /// known record; this raises instead.
    #[error("field access on a value of non-record type {found}")]
    UnresolvedFieldAccess { found: Type },

    #[error("`if`/`while` condition must be Bool, found {found}")]
    NonBoolCondition { found: Type },

    #[error("function `{function}` declares return type {declared} but returned {found}")]
    ReturnMismatch {
        function: String,
        declared: Type,
        found: Type,
    },

    #[error("subscript index {index} out of range for {ty} with {len} field(s)")]
    SubscriptOutOfRange { index: i64, len: usize, ty: Type },

    #[error("`subscript`'s index operand must be a constant integer")]
    NonConstSubscript,
}

/// Raised by a lowering pass when an input violates the precondition
/// established by the previous pass (spec §7 kind 2: "impossible
/// cases"), or by a lowering-specific rejection spec §9 calls for.
#[derive(Debug, Error)]
pub enum LowerError {
    #[error("`{name}` was constructed with zero arguments and its fields cannot be assigned")]
    EmptyRecordFieldAssign { name: String },

    #[error("internal: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] rivetc_parser::ParseError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Lower(#[from] LowerError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

pub type TypeResult<T> = Result<T, TypeError>;
pub type LowerResult<T> = Result<T, LowerError>;
pub type CompileResult<T> = Result<T, CompileError>;
