//! `CompileContext` — the explicit compilation context spec §9 asks
//! for in place of the source's process-wide globals. Each field here
//! corresponds to one of the auxiliary tables in spec §3
//! (`tuple_var_types`, `record_types`, `function_params`,
//! `function_return_types`, `function_names`). A fresh context is
//! created once per `compile_source` call (spec §5: these tables have
//! the lifetime of one invocation and must never leak across calls).

use std::collections::{HashMap, HashSet};

use crate::gensym::Gensym;
use crate::types::Type;

#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    /// Variables whose value is a heap tuple, so they must be homed on
    /// the root stack rather than a register (spec §3, §4.6).
    pub tuple_var_types: HashMap<String, Type>,
    /// Class definitions, keyed by name; still consulted by the second
    /// typecheck pass and diagnostics after elimination removes the
    /// `ClassDef` nodes themselves.
    pub record_types: HashMap<String, Type>,
    pub function_params: HashMap<String, Vec<String>>,
    pub function_return_types: HashMap<String, Type>,
    pub function_names: HashSet<String>,
    gensym: Gensym,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        self.gensym.fresh(prefix)
    }

    pub fn is_function(&self, name: &str) -> bool {
        self.function_names.contains(name)
    }

    pub fn is_record(&self, name: &str) -> bool {
        self.record_types.contains_key(name)
    }
}
