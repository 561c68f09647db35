//! Fatal runtime conditions.
//!
//! Generated code never inspects these programmatically — there is no
//! ABI for propagating a `Result` across the `call`/`ret` boundary the
//! compiler emits — so a [`RuntimeError`] is only ever the payload of a
//! process abort. It exists as a type mainly so the failure paths in
//! [`crate::heap`] have one place that names what can go wrong.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The collector ran and the heap is still too small for the
    /// pending allocation. This runtime does not grow the heap
    /// (spec Non-goals: no generational or non-copying GC).
    #[error("heap exhausted: {requested} bytes requested, {available} available after collection")]
    HeapExhausted { requested: i64, available: i64 },

    /// `initialize` was called with a size that doesn't leave room for
    /// even the smallest allocation.
    #[error("invalid heap configuration: heap_size={heap_size}, root_stack_size={root_stack_size}")]
    InvalidConfiguration { heap_size: i64, root_stack_size: i64 },
}

impl RuntimeError {
    /// Abort the process. Called from contexts with no way to return an
    /// error to the generated code that called into the runtime.
    pub fn abort(self) -> ! {
        eprintln!("rivetc runtime: {self}");
        std::process::abort();
    }
}
