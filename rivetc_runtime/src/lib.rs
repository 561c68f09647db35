//! rivetc_runtime
//!
//! The native runtime linked into every program rivetc compiles. The
//! generated assembly calls straight into this crate's symbols: the
//! exported globals `free_ptr`, `fromspace_end`, `rootstack_begin`, and
//! the `extern "C"` functions `initialize`, `collect`, and `print_int`.
//!
//! There is no other surface: generated code has no way to observe a
//! `Result`, so failures here print a message and abort the process
//! (see [`error::RuntimeError::abort`]).

pub mod error;
pub mod heap;

pub use error::RuntimeError;
pub use heap::{collect, decode_tag, encode_tag, initialize, print_int};
