//! CLI entry point (spec §6): one argument, the source file path.
//! Writes `<path>.s` next to it on success; on any failure, prints the
//! error chain to stderr and exits non-zero.

use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut args = std::env::args_os().skip(1);
    let path = match (args.next(), args.next()) {
        (Some(path), None) => PathBuf::from(path),
        _ => {
            eprintln!("usage: rivetc <source-file>");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = run(&path) {
        eprintln!("error: {err}");
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            eprintln!("caused by: {cause}");
            source = cause.source();
        }
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(path: &std::path::Path) -> Result<(), rivetc::error::CompileError> {
    let src = std::fs::read_to_string(path)?;
    let asm = rivetc::compile_source(&src)?;
    let out_path = path.with_extension("s");
    std::fs::write(out_path, asm)?;
    Ok(())
}
